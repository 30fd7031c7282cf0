//! Engine lifecycle integration tests
//!
//! Tests engine creation, configuration, plugin registration and cleanup.

use crate::helpers::*;
use std::sync::Arc;
use tandem::prelude::*;
use tandem::{Error, PortFactory, Task, TaskStatus};

#[test]
fn test_engine_config() {
    let engine = test_engine();
    assert_eq!(engine.sample_rate(), TEST_SAMPLE_RATE);
    assert_eq!(engine.config().max_block_size, TEST_BLOCK_SIZE);
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let result = TandemEngine::builder().sample_rate(1000.0).build();
    assert!(matches!(result, Err(Error::Core(tandem::core::Error::InvalidConfig(_)))));

    let result = TandemEngine::builder().workers(0).build();
    assert!(result.is_err());
}

#[test]
fn test_engine_rejects_duplicate_plugin() {
    let result = TandemEngine::builder()
        .plugin(demo_meta())
        .plugin(demo_meta())
        .build();
    assert!(matches!(
        result,
        Err(Error::Core(tandem::core::Error::DuplicatePlugin(_)))
    ));
}

#[test]
fn test_engine_sequential_creation() {
    for _ in 0..3 {
        let engine = test_engine();
        assert!(engine.instantiate(DEMO_UID).is_ok());
        // Engine is dropped here, joining its executor
    }
}

#[test]
fn test_instantiate_unknown_plugin() {
    let engine = test_engine();
    assert!(matches!(
        engine.instantiate("tandem.nope"),
        Err(Error::UnknownPlugin(_))
    ));
}

#[test]
fn test_register_after_build() {
    let engine = test_engine();
    let meta = PluginMetadata::new("tandem.late", "Late").port(PortDescriptor::audio_out("out"));
    engine.register(meta).unwrap();
    let instance = engine.instantiate("tandem.late").unwrap();
    assert_eq!(instance.ports.len(), 1);
    assert_eq!(instance.mirrors.len(), 1);
}

#[test]
fn test_instantiate_with_custom_factory() {
    struct Narrow;

    impl PortFactory for Narrow {
        fn create(
            &self,
            desc: Arc<PortDescriptor>,
            config: &tandem::EngineConfig,
        ) -> tandem::core::Result<tandem::BackendPort> {
            let config = tandem::EngineConfig {
                max_block_size: 16,
                ..config.clone()
            };
            tandem::core::DefaultPortFactory.create(desc, &config)
        }
    }

    let engine = test_engine();
    let instance = engine.instantiate_with(DEMO_UID, &Narrow).unwrap();
    assert_eq!(instance.ports.audio(1).unwrap().buffer().len(), 16);
}

struct Flag {
    status: TaskStatus,
}

impl Task for Flag {
    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn run(&self) -> tandem::core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_engine_executor_runs_tasks() {
    let engine = test_engine();
    let task = Arc::new(Flag {
        status: TaskStatus::new(),
    });
    assert!(engine.executor().submit(task.clone()));
    assert!(wait_until(5000, || task.completed()));
    assert!(task.successful());
}

#[test]
fn test_engine_shutdown() {
    let engine = test_engine();
    engine.shutdown();
    engine.shutdown();

    let task = Arc::new(Flag {
        status: TaskStatus::new(),
    });
    assert!(!engine.executor().submit(task.clone()));
    assert!(task.idle());
    assert!(engine.instantiate(DEMO_UID).is_err(), "registry closed");
}
