//! Process-wide plugin registry.
//!
//! Replaces static plugin lists. Construct one registry at startup, register
//! every plugin's metadata before the first host query, and call
//! [`PluginRegistry::shutdown`] once when the library is unloaded. Lookups are
//! lock-free reads of an immutable snapshot; registration publishes a new one.

use super::PluginMetadata;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct PluginRegistry {
    plugins: ArcSwap<Vec<Arc<PluginMetadata>>>,
    closed: AtomicBool,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: ArcSwap::from_pointee(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Validate and add a plugin. Uids must be unique.
    pub fn register(&self, meta: PluginMetadata) -> Result<Arc<PluginMetadata>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::BadState("registry is shut down".into()));
        }
        meta.validate()?;

        let meta = Arc::new(meta);
        loop {
            let current = self.plugins.load_full();
            if current.iter().any(|p| p.uid == meta.uid) {
                return Err(Error::DuplicatePlugin(meta.uid.clone()));
            }

            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&meta));
            // Retry if another registration won the race
            let prev = self.plugins.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&prev, &current) {
                break;
            }
        }

        tracing::debug!("Registered plugin {} ({} ports)", meta.uid, meta.ports.len());
        Ok(meta)
    }

    pub fn get(&self, uid: &str) -> Option<Arc<PluginMetadata>> {
        self.plugins.load().iter().find(|p| p.uid == uid).cloned()
    }

    /// Registration-ordered snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Arc<PluginMetadata>>> {
        self.plugins.load_full()
    }

    /// Iterate over a snapshot taken at call time.
    pub fn iter(&self) -> impl Iterator<Item = Arc<PluginMetadata>> {
        let snapshot = self.snapshot();
        (0..snapshot.len()).map(move |i| Arc::clone(&snapshot[i]))
    }

    pub fn len(&self) -> usize {
        self.plugins.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all registered metadata and refuse further registration.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.plugins.store(Arc::new(Vec::new()));
        tracing::debug!("Plugin registry shut down");
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortDescriptor;

    fn meta(uid: &str) -> PluginMetadata {
        PluginMetadata::new(uid, uid).port(PortDescriptor::audio_out("out"))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PluginRegistry::new();
        registry.register(meta("a")).unwrap();
        registry.register(meta("b")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b").unwrap().uid, "b");
        assert!(registry.get("c").is_none());
        let order: Vec<_> = registry.iter().map(|p| p.uid.clone()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let registry = PluginRegistry::new();
        registry.register(meta("a")).unwrap();
        assert!(matches!(
            registry.register(meta("a")),
            Err(Error::DuplicatePlugin(_))
        ));
    }

    #[test]
    fn test_shutdown_is_final() {
        let registry = PluginRegistry::new();
        registry.register(meta("a")).unwrap();
        registry.shutdown();
        registry.shutdown();

        assert!(registry.is_empty());
        assert!(matches!(registry.register(meta("b")), Err(Error::BadState(_))));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(PluginRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        registry.register(meta(&format!("p{}-{}", t, i))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 100);
    }
}
