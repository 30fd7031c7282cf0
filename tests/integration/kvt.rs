//! KVT integration tests
//!
//! The processing side writes through `try_lock`, the UI side syncs through
//! the engine. Each delivery must happen exactly once.

use crate::helpers::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tandem::prelude::*;
use tandem::Status;

fn collect(
    into: &mut HashMap<String, Option<KvtParam>>,
) -> impl FnMut(&str, Option<&KvtParam>) -> Status + '_ {
    move |name, value| {
        into.insert(name.to_string(), value.cloned());
        Status::Ok
    }
}

#[test]
fn test_dsp_to_ui_delivered_once() {
    let engine = test_engine();
    {
        let mut kvt = engine.kvt().lock();
        kvt.put("/meters/rms", KvtParam::F32(0.5), KvtFlags::TX);
        kvt.put("/state/preset", KvtParam::Str("init".into()), KvtFlags::TX);
        kvt.put("/private/cache", KvtParam::U32(1), KvtFlags::TX | KvtFlags::PRIVATE);
    }

    let mut ui = HashMap::new();
    let report = engine.sync_kvt(collect(&mut ui), |_, _| Status::Ok);
    assert_eq!(report.to_ui, 2);
    assert_eq!(ui.get("/meters/rms"), Some(&Some(KvtParam::F32(0.5))));
    assert!(!ui.contains_key("/private/cache"));

    let mut again = HashMap::new();
    let report = engine.sync_kvt(collect(&mut again), |_, _| Status::Ok);
    assert_eq!(report.to_ui, 0);
    assert!(again.is_empty());
}

#[test]
fn test_failed_delivery_retried() {
    let engine = test_engine();
    engine
        .kvt()
        .lock()
        .put("/a", KvtParam::I32(1), KvtFlags::RX);

    let report = engine.sync_kvt(|_, _| Status::Ok, |_, _| Status::Overflow);
    assert_eq!(report.to_dsp, 0);

    let mut dsp = HashMap::new();
    let report = engine.sync_kvt(|_, _| Status::Ok, collect(&mut dsp));
    assert_eq!(report.to_dsp, 1);
    assert_eq!(dsp.get("/a"), Some(&Some(KvtParam::I32(1))));
}

#[test]
fn test_removal_and_transient_collection() {
    let engine = test_engine();
    {
        let mut kvt = engine.kvt().lock();
        kvt.put("/keep", KvtParam::I64(7), KvtFlags::empty());
        kvt.put("/note", KvtParam::U64(60), KvtFlags::TX | KvtFlags::TRANSIENT);
        kvt.put("/gone", KvtParam::F64(1.0), KvtFlags::empty());
        assert!(kvt.remove("/gone", KvtFlags::TX).is_ok());
    }

    let mut ui = HashMap::new();
    let report = engine.sync_kvt(collect(&mut ui), |_, _| Status::Ok);
    assert_eq!(ui.get("/gone"), Some(&None), "removal delivered as None");
    assert_eq!(ui.get("/note"), Some(&Some(KvtParam::U64(60))));
    assert!(report.collected >= 2);

    let kvt = engine.kvt().lock();
    assert!(kvt.exists("/keep"));
    assert!(!kvt.exists("/note"));
    assert!(!kvt.exists("/gone"));
}

#[test]
fn test_concurrent_writer() {
    let engine = test_engine();
    let kvt = Arc::clone(engine.kvt());

    let dsp = thread::spawn(move || {
        let mut written = 0;
        while written < 200 {
            // Processing thread never blocks on the lock
            if let Some(mut storage) = kvt.try_lock() {
                let name = format!("/voices/{}", written);
                storage.put(&name, KvtParam::U32(written), KvtFlags::TX);
                written += 1;
            }
        }
    });

    let mut seen: HashMap<String, Option<KvtParam>> = HashMap::new();
    while !dsp.is_finished() {
        engine.sync_kvt(collect(&mut seen), |_, _| Status::Ok);
    }
    dsp.join().unwrap();
    engine.sync_kvt(collect(&mut seen), |_, _| Status::Ok);

    assert_eq!(seen.len(), 200);
    assert_eq!(seen.get("/voices/199"), Some(&Some(KvtParam::U32(199))));
}
