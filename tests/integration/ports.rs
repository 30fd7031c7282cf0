//! Port synchronization integration tests
//!
//! Pattern: write on the processing side, `sync_all` on the UI side, check
//! what the listener saw. Port indices follow `demo_meta`.

use crate::helpers::*;
use approx::assert_relative_eq;
use std::thread;
use tandem::core::osc::{self, OscValue};
use tandem::prelude::*;

const GAIN: usize = 3;
const GAIN_OUT: usize = 4;
const LEVEL: usize = 5;
const PEAK: usize = 6;
const SPECTRUM: usize = 7;
const SCOPE: usize = 8;
const WATERFALL: usize = 9;
const LABEL: usize = 10;
const FILE: usize = 11;
const EVENTS_IN: usize = 12;
const EVENTS_OUT: usize = 13;
const ENABLED: usize = 14;

/// First sync after instantiation reports every scalar port once.
fn settle(mirrors: &mut MirrorTable) {
    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
}

#[test]
fn test_cold_start_delivers_defaults() {
    let (_engine, _ports, mut mirrors) = demo_instance();
    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);

    let indices = recorder.indices();
    assert!(indices.contains(&GAIN));
    assert!(indices.contains(&GAIN_OUT));
    assert!(indices.contains(&LEVEL));
    assert!(indices.contains(&ENABLED));
    assert!(!indices.contains(&PEAK), "empty peak window");

    recorder.clear();
    assert_eq!(mirrors.sync_all(&mut recorder), 0, "nothing changed since");
}

#[test]
fn test_meter_and_output_control() {
    let (_engine, ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    ports.meter(LEVEL).unwrap().set_value(0.25);
    ports.meter(LEVEL).unwrap().set_value(0.75);
    ports.control(GAIN_OUT).unwrap().set_value(5.0);

    let mut recorder = Recorder::default();
    assert_eq!(mirrors.sync_all(&mut recorder), 2, "writes coalesce per port");
    assert_relative_eq!(mirrors.get(LEVEL).unwrap().value(), 0.75);
    assert_relative_eq!(mirrors.get(GAIN_OUT).unwrap().value(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_peak_meter_fetch_and_clear() {
    let (_engine, ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let peak = ports.meter(PEAK).unwrap();
    peak.set_value(0.3);
    peak.set_value(-0.9);
    peak.set_value(0.5);

    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    assert_eq!(recorder.indices(), vec![PEAK]);
    assert_relative_eq!(mirrors.get(PEAK).unwrap().value(), -0.9);

    // New window: a smaller value lands
    peak.set_value(0.1);
    recorder.clear();
    mirrors.sync_all(&mut recorder);
    assert_relative_eq!(mirrors.get(PEAK).unwrap().value(), 0.1);
}

#[test]
fn test_ui_control_write_reaches_dsp_without_echo() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);
    assert!(!ports.control_mut(GAIN).unwrap().changed());

    mirrors.get_mut(GAIN).unwrap().set_value(1.5);
    let gain = ports.control_mut(GAIN).unwrap();
    assert!(gain.changed());
    assert_relative_eq!(gain.value(), 1.5);
    assert!(gain.take_edited());
    assert!(!gain.take_edited());

    let mut recorder = Recorder::default();
    assert_eq!(mirrors.sync_all(&mut recorder), 0, "own write not echoed");

    // Output ports ignore UI writes
    mirrors.get_mut(GAIN_OUT).unwrap().set_value(0.1);
    assert_relative_eq!(ports.control(GAIN_OUT).unwrap().value(), 1.0);
}

#[test]
fn test_bypass_port() {
    let (_engine, ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);
    let enabled = ports.control(ENABLED).unwrap();
    assert!(!enabled.bypassed());

    enabled.set_bypass(true);
    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    assert_eq!(recorder.changes, vec![(ENABLED, 0.0)]);
}

#[test]
fn test_mesh_snapshot() {
    let (_engine, ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let mesh = ports.mesh(SPECTRUM).unwrap();
    {
        let mut writer = mesh.try_write().unwrap();
        writer.buffer_mut(0).unwrap()[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        writer.buffer_mut(1).unwrap()[..4].copy_from_slice(&[5.0, 6.0, 7.0, 8.0]);
        writer.commit(4);
    }
    assert!(mesh.try_write().is_none(), "snapshot not consumed yet");

    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    assert_eq!(recorder.indices(), vec![SPECTRUM]);
    match mirrors.get(SPECTRUM).unwrap().buffer() {
        PortBuffer::Mesh { buffers, items } => {
            assert_eq!(items, 4);
            assert_eq!(&buffers[1][..4], &[5.0, 6.0, 7.0, 8.0]);
        }
        _ => panic!("expected mesh buffer"),
    }

    recorder.clear();
    assert_eq!(mirrors.sync_all(&mut recorder), 0, "delivered once");
    assert!(mesh.is_empty());
}

#[test]
fn test_stream_follows_writer() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let data = generate_integer_staircase(40);
    let stream = ports.stream_mut(SCOPE).unwrap();
    for chunk in data.chunks(10) {
        let n = stream.begin(chunk.len());
        stream.write(0, &chunk[..n]);
        stream.write(1, &chunk[..n]);
        stream.commit();
    }

    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    match mirrors.get(SCOPE).unwrap().buffer() {
        PortBuffer::Stream(mirror) => {
            assert_eq!(mirror.head(), 40);
            let mut last = [0.0; 5];
            assert_eq!(mirror.read_last(1, &mut last), 5);
            assert_eq!(last, [35.0, 36.0, 37.0, 38.0, 39.0]);
        }
        _ => panic!("expected stream buffer"),
    }
}

#[test]
fn test_frame_buffer_rows() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let fb = ports.frame_buffer_mut(WATERFALL).unwrap();
    for r in 0..10 {
        fb.write_row(&[r as f32; 16]);
    }

    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    match mirrors.get(WATERFALL).unwrap().buffer() {
        PortBuffer::Frames(mirror) => {
            assert_eq!(mirror.last_row_id(), Some(9));
            assert_eq!(mirror.first_row_id(), 3, "rows racing the writer are dropped");
            assert_eq!(mirror.row(5).unwrap()[0], 5.0);
            assert!(mirror.row(1).is_none());
        }
        _ => panic!("expected frame buffer"),
    }
}

#[test]
fn test_string_port_round_trip() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    // UI to DSP, truncated to the 32 byte capacity
    let long = "a label that is much longer than thirty-two bytes";
    assert_eq!(mirrors.get_mut(LABEL).unwrap().write(long.as_bytes()), Status::Ok);
    let label = ports.text_mut(LABEL).unwrap();
    assert!(label.changed());
    assert_eq!(label.value(), &long[..32]);

    // DSP to UI
    assert_eq!(label.set_value("from dsp"), Status::Ok);
    let mut recorder = Recorder::default();
    mirrors.sync_all(&mut recorder);
    assert_eq!(recorder.indices(), vec![LABEL]);
    match mirrors.get(LABEL).unwrap().buffer() {
        PortBuffer::Text(text) => assert_eq!(text, "from dsp"),
        _ => panic!("expected text"),
    }
}

#[test]
fn test_path_commit_handshake() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let Some(MirrorPort::Text(path)) = mirrors.get_mut(FILE) else {
        panic!("expected text mirror");
    };
    assert!(path.is_path());
    assert_eq!(path.submit("/tmp/kick.wav", 7), Status::Ok);
    assert!(!path.committed());

    let file = ports.text_mut(FILE).unwrap();
    assert!(file.pending());
    assert!(file.accept());
    assert_eq!(file.value(), "/tmp/kick.wav");
    assert_eq!(file.flags(), 7);
    file.commit();

    let Some(MirrorPort::Text(path)) = mirrors.get(FILE) else {
        unreachable!()
    };
    assert!(path.committed());
}

#[test]
fn test_osc_both_directions() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let mut packet = [0u8; 64];
    let size = osc::forge(&mut packet, "/ui/ready", &[OscValue::Int(1)]).unwrap();
    assert_eq!(mirrors.get_mut(EVENTS_IN).unwrap().write(&packet[..size]), Status::Ok);
    assert_eq!(
        mirrors.get_mut(EVENTS_OUT).unwrap().write(&packet[..size]),
        Status::BadState,
        "output port has no UI writer"
    );

    let mut dst = [0u8; 64];
    let n = ports.osc_mut(EVENTS_IN).unwrap().fetch(&mut dst).unwrap();
    let msg = osc::parse(&dst[..n]).unwrap();
    assert_eq!(msg.address, "/ui/ready");
    assert_eq!(msg.arg(0), Some(OscValue::Int(1)));

    let out = ports.osc_mut(EVENTS_OUT).unwrap();
    for i in 0..3 {
        let size = osc::forge(&mut packet, "/dsp/note", &[OscValue::Int(i)]).unwrap();
        assert_eq!(out.submit(&packet[..size]), Status::Ok);
    }

    let mut received = Vec::new();
    mirrors.sync_all(&mut |index: usize, port: &MirrorPort| {
        if index == EVENTS_OUT {
            if let PortBuffer::Bytes(bytes) = port.buffer() {
                let msg = osc::parse(bytes).unwrap();
                if let Some(OscValue::Int(i)) = msg.arg(0) {
                    received.push(i);
                }
            }
        }
    });
    assert_eq!(received, vec![0, 1, 2]);
}

#[test]
fn test_mirror_outlives_backend() {
    let (_engine, ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);
    drop(ports);

    let mut recorder = Recorder::default();
    assert_eq!(mirrors.sync_all(&mut recorder), 0);
    mirrors.get_mut(GAIN).unwrap().set_value(1.0);
    assert_eq!(
        mirrors.get_mut(LABEL).unwrap().write(b"gone"),
        Status::NoData
    );
}

#[test]
fn test_meter_across_threads() {
    let (_engine, mut ports, mut mirrors) = demo_instance();
    settle(&mut mirrors);

    let dsp = thread::spawn(move || {
        let level = ports.meter_mut(LEVEL).unwrap();
        for i in 1..=1000 {
            level.set_value(i as f32 / 1000.0);
        }
        ports
    });

    let mut last = 0.0f32;
    let mut recorder = Recorder::default();
    while !dsp.is_finished() {
        recorder.clear();
        mirrors.sync_all(&mut recorder);
        let value = mirrors.get(LEVEL).unwrap().value();
        assert!(value >= last, "meter went backwards: {} < {}", value, last);
        last = value;
    }
    let _ports = dsp.join().unwrap();
    mirrors.sync_all(&mut recorder);
    assert_relative_eq!(mirrors.get(LEVEL).unwrap().value(), 1.0);
}
