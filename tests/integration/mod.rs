//! Integration test modules for tandem
//!
//! - engine: engine lifecycle, registry, instantiation
//! - ports: backend to mirror synchronization for every port kind
//! - kvt: shared key-value tree delivery

pub mod engine;
pub mod kvt;
pub mod ports;
