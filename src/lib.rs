//! Reqtape - record, replay and cache HTTP exchanges as plain-text fixtures
//!
//! A [`Recorder`] wraps a delegate [`Transport`] and keeps every exchange in
//! a [`FixtureStore`], keyed by a fingerprint of the request's canonical
//! HTTP/1.1 bytes. Tests can then replay the fixtures without a network.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod recorder;
pub mod store;
pub mod transport;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use recorder::{recorder, Cache, LabelStrategy, Mode, Record, Recorder, RecorderOptions, Replay};
pub use store::{DirStore, FixtureStore, MemoryStore};
pub use transport::{HyperTransport, StaticTransport, Transport, TransportFn};
