//! Shared test utilities for lokiq integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Live-poller harnesses pair [`ScriptedTransport`] with
//! `tokio::time::pause()` for deterministic timing; HTTP harnesses use
//! [`FakeLokiApi`].

#![allow(dead_code)]

pub mod assertions;
pub mod builders;
pub mod fake_loki_api;
pub mod fixtures;
pub mod scripted_transport;

pub use assertions::*;
pub use builders::*;
pub use fake_loki_api::FakeLokiApi;
pub use fixtures::*;
pub use scripted_transport::ScriptedTransport;
