//! Authenticated REST client for the AdForge backend.
//!
//! The backend is reached through the [`Backend`] trait so the engine can
//! run against the production HTTP API ([`HttpBackend`]) or an in-memory
//! stub ([`StubBackend`]) in tests.

pub mod backend;
pub mod http;
pub mod stub;
pub mod wire;

pub use backend::Backend;
pub use http::HttpBackend;
pub use stub::StubBackend;
pub use wire::{JobAck, JobKind, JobRequest};
