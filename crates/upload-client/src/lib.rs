//! HTTP transport for the chunk upload endpoint.
//!
//! [`Client`] sends one chunk per multipart `POST` and asks the backend to
//! discard partial chunks with `DELETE`. The engine only sees the
//! [`ChunkTransport`] and [`CleanupClient`] traits, so it can be driven by
//! scripted transports in tests.

pub mod client;
pub mod error;
pub mod transport;

pub use client::Client;
pub use error::TransportError;
pub use transport::{ChunkRequest, ChunkTransport, CleanupClient, TransportFuture};
