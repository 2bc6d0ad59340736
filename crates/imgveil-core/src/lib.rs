//! `imgveil` Core Library
//!
//! Shared functionality for `imgveil` components:
//! - Session store binding a session id to an ephemeral server key pair
//! - Chunk delivery protocol (session init, encrypted chunk serving)
//! - Client-side in-order chunk assembly
//! - Wire types, configuration, tracing setup and the error taxonomy

pub mod assembler;
pub mod asset;
pub mod config;
pub mod error;
pub mod protocol;
pub mod store;
pub mod tracing_init;
pub mod wire;

pub use assembler::{ChunkAssembler, ChunkSource};
pub use asset::ImageAsset;
pub use config::DeliveryConfig;
pub use error::{Error, Result};
pub use protocol::DeliveryService;
pub use store::{Session, SessionId, SessionStore};
pub use wire::{ChunkRequest, ChunkResponse, ErrorBody, SessionInit};
