//! `imgveil` command-line client.
//!
//! Speaks the delivery protocol over HTTP and reassembles the asset with
//! [`imgveil_core::ChunkAssembler`].

pub mod client;

pub use client::{DeliveryClient, SessionChunks};
