//! Shuffle Stream Server Library
//!
//! This library crate defines the core modules of an in-memory shuffle-data
//! server for distributed data-processing jobs. It serves as the foundation
//! for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of two subsystems:
//!
//! - **`shuffle`**: The attempt-fencing and partition-buffering engine. Accepts
//!   streamed key/value records from concurrent map-task writers, keeps exactly
//!   one task attempt authoritative per logical map task, buffers records per
//!   partition in arrival order, and serves them back to reduce-task readers.
//! - **`server`**: The HTTP transport layer. Decodes JSON requests into calls
//!   on the shuffle engine and maps engine outcomes back to responses.

pub mod server;
pub mod shuffle;
