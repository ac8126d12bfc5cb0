//! Core wire types for HTTP request batching.
//!
//! This crate provides the `multipart/mixed` framing shared by the batch
//! client and by anything that needs to speak the batch wire format (test
//! servers, proxies).
//!
//! ## Modules
//!
//! - [`boundary`]: Boundary token selection and collision scanning
//! - [`message`]: Inner HTTP message serialization and parsing
//! - [`multipart`]: Batch body encoding and decoding
//! - [`error`]: Framing error types

mod boundary;
mod error;
mod message;
mod multipart;

pub use boundary::*;
pub use error::*;
pub use message::*;
pub use multipart::*;
