//! Object identity for the gitro repository reader.
//!
//! Provides the 20-byte [`ObjectId`] fingerprint, its hex codec, and
//! checked SHA-1 hashing of framed object content.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::ObjectId;
