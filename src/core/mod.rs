//! Shared primitives used by every engine.
//!
//! - `hash`: domain-separated SHA-256 digests, hex encoded
//! - `value`: schema-agnostic state tree with merge and diff

pub mod hash;
pub mod value;
