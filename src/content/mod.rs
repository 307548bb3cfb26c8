//! Content handling: fingerprinting, compression and object construction
//!
//! This module provides:
//! - A single-pass codec that hashes and zlib-compresses a byte stream
//! - [`ContentObject`], the unit of stored data
//! - Path cleaning and tag derivation relative to a scan root

pub mod codec;
pub mod object;

pub use codec::{decode, encode, fingerprint_bytes, Encoded, Fingerprint};
pub use object::{clean_path, derive_tags, ContentObject};
