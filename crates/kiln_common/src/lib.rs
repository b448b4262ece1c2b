//! Shared foundational types for the Kiln build-avoidance engine.
//!
//! This crate provides content fingerprints used to classify source units as
//! modified, and interned capability names used for O(1) dependency matching.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod intern;

pub use fingerprint::Fingerprint;
pub use intern::{Name, NameTable};
