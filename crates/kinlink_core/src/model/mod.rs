//! Contact-graph domain model.
//!
//! # Responsibility
//! - Define the value types every component exchanges: contacts, both
//!   relationship encodings, and the ordered metadata block.
//!
//! # Invariants
//! - Nothing in this module performs I/O; every value is rebuilt from
//!   document content on each operation.
//! - Keyed-encoding relationship types are always genderless.

pub mod contact;
pub mod metadata;
pub mod relationship;
