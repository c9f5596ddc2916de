//! Text grammars of both relationship encodings.
//!
//! # Responsibility
//! - `keyed`: `RELATED[...]` field names and their reference values.
//! - `body_list`: bulleted lines under a `Related` heading.
//!
//! # Invariants
//! - Reads are tolerant, writes are canonical: several input shapes are
//!   accepted but exactly one output shape is ever produced.

pub mod body_list;
pub mod keyed;
