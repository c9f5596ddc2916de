//! Collaborator contracts for document storage and the contact index.
//!
//! # Responsibility
//! - Define the whole-document read/write and name/UID lookup contracts the
//!   engine consumes.
//! - Ship two implementations: in-memory (tests, embedding hosts) and a
//!   markdown directory on disk.
//!
//! # Invariants
//! - Writes invalidate the metadata cache of the written handle, so a read
//!   right after a write reflects it.
//! - The engine never mutates the index directly; all mutation is a
//!   whole-document write.

pub mod fs_vault;
pub mod memory_vault;
pub mod vault;
