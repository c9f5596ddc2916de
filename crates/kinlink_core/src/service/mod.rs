//! Use-case services of the relationship engine.
//!
//! # Responsibility
//! - Orchestrate parser, codec and taxonomy calls into whole-document
//!   read-compute-write operations.
//! - Keep hosts decoupled from storage details.
//!
//! # Invariants
//! - Services hold no state across calls; every call re-reads documents.
//! - Each touched document is written at most once per call.
//! - Per-item problems are collected as strings; only a failure on the
//!   primary document aborts an operation.

pub mod contact_document;
pub mod reciprocal_service;
pub mod resolver;
pub mod sync_service;
pub mod uid_service;
