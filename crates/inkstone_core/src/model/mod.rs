//! Canonical domain records for notebook/category/note data.
//!
//! # Responsibility
//! - Define the record shapes persisted by the store collaborator.
//! - Keep ordering and identity conventions in one place.
//!
//! # Invariants
//! - Every record is identified by a stable `EntityId`.
//! - `order` values produce a total order among siblings; ties are broken
//!   by id for determinism.

pub mod entity;
