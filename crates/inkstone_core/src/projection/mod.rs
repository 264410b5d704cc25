//! Reactive projection from store state into the UI snapshot.
//!
//! # Responsibility
//! - Own the single presentation-facing snapshot and rebuild it from the
//!   live result sets.
//!
//! # Invariants
//! - The engine is the only writer of the snapshot; everything else reads.
//! - A completed rebuild leaves no dangling reference to a deleted entity.

pub mod engine;
pub mod snapshot;
