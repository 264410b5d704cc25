//! Fractional ordering for sibling sets.
//!
//! # Responsibility
//! - Allocate order values between neighbors without renumbering siblings.
//! - Rebalance neighbors when the gap has no representable midpoint.
//!
//! # Invariants
//! - Allocation is pure and deterministic; "no room" is a sentinel value,
//!   never an error.
//! - Rebalancing terminates within a bound derived from the sibling count.

pub mod alloc;
pub mod rebalance;
