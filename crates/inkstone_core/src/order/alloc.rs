//! Order value allocation.
//!
//! # Responsibility
//! - Compute a fractional order value strictly inside an open interval.
//! - Provide the evenly spaced renumbering used to reset fragmentation.
//!
//! # Invariants
//! - Returned values are never equal to either bound.
//! - No store access, no randomness; trivially unit-testable.

/// First order value handed out for an empty sibling list.
pub const ORDER_START: f64 = 1000.0;

/// Stride used when only one bound constrains the allocation, and between
/// consecutive values of [`normalize_order_list`].
pub const ORDER_STEP: f64 = 1000.0;

/// Open-interval constraints for one allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrderBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl OrderBounds {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn above(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn below(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

/// Allocation outcome.
///
/// `NoRoom` is an expected, recoverable result: the interval holds no f64
/// distinguishable from both bounds. Callers resolve it by rebalancing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSlot {
    Value(f64),
    NoRoom,
}

impl OrderSlot {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(value),
            Self::NoRoom => None,
        }
    }
}

/// Returns an order value strictly between the given bounds.
///
/// - both bounds: midpoint, or `NoRoom` when the midpoint collapses onto a
///   bound at f64 precision;
/// - one bound: offset by [`ORDER_STEP`] in the open direction;
/// - no bounds: [`ORDER_START`].
///
/// Bounds must be finite with `min < max` when both are present; anything
/// else is a caller bug.
pub fn order_between(bounds: OrderBounds) -> OrderSlot {
    match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => {
            debug_assert!(min.is_finite() && max.is_finite());
            debug_assert!(min < max, "inverted bounds: {min} >= {max}");
            let mid = min + (max - min) / 2.0;
            if mid > min && mid < max {
                OrderSlot::Value(mid)
            } else {
                OrderSlot::NoRoom
            }
        }
        (Some(min), None) => {
            debug_assert!(min.is_finite());
            OrderSlot::Value(min + ORDER_STEP)
        }
        (None, Some(max)) => {
            debug_assert!(max.is_finite());
            OrderSlot::Value(max - ORDER_STEP)
        }
        (None, None) => OrderSlot::Value(ORDER_START),
    }
}

/// Returns `count` evenly spaced order values (`1000, 2000, ...`).
///
/// This is the circuit-breaker against precision loss from repeated
/// bisection. It is only ever invoked explicitly (operator-style reset);
/// the rebalancer recovers from `NoRoom` by shifting neighbors instead.
pub fn normalize_order_list(count: usize) -> Vec<f64> {
    (1..=count).map(|index| index as f64 * ORDER_STEP).collect()
}
