//! Sibling rebalancing for moves that find no free slot.
//!
//! # Responsibility
//! - Plan the order updates that place an item before/after a comparison
//!   sibling, displacing neighbors when the target gap has no midpoint.
//!
//! # Invariants
//! - Planning is pure: it works on a local copy of the sibling list and
//!   returns the updates for the caller to persist as one unit.
//! - Displacement walks strictly towards later siblings, so the worklist
//!   shrinks and the loop terminates within the sibling count.
//! - The terminal case (no further neighbor) is a single-bound allocation,
//!   which always succeeds.

use super::alloc::{order_between, OrderBounds, OrderSlot};
use crate::model::entity::EntityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Direction of a relative move: before (`Up`) or after (`Down`) the
/// comparison sibling.
///
/// An enum rather than a string keeps any third direction unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Projection of one sibling used for planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sibling {
    pub id: EntityId,
    pub order: f64,
}

/// One planned order write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderUpdate {
    pub id: EntityId,
    pub order: f64,
}

/// Precondition violations; the plan never partially applies.
#[derive(Debug)]
pub enum RebalanceError {
    TargetNotFound(EntityId),
    ComparisonNotFound(EntityId),
    /// Moving an item relative to itself is undefined.
    SelfComparison(EntityId),
}

impl Display for RebalanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetNotFound(id) => write!(f, "move target not in sibling list: {id}"),
            Self::ComparisonNotFound(id) => {
                write!(f, "comparison sibling not in sibling list: {id}")
            }
            Self::SelfComparison(id) => write!(f, "cannot move {id} relative to itself"),
        }
    }
}

impl Error for RebalanceError {}

/// Plans the moves placing `id` directly before (`Up`) or after (`Down`)
/// `comparison_id` among `siblings`.
///
/// The returned updates are ordered displacements-first so applying them
/// sequentially is also valid, though callers should persist them as one
/// batch.
pub fn plan_move(
    siblings: &[Sibling],
    id: EntityId,
    comparison_id: EntityId,
    direction: MoveDirection,
) -> Result<Vec<OrderUpdate>, RebalanceError> {
    if id == comparison_id {
        return Err(RebalanceError::SelfComparison(id));
    }
    let mut list = siblings.to_vec();
    if !list.iter().any(|sibling| sibling.id == id) {
        return Err(RebalanceError::TargetNotFound(id));
    }
    if !list.iter().any(|sibling| sibling.id == comparison_id) {
        return Err(RebalanceError::ComparisonNotFound(comparison_id));
    }

    let mut plan = Vec::new();
    // Each displacement widens the requested gap by at least one ulp, so
    // the retry count stays within the sibling count.
    let attempt_bound = list.len() + 1;
    for _ in 0..attempt_bound {
        let comparison_order = order_of(&list, comparison_id);
        let bounds = match direction {
            MoveDirection::Up => OrderBounds {
                min: nearest_below(&list, comparison_order).map(|sibling| sibling.order),
                max: Some(comparison_order),
            },
            MoveDirection::Down => OrderBounds {
                min: Some(comparison_order),
                max: nearest_above(&list, comparison_order).map(|sibling| sibling.order),
            },
        };
        match order_between(bounds) {
            OrderSlot::Value(order) => {
                set_order(&mut list, id, order);
                plan.push(OrderUpdate { id, order });
                return Ok(plan);
            }
            OrderSlot::NoRoom => {
                // NoRoom implies both bounds were present, so the displaced
                // sibling exists in either direction.
                let displaced = match direction {
                    MoveDirection::Up => comparison_id,
                    MoveDirection::Down => nearest_above(&list, comparison_order)
                        .map(|sibling| sibling.id)
                        .unwrap_or(comparison_id),
                };
                log::debug!(
                    "event=order_no_room module=order displaced={displaced} direction={direction:?}"
                );
                nudge_down(&mut list, &mut plan, displaced);
            }
        }
    }
    unreachable!("order rebalance exceeded its sibling-count bound");
}

/// Re-homes `start` one step towards its next neighbor, cascading down the
/// chain when intermediate gaps are also exhausted.
fn nudge_down(list: &mut Vec<Sibling>, plan: &mut Vec<OrderUpdate>, start: EntityId) {
    let mut pending = vec![start];
    let step_bound = 2 * list.len() + 2;
    let mut steps = 0usize;
    while let Some(&current) = pending.last() {
        steps += 1;
        assert!(steps <= step_bound, "nudge cascade exceeded sibling bound");

        let current_order = order_of(list, current);
        let next = nearest_above(list, current_order);
        let bounds = OrderBounds {
            min: Some(current_order),
            max: next.map(|sibling| sibling.order),
        };
        match order_between(bounds) {
            OrderSlot::Value(order) => {
                set_order(list, current, order);
                plan.push(OrderUpdate { id: current, order });
                pending.pop();
            }
            OrderSlot::NoRoom => {
                let next = next.expect("NoRoom implies a next sibling exists");
                pending.push(next.id);
            }
        }
    }
}

fn order_of(list: &[Sibling], id: EntityId) -> f64 {
    list.iter()
        .find(|sibling| sibling.id == id)
        .map(|sibling| sibling.order)
        .expect("sibling presence checked on entry")
}

fn set_order(list: &mut [Sibling], id: EntityId, order: f64) {
    if let Some(sibling) = list.iter_mut().find(|sibling| sibling.id == id) {
        sibling.order = order;
    }
}

fn nearest_below(list: &[Sibling], order: f64) -> Option<Sibling> {
    list.iter()
        .filter(|sibling| sibling.order < order)
        .max_by(|a, b| a.order.total_cmp(&b.order))
        .copied()
}

fn nearest_above(list: &[Sibling], order: f64) -> Option<Sibling> {
    list.iter()
        .filter(|sibling| sibling.order > order)
        .min_by(|a, b| a.order.total_cmp(&b.order))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::{plan_move, MoveDirection, OrderUpdate, RebalanceError, Sibling};
    use uuid::Uuid;

    fn siblings(orders: &[f64]) -> Vec<Sibling> {
        orders
            .iter()
            .map(|&order| Sibling {
                id: Uuid::new_v4(),
                order,
            })
            .collect()
    }

    fn apply(list: &mut [Sibling], plan: &[OrderUpdate]) {
        for update in plan {
            if let Some(sibling) = list.iter_mut().find(|sibling| sibling.id == update.id) {
                sibling.order = update.order;
            }
        }
    }

    fn rank(list: &[Sibling], id: Uuid) -> usize {
        let mut sorted: Vec<&Sibling> = list.iter().collect();
        sorted.sort_by(|a, b| a.order.total_cmp(&b.order));
        sorted.iter().position(|sibling| sibling.id == id).unwrap()
    }

    #[test]
    fn move_up_lands_directly_before_comparison() {
        let mut list = siblings(&[1000.0, 2000.0, 3000.0]);
        let target = list[2].id;
        let comparison = list[0].id;

        let plan = plan_move(&list, target, comparison, MoveDirection::Up).unwrap();
        apply(&mut list, &plan);

        assert_eq!(rank(&list, target), 0);
        assert_eq!(rank(&list, comparison), 1);
    }

    #[test]
    fn move_down_lands_directly_after_comparison() {
        let mut list = siblings(&[1000.0, 2000.0, 3000.0]);
        let target = list[0].id;
        let comparison = list[2].id;

        let plan = plan_move(&list, target, comparison, MoveDirection::Down).unwrap();
        apply(&mut list, &plan);

        assert_eq!(rank(&list, comparison), 1);
        assert_eq!(rank(&list, target), 2);
    }

    #[test]
    fn exhausted_gap_displaces_the_comparison_sibling() {
        // a and b are adjacent at the precision floor; moving c before b
        // must shove b towards c's old slot instead of failing.
        let a = 1000.0_f64;
        let b = f64::from_bits(a.to_bits() + 1);
        let mut list = siblings(&[a, b, 3000.0]);
        let target = list[2].id;
        let comparison = list[1].id;

        let plan = plan_move(&list, target, comparison, MoveDirection::Up).unwrap();
        assert!(plan.len() > 1, "expected a displacement before the move");
        apply(&mut list, &plan);

        assert_eq!(rank(&list, list[0].id), 0);
        assert_eq!(rank(&list, target), 1);
        assert_eq!(rank(&list, comparison), 2);
    }

    #[test]
    fn exhausted_tail_gap_cascades_past_the_last_sibling() {
        let a = 1000.0_f64;
        let b = f64::from_bits(a.to_bits() + 1);
        let mut list = siblings(&[500.0, a, b]);
        let target = list[0].id;
        let comparison = list[1].id;

        let plan = plan_move(&list, target, comparison, MoveDirection::Down).unwrap();
        apply(&mut list, &plan);

        assert_eq!(rank(&list, comparison), 0);
        assert_eq!(rank(&list, target), 1);
        assert_eq!(rank(&list, list[2].id), 2);
    }

    #[test]
    fn self_comparison_is_rejected() {
        let list = siblings(&[1000.0, 2000.0]);
        let err = plan_move(&list, list[0].id, list[0].id, MoveDirection::Up).unwrap_err();
        assert!(matches!(err, RebalanceError::SelfComparison(_)));
    }

    #[test]
    fn unknown_identities_are_rejected_without_a_plan() {
        let list = siblings(&[1000.0]);
        let ghost = Uuid::new_v4();
        assert!(matches!(
            plan_move(&list, ghost, list[0].id, MoveDirection::Up),
            Err(RebalanceError::TargetNotFound(_))
        ));
        assert!(matches!(
            plan_move(&list, list[0].id, ghost, MoveDirection::Down),
            Err(RebalanceError::ComparisonNotFound(_))
        ));
    }
}
