//! Order status transition rules
//!
//! The single source of truth for which status moves are legal. Handlers
//! call [`assert_transition`] before emitting a status-changing event;
//! nothing outside this module hardcodes the graph.

use shared::order::OrderStatus;

use super::traits::OrderError;

/// Statuses reachable in one step from `from`
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
        OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
        OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
        OrderStatus::Shipped => &[OrderStatus::Delivered],
        OrderStatus::Delivered => &[OrderStatus::Returned],
        OrderStatus::Cancelled | OrderStatus::Returned => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn assert_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 7] = [
        Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned,
    ];

    #[test]
    fn test_full_transition_matrix() {
        let legal = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Processing),
            (Confirmed, Cancelled),
            (Processing, Shipped),
            (Processing, Cancelled),
            (Shipped, Delivered),
            (Delivered, Returned),
        ];

        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(allowed_transitions(Cancelled).is_empty());
        assert!(allowed_transitions(Returned).is_empty());
    }

    #[test]
    fn test_shipped_cannot_be_cancelled() {
        assert!(!can_transition(Shipped, Cancelled));
        let err = assert_transition(Shipped, Cancelled).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: Shipped,
                to: Cancelled
            }
        );
    }

    #[test]
    fn test_self_transitions_rejected() {
        for status in ALL {
            assert!(!can_transition(status, status), "{status} -> {status}");
        }
    }
}
