//! Order status transitions and cancellation compensation.

use common::{HistoryAction, OrderHistory, OrderStatus};
use store::{CatalogGateway, OrderStore};

use crate::error::DomainError;

use super::UpdateOrderStatus;

/// Checks whether an order in `from` may move to `to`.
///
/// Terminal states are reported with their own errors before the
/// transition table is consulted.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), DomainError> {
    if from.is_terminal() {
        return Err(match from {
            OrderStatus::Cancelled => DomainError::AlreadyCancelled,
            _ => DomainError::AlreadyDelivered,
        });
    }
    if !from.can_transition_to(to) {
        return Err(DomainError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Moves orders through their lifecycle.
///
/// The status write, the stock reversion and the history append are
/// separate store calls: when reversion fails the order stays cancelled and
/// the caller gets [`DomainError::CompensationFailed`].
///
/// The status write only succeeds if the order still has the status the
/// transition was checked against. A lost race re-reads the order and
/// checks again, so two callers can never both leave the same status.
pub struct OrderStatusEngine<C, S> {
    catalog: C,
    orders: S,
}

impl<C, S> OrderStatusEngine<C, S>
where
    C: CatalogGateway,
    S: OrderStore,
{
    pub fn new(catalog: C, orders: S) -> Self {
        Self { catalog, orders }
    }

    /// Applies a status change.
    ///
    /// Cancellation by an admin returns every line's quantity to stock;
    /// cancellation by anyone else leaves stock untouched.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, to = %cmd.new_status))]
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<(), DomainError> {
        let (mut order, from) = loop {
            let order = self
                .orders
                .get_by_id(cmd.order_id)
                .await?
                .ok_or(DomainError::OrderNotFound(cmd.order_id))?;

            check_transition(order.status, cmd.new_status)?;

            let written = self
                .orders
                .update_status(order.id, order.status, cmd.new_status)
                .await
                .map_err(DomainError::StatusUpdateFailed)?;
            if written {
                let from = order.status;
                break (order, from);
            }
            // Statuses only move forward, so retries are bounded.
            tracing::debug!(order_id = %order.id, "order status changed concurrently, retrying");
        };
        order.status = cmd.new_status;
        metrics::counter!("order_status_updates_total", "status" => cmd.new_status.as_str())
            .increment(1);
        tracing::info!(%from, actor = %cmd.actor.user_id, "order status updated");

        if cmd.actor.is_admin && cmd.new_status == OrderStatus::Cancelled {
            let items = self
                .orders
                .get_items_by_order_id(order.id)
                .await
                .map_err(|source| {
                    tracing::error!(
                        order_id = %order.id,
                        error = %source,
                        "could not load items of cancelled order"
                    );
                    DomainError::CompensationFailed {
                        order_id: order.id,
                        product_id: None,
                        source,
                    }
                })?;
            for item in &items {
                self.catalog
                    .revert_stock(item.product_id, item.quantity)
                    .await
                    .map_err(|source| {
                        tracing::error!(
                            order_id = %order.id,
                            product_id = %item.product_id,
                            error = %source,
                            "stock reversion failed after cancellation"
                        );
                        DomainError::CompensationFailed {
                            order_id: order.id,
                            product_id: Some(item.product_id),
                            source,
                        }
                    })?;
                metrics::counter!("stock_reversions_total").increment(1);
            }
            tracing::info!(lines = items.len(), "stock reverted for cancelled order");
        }

        let record = OrderHistory::snapshot(
            &order,
            cmd.actor.user_id,
            HistoryAction::for_status(cmd.new_status),
        );
        if let Err(e) = self.orders.append_history(record).await {
            metrics::counter!("order_history_append_failed_total").increment(1);
            tracing::warn!(order_id = %order.id, error = %e, "failed to append order history");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions_pass() {
        use OrderStatus::*;
        for (from, to) in [
            (Pending, Preparing),
            (Pending, Cancelled),
            (Preparing, Ready),
            (Preparing, Cancelled),
            (Ready, Delivered),
            (Ready, Cancelled),
        ] {
            assert!(check_transition(from, to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn terminal_states_report_specific_errors() {
        for to in OrderStatus::ALL {
            assert!(matches!(
                check_transition(OrderStatus::Cancelled, to),
                Err(DomainError::AlreadyCancelled)
            ));
            assert!(matches!(
                check_transition(OrderStatus::Delivered, to),
                Err(DomainError::AlreadyDelivered)
            ));
        }
    }

    #[test]
    fn everything_else_is_invalid() {
        use OrderStatus::*;
        for (from, to) in [
            (Pending, Pending),
            (Pending, Ready),
            (Pending, Delivered),
            (Preparing, Pending),
            (Preparing, Preparing),
            (Preparing, Delivered),
            (Ready, Pending),
            (Ready, Preparing),
            (Ready, Ready),
        ] {
            assert!(matches!(
                check_transition(from, to),
                Err(DomainError::InvalidTransition { from: f, to: t }) if f == from && t == to
            ));
        }
    }
}
