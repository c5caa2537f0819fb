//! Post-creation order lifecycle.

use common::OrderId;
use market_store::{MarketStore, Order, OrderStatus};

use crate::error::WorkflowError;

/// Moves orders through the forward-only status machine.
///
/// The transition table on [`OrderStatus`] is the single source of truth for
/// which moves are *valid*; who is allowed to request a given move is an
/// authorization concern that lives outside this crate.
pub struct OrderWorkflow<S> {
    store: S,
}

impl<S: MarketStore> OrderWorkflow<S> {
    /// Creates a workflow over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Applies a status transition, enforcing the state machine.
    ///
    /// Fails with [`WorkflowError::InvalidTransition`] when the requested
    /// status is not reachable from the order's current status; the stored
    /// status is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn transition(&self, id: OrderId, to: OrderStatus) -> Result<Order, WorkflowError> {
        let order = self
            .store
            .order(id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))?;

        if !order.status.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition {
                from: order.status,
                to,
            });
        }

        self.store
            .set_order_status(id, to)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))
    }

    /// Sets a status directly, bypassing the transition table.
    ///
    /// This is the marketplace-admin override. It exists as a separate
    /// operation (rather than a flag on [`transition`](Self::transition)) so
    /// callers cannot accidentally widen the machine for ordinary users.
    #[tracing::instrument(skip(self))]
    pub async fn force_set(&self, id: OrderId, to: OrderStatus) -> Result<Order, WorkflowError> {
        tracing::info!(order_id = %id, status = %to, "admin status override");
        self.store
            .set_order_status(id, to)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))
    }
}
