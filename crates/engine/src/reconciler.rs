use crate::error::EngineError;
use crate::lifecycle::SwapManager;
use core_types::{Order, OrderStatus};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub expired: usize,
    pub checked: usize,
    pub executed: usize,
    pub failed: usize,
}

enum OrderOutcome {
    Waiting,
    Executed,
    Failed,
}

/// The background task that moves open orders forward.
///
/// Each cycle expires stale orders, then checks every remaining pending order
/// for its deposit and executes the ones that have been paid. Errors are
/// contained per order so one bad order never stops the others.
pub struct Reconciler {
    manager: Arc<SwapManager>,
    period: Duration,
}

impl Reconciler {
    pub fn new(manager: Arc<SwapManager>, period: Duration) -> Self {
        Self { manager, period }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            expired: self.manager.expire_stale().await.len(),
            ..CycleReport::default()
        };

        let pending = self
            .manager
            .store()
            .list_by_status(OrderStatus::Pending)
            .await;
        report.checked = pending.len();

        let outcomes = join_all(pending.iter().map(|order| self.reconcile_order(order))).await;
        for outcome in outcomes {
            match outcome {
                OrderOutcome::Waiting => {}
                OrderOutcome::Executed => report.executed += 1,
                OrderOutcome::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn reconcile_order(&self, order: &Order) -> OrderOutcome {
        let check = match self.manager.check_deposit(&order.id).await {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Deposit check failed.");
                return OrderOutcome::Failed;
            }
        };
        let Some(deposit) = check.into_match() else {
            return OrderOutcome::Waiting;
        };

        match self.manager.execute(&order.id, Some(deposit)).await {
            Ok(_) => OrderOutcome::Executed,
            // Another caller got there first.
            Err(EngineError::InvalidState { status, .. }) => {
                tracing::debug!(order_id = %order.id, %status, "Order already moved on.");
                OrderOutcome::Waiting
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Execution failed during reconciliation.");
                OrderOutcome::Failed
            }
        }
    }

    /// Runs cycles every `period` until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn start(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(period_secs = self.period.as_secs(), "Starting reconciliation loop.");
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // The first tick is immediate.
                _ = timer.tick() => {
                    let report = self.run_cycle().await;
                    if report != CycleReport::default() {
                        tracing::info!(
                            expired = report.expired,
                            checked = report.checked,
                            executed = report.executed,
                            failed = report.failed,
                            "Reconciliation cycle complete."
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Reconciliation loop stopped.");
    }
}
