//! Drag-and-drop status transitions.
//!
//! A drop moves the card on the board right away and hands back a
//! [`PendingMove`] describing the status update to send. When the request
//! settles, [`DragController::resolve`] reconciles the board: only the most
//! recent move for a task may touch its card, and a failed latest move either
//! rolls the card back to its last confirmed column or leaves it where it was
//! dropped, depending on the [`FailurePolicy`].

use crate::api::TaskApi;
use crate::board::BoardView;
use crate::config::FailurePolicy;
use crate::error::ApiError;
use crate::models::{Status, Task, TaskId};
use crate::notify::{Level, Notifier};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardState {
    Idle,
    Dragging,
    DroppedPending,
    Reconciled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    pub task_id: TaskId,
    pub origin: Status,
    pub hover: Option<Status>,
}

/// A status update that has been applied optimistically and still needs to be
/// sent and resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMove {
    pub task_id: TaskId,
    pub target: Status,
    pub seq: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    RolledBack(Status),
    KeptOptimistic,
    /// A newer move for the same task was issued after this one.
    Stale,
    /// The task is no longer tracked (board reloaded or task deleted).
    Discarded,
}

#[derive(Debug)]
struct TaskLedger {
    confirmed: Status,
    confirmed_seq: u64,
    latest_seq: u64,
    in_flight: u32,
    settled: bool,
    /// The latest move failed and the card was put back on `confirmed`.
    rolled_back: bool,
}

#[derive(Debug)]
pub struct DragController {
    session: Option<DragSession>,
    ledgers: HashMap<TaskId, TaskLedger>,
    next_seq: u64,
    policy: FailurePolicy,
}

impl DragController {
    pub fn new(policy: FailurePolicy) -> DragController {
        DragController {
            session: None,
            ledgers: HashMap::new(),
            next_seq: 1,
            policy,
        }
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn card_state(&self, task_id: TaskId) -> CardState {
        if self.session.as_ref().map(|s| s.task_id) == Some(task_id) {
            return CardState::Dragging;
        }
        match self.ledgers.get(&task_id) {
            Some(ledger) if ledger.in_flight > 0 => CardState::DroppedPending,
            Some(ledger) if ledger.settled => CardState::Reconciled,
            _ => CardState::Idle,
        }
    }

    pub fn on_drag_start<V: BoardView>(&mut self, view: &mut V, task_id: TaskId) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some(origin) = view.column_of(task_id) else {
            warn!(task_id, "drag started on a card that is not on the board");
            return false;
        };
        view.set_dragging(task_id, true);
        debug!(task_id, %origin, "drag started");
        self.session = Some(DragSession {
            task_id,
            origin,
            hover: None,
        });
        true
    }

    /// Gesture ended without a drop.
    pub fn on_drag_end<V: BoardView>(&mut self, view: &mut V) {
        if let Some(session) = self.session.take() {
            view.set_dragging(session.task_id, false);
            if let Some(hover) = &session.hover {
                view.set_highlight(hover, false);
            }
            debug!(task_id = session.task_id, "drag cancelled");
        }
    }

    pub fn on_column_enter<V: BoardView>(&mut self, view: &mut V, status: &Status) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(previous) = session.hover.replace(status.clone()) {
            if &previous != status {
                view.set_highlight(&previous, false);
            }
        }
        view.set_highlight(status, true);
    }

    pub fn on_column_leave<V: BoardView>(&mut self, view: &mut V, status: &Status) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        view.set_highlight(status, false);
        if session.hover.as_ref() == Some(status) {
            session.hover = None;
        }
    }

    /// Completes the gesture over the column for `status`: the card moves now,
    /// before anything is sent. Returns the update to issue, or `None` when the
    /// drop cannot be applied.
    pub fn on_drop<V: BoardView>(&mut self, view: &mut V, status: &Status) -> Option<PendingMove> {
        let session = self.session.take()?;
        if let Some(hover) = &session.hover {
            view.set_highlight(hover, false);
        }
        view.set_highlight(status, false);
        view.set_dragging(session.task_id, false);

        if !view.has_column(status) {
            warn!(task_id = session.task_id, %status, "drop on unknown column");
            return None;
        }
        if view.column_of(session.task_id).is_none() {
            warn!(task_id = session.task_id, "dropped card is no longer on the board");
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let ledger = self
            .ledgers
            .entry(session.task_id)
            .or_insert_with(|| TaskLedger {
                confirmed: session.origin.clone(),
                confirmed_seq: 0,
                latest_seq: 0,
                in_flight: 0,
                settled: false,
                rolled_back: false,
            });
        ledger.latest_seq = seq;
        ledger.in_flight += 1;
        ledger.settled = false;
        ledger.rolled_back = false;

        view.move_card(session.task_id, status);
        debug!(task_id = session.task_id, %status, seq, "card dropped");

        Some(PendingMove {
            task_id: session.task_id,
            target: status.clone(),
            seq,
        })
    }

    pub fn resolve<V: BoardView, N: Notifier>(
        &mut self,
        view: &mut V,
        notifier: &mut N,
        pending: &PendingMove,
        result: Result<Task, ApiError>,
    ) -> Resolution {
        let Some(ledger) = self.ledgers.get_mut(&pending.task_id) else {
            debug!(task_id = pending.task_id, seq = pending.seq, "discarding untracked resolution");
            return Resolution::Discarded;
        };
        ledger.in_flight = ledger.in_flight.saturating_sub(1);
        let latest = pending.seq == ledger.latest_seq;

        match result {
            Ok(task) => {
                if pending.seq > ledger.confirmed_seq {
                    ledger.confirmed = task.status.clone();
                    ledger.confirmed_seq = pending.seq;
                }
                if !latest {
                    // After a rollback the card shows the confirmed status,
                    // which an older success may have just advanced.
                    if ledger.rolled_back {
                        view.move_card(pending.task_id, &ledger.confirmed);
                    }
                    debug!(task_id = pending.task_id, seq = pending.seq, "stale confirmation");
                    return Resolution::Stale;
                }
                ledger.settled = true;
                view.move_card(pending.task_id, &task.status);
                notifier.notify("Task status updated".to_string(), Level::Success);
                Resolution::Confirmed
            }
            Err(err) => {
                warn!(task_id = pending.task_id, seq = pending.seq, status = ?err.status(), "status update failed");
                notifier.notify(
                    format!("Failed to update task status: {}", err),
                    Level::Danger,
                );
                if !latest {
                    return Resolution::Stale;
                }
                ledger.settled = true;
                match self.policy {
                    FailurePolicy::Rollback => {
                        let previous = ledger.confirmed.clone();
                        ledger.rolled_back = true;
                        view.move_card(pending.task_id, &previous);
                        Resolution::RolledBack(previous)
                    }
                    FailurePolicy::KeepOptimistic => Resolution::KeptOptimistic,
                }
            }
        }
    }

    /// Stops tracking a task, e.g. after it was deleted.
    pub fn forget(&mut self, task_id: TaskId) {
        self.ledgers.remove(&task_id);
    }

    /// Drops all bookkeeping. Responses still in flight are discarded when
    /// they arrive.
    pub fn reset(&mut self) {
        self.session = None;
        self.ledgers.clear();
    }
}

pub async fn send_status_update<A: TaskApi + ?Sized>(
    api: &A,
    pending: &PendingMove,
) -> Result<Task, ApiError> {
    api.update_task_status(pending.task_id, &pending.target)
        .await
}
