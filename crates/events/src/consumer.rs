//! Control-stream consumer task.
//!
//! One consumer runs per worker, feeding that worker's [`BroadcastState`]
//! from a [`ControlBus`] subscription. A lagged receiver means control
//! records were dropped; the state may then miss hooks until the registry
//! republishes, which is logged loudly.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

use intake_core::control::ControlRecord;

use crate::state::BroadcastState;

pub struct ControlConsumer {
    worker_id: usize,
    state: Arc<BroadcastState>,
    receiver: Receiver<ControlRecord>,
}

impl ControlConsumer {
    pub fn new(
        worker_id: usize,
        state: Arc<BroadcastState>,
        receiver: Receiver<ControlRecord>,
    ) -> Self {
        Self {
            worker_id,
            state,
            receiver,
        }
    }

    /// Consume control records until the bus closes or shutdown is signalled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::debug!(worker_id = self.worker_id, "Control consumer started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(worker_id = self.worker_id, "Control consumer shutting down");
                    break;
                }
                result = self.receiver.recv() => match result {
                    Ok(record) => {
                        tracing::debug!(
                            worker_id = self.worker_id,
                            hook_id = %record.hook_id,
                            operation = %record.operation,
                            message_type = %record.message_type,
                            "Applying control record"
                        );
                        self.state.apply(&record);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            worker_id = self.worker_id,
                            skipped,
                            "Control consumer lagged, hook state may be stale until republish"
                        );
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!(worker_id = self.worker_id, "Control bus closed");
                        break;
                    }
                },
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
