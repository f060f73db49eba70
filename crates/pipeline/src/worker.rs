//! Pipeline worker: the long-lived task that drives one transform stage.
//!
//! All workers compete on a single shared main channel (an `mpsc` receiver
//! behind a mutex); whichever worker locks it next takes the next message,
//! so a slow transformation on one worker never stalls the others beyond
//! that one message.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use intake_core::message::{FailedMessage, RawMessage, TransformedMessage};

use crate::transform::{TransformOutcome, TransformStage};

/// Output channels shared by all workers.
#[derive(Clone)]
pub struct WorkerChannels {
    pub success: mpsc::Sender<TransformedMessage>,
    pub dead_letter: mpsc::Sender<FailedMessage>,
}

pub struct TransformWorker {
    worker_id: usize,
    stage: TransformStage,
    input: Arc<Mutex<mpsc::Receiver<RawMessage>>>,
    channels: WorkerChannels,
}

impl TransformWorker {
    pub fn new(
        worker_id: usize,
        stage: TransformStage,
        input: Arc<Mutex<mpsc::Receiver<RawMessage>>>,
        channels: WorkerChannels,
    ) -> Self {
        Self {
            worker_id,
            stage,
            input,
            channels,
        }
    }

    /// Pull messages until the main channel closes or shutdown is
    /// signalled. Messages already taken are finished before exiting.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(worker_id = self.worker_id, "Transform worker started");
        loop {
            let message = {
                let mut input = self.input.lock().await;
                tokio::select! {
                    _ = shutdown.cancelled() => None,
                    msg = input.recv() => msg,
                }
            };
            let Some(message) = message else {
                break;
            };
            self.handle(message).await;
        }
        tracing::info!(worker_id = self.worker_id, "Transform worker stopped");
    }

    async fn handle(&mut self, message: RawMessage) {
        match self.stage.transform(&message) {
            TransformOutcome::Success(out) => {
                if self.channels.success.send(out).await.is_err() {
                    tracing::error!(
                        worker_id = self.worker_id,
                        message_id = %message.message_id,
                        "Success channel closed, dropping transformed message"
                    );
                }
            }
            TransformOutcome::Failed(failed) => {
                if self.channels.dead_letter.send(failed).await.is_err() {
                    tracing::error!(
                        worker_id = self.worker_id,
                        message_id = %message.message_id,
                        "Dead-letter channel closed, dropping failure record"
                    );
                }
            }
            TransformOutcome::NoMatch => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
