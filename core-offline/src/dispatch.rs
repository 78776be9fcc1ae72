//! Ordered engine command dispatch
//!
//! Commands are queued on an unbounded channel and executed one at a time by
//! a single worker task, so the engine sees adds and removes in the order the
//! tracker issued them and callers never wait on the engine.

use bridge_traits::{DownloadRequest, TransferEngine};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{OfflineError, Result};

#[derive(Debug)]
pub(crate) enum EngineCommand {
    /// The sender learns whether the engine accepted the download
    Add(DownloadRequest, oneshot::Sender<bool>),
    Remove(String),
    /// Acknowledged once every earlier command has been handed to the engine
    Barrier(oneshot::Sender<()>),
}

/// The worker drains whatever is queued and exits once the dispatcher is
/// dropped.
pub(crate) struct CommandDispatcher {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl CommandDispatcher {
    pub(crate) fn spawn(engine: Arc<dyn TransferEngine>, runtime: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(engine, receiver));
        Self { sender }
    }

    /// Queue an add. The receiver resolves once the engine has answered;
    /// it errors if the worker stopped first.
    pub(crate) fn add(&self, request: DownloadRequest) -> Result<oneshot::Receiver<bool>> {
        let (accepted, outcome) = oneshot::channel();
        self.send(EngineCommand::Add(request, accepted))?;
        Ok(outcome)
    }

    pub(crate) fn remove(&self, download_id: &str) -> Result<()> {
        self.send(EngineCommand::Remove(download_id.to_string()))
    }

    /// Resolves when every command queued before this call has been handed to
    /// the engine. Resolves immediately if the worker is gone.
    pub(crate) async fn barrier(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(EngineCommand::Barrier(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|e| OfflineError::Dispatch(format!("dispatcher stopped, dropped {:?}", e.0)))
    }
}

async fn run_worker(
    engine: Arc<dyn TransferEngine>,
    mut receiver: mpsc::UnboundedReceiver<EngineCommand>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            EngineCommand::Add(request, accepted) => {
                let download_id = request.id.clone();
                let outcome = match engine.add_download(request).await {
                    Ok(()) => {
                        debug!(download_id = %download_id, "Add command sent to engine");
                        true
                    }
                    Err(e) => {
                        warn!(download_id = %download_id, error = %e, "Engine rejected add command");
                        false
                    }
                };
                let _ = accepted.send(outcome);
            }
            EngineCommand::Remove(download_id) => match engine.remove_download(&download_id).await {
                Ok(()) => debug!(download_id = %download_id, "Remove command sent to engine"),
                Err(e) => warn!(download_id = %download_id, error = %e, "Engine rejected remove command"),
            },
            EngineCommand::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Command dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, SourceLocator, TransferEventReceiver};
    use mockall::mock;

    mock! {
        Engine {}

        #[async_trait]
        impl TransferEngine for Engine {
            async fn add_download(&self, request: DownloadRequest) -> BridgeResult<()>;
            async fn remove_download(&self, download_id: &str) -> BridgeResult<()>;
            fn subscribe(&self) -> TransferEventReceiver;
        }
    }

    fn request(id: &str) -> DownloadRequest {
        DownloadRequest::new(id, &SourceLocator::new("https://cdn.example.com/a.m3u8"), "A")
    }

    #[tokio::test]
    async fn test_add_reports_engine_verdict() {
        let mut engine = MockEngine::new();
        engine
            .expect_add_download()
            .withf(|request| request.id == "ok")
            .times(1)
            .returning(|_| Ok(()));
        engine
            .expect_add_download()
            .withf(|request| request.id == "full")
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("queue full".to_string())));

        let dispatcher = CommandDispatcher::spawn(Arc::new(engine), &Handle::current());

        assert!(dispatcher.add(request("ok")).unwrap().await.unwrap());
        assert!(!dispatcher.add(request("full")).unwrap().await.unwrap());
    }
}
