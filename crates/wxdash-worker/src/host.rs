//! Runtime adapter: feeds lifecycle and fetch events to a [`ServiceWorker`].
//!
//! Events travel over an mpsc channel to a single loop task. Install and
//! activate are handled inline, in arrival order. Each fetch gets its own
//! task so in-flight requests never wait on each other.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::fetch::{FetchError, Fetcher};
use crate::http::{Request, Response};
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::worker::ServiceWorker;

const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Worker event loop has stopped")]
    Closed,

    #[error(transparent)]
    Network(#[from] FetchError),
}

/// Events delivered to the worker loop.
#[derive(Debug)]
pub enum WorkerEvent {
    Install {
        done: oneshot::Sender<InstallReport>,
    },
    Activate {
        done: oneshot::Sender<ActivateReport>,
    },
    Fetch {
        request: Request,
        respond_to: oneshot::Sender<Response>,
    },
}

/// Reports produced while registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub install: InstallReport,
    /// Present when install asked to skip waiting.
    pub activate: Option<ActivateReport>,
}

/// Handle to a registered worker.
#[derive(Clone)]
pub struct WorkerHost {
    events: mpsc::Sender<WorkerEvent>,
    worker: Arc<dyn ServiceWorker>,
    network: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHost")
            .field("controlling", &self.worker.is_controlling())
            .field("closed", &self.events.is_closed())
            .finish()
    }
}

impl WorkerHost {
    /// Start the event loop, install the worker and activate it when it
    /// skips waiting.
    ///
    /// `network` serves requests issued before the worker controls clients.
    pub async fn register(
        worker: Arc<dyn ServiceWorker>,
        network: Arc<dyn Fetcher>,
    ) -> Result<(Self, Registration), HostError> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        tokio::spawn(run_event_loop(worker.clone(), rx));

        let host = Self {
            events: tx,
            worker,
            network,
        };

        let install = host.install().await?;
        let activate = if install.skip_waiting {
            Some(host.activate().await?)
        } else {
            None
        };

        Ok((host, Registration { install, activate }))
    }

    pub async fn install(&self) -> Result<InstallReport, HostError> {
        let (done, rx) = oneshot::channel();
        self.send(WorkerEvent::Install { done }).await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    pub async fn activate(&self) -> Result<ActivateReport, HostError> {
        let (done, rx) = oneshot::channel();
        self.send(WorkerEvent::Activate { done }).await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    pub fn is_controlling(&self) -> bool {
        self.worker.is_controlling()
    }

    /// Issue a request the way a page would.
    pub async fn fetch(&self, request: Request) -> Result<Response, HostError> {
        if !self.worker.is_controlling() {
            tracing::debug!("Worker not controlling, {} goes to the network", request.url());
            return Ok(self.network.fetch(&request).await?);
        }

        let (respond_to, rx) = oneshot::channel();
        self.send(WorkerEvent::Fetch {
            request,
            respond_to,
        })
        .await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    async fn send(&self, event: WorkerEvent) -> Result<(), HostError> {
        self.events.send(event).await.map_err(|_| HostError::Closed)
    }
}

async fn run_event_loop(worker: Arc<dyn ServiceWorker>, mut events: mpsc::Receiver<WorkerEvent>) {
    tracing::debug!("Worker event loop started");

    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Install { done } => {
                let report = worker.on_install().await;
                let _ = done.send(report);
            }
            WorkerEvent::Activate { done } => {
                let report = worker.on_activate().await;
                let _ = done.send(report);
            }
            WorkerEvent::Fetch {
                request,
                respond_to,
            } => {
                let worker = worker.clone();
                tokio::spawn(async move {
                    let response = worker.on_fetch(request).await;
                    if respond_to.send(response).is_err() {
                        tracing::debug!("Fetch caller went away before the response");
                    }
                });
            }
        }
    }

    tracing::debug!("Worker event loop stopped");
}
