//! Create-operation handle.
//!
//! The object handed back to the host for an in-flight creation. It admits
//! exactly one caller to drive the work, rejects concurrent starts instead
//! of blocking them, and caches its result so every later call observes the
//! same answer without another network call.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio::sync::{watch, Notify};
use tracing::debug;
use ws_client::CreateRequest;
use ws_core::WsError;

use crate::creation::CreationManager;
use crate::instance::WorkstationInstance;

/// Forward-only lifecycle of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationPhase {
    NotStarted,
    InProgress,
    Completed,
}

/// Progress notification published while creation is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationProgress {
    pub message: String,
    /// 0-100.
    pub percent: u8,
}

/// Outcome of a creation, cached on the handle once set.
#[derive(Clone)]
pub enum CreateResult {
    Success(Arc<WorkstationInstance>),
    Failure { message: String, cause: String },
}

impl CreateResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CreateResult::Success(_))
    }

    pub fn instance(&self) -> Option<&Arc<WorkstationInstance>> {
        match self {
            CreateResult::Success(instance) => Some(instance),
            CreateResult::Failure { .. } => None,
        }
    }
}

impl std::fmt::Debug for CreateWorkstationOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateWorkstationOperation")
            .field("request", &self.request)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

pub struct CreateWorkstationOperation {
    manager: Arc<CreationManager>,
    request: CreateRequest,
    phase: Mutex<CreationPhase>,
    result: OnceLock<CreateResult>,
    done: Notify,
    progress_tx: watch::Sender<CreationProgress>,
}

impl CreateWorkstationOperation {
    pub(crate) fn new(manager: Arc<CreationManager>, request: CreateRequest) -> Arc<Self> {
        let (progress_tx, _) = watch::channel(CreationProgress {
            message: String::new(),
            percent: 0,
        });
        Arc::new(Self {
            manager,
            request,
            phase: Mutex::new(CreationPhase::NotStarted),
            result: OnceLock::new(),
            done: Notify::new(),
            progress_tx,
        })
    }

    pub fn request(&self) -> &CreateRequest {
        &self.request
    }

    pub fn phase(&self) -> CreationPhase {
        *lock(&self.phase)
    }

    /// The cached result, once the operation has completed.
    pub fn result(&self) -> Option<CreateResult> {
        self.result.get().cloned()
    }

    /// Subscribe to progress notifications. Updates stop once the
    /// operation completes.
    pub fn subscribe_progress(&self) -> watch::Receiver<CreationProgress> {
        self.progress_tx.subscribe()
    }

    /// Drive the creation. Safe to call from any number of tasks: the
    /// first caller issues the remote work and awaits the deferred result;
    /// callers arriving while it is in progress get an immediate
    /// already-in-progress failure; callers after completion get the cached
    /// result.
    pub async fn start(self: &Arc<Self>) -> CreateResult {
        {
            let mut phase = lock(&self.phase);
            match *phase {
                CreationPhase::InProgress => {
                    return CreateResult::Failure {
                        message: format!(
                            "creation of '{}' is already in progress",
                            self.request.name
                        ),
                        cause: WsError::AlreadyInProgress.to_string(),
                    };
                }
                CreationPhase::Completed => {
                    if let Some(result) = self.result.get() {
                        return result.clone();
                    }
                    // Completed implies the result was set first; this arm
                    // is unreachable but cheap to keep honest.
                    return CreateResult::Failure {
                        message: "creation already completed".to_string(),
                        cause: WsError::AlreadyInProgress.to_string(),
                    };
                }
                CreationPhase::NotStarted => *phase = CreationPhase::InProgress,
            }
        }

        self.manager.run_create(self).await;

        loop {
            // Register the waiter before checking so a completion landing
            // between the check and the await cannot be missed.
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            notified.await;
        }
    }

    /// Publish a progress update. Dropped once the operation completed.
    pub(crate) fn update_progress(&self, message: &str, percent: u8) {
        if matches!(*lock(&self.phase), CreationPhase::Completed) {
            return;
        }
        debug!(name = %self.request.name, message, percent, "creation progress");
        self.progress_tx.send_replace(CreationProgress {
            message: message.to_string(),
            percent,
        });
    }

    pub(crate) fn complete_with_success(&self, instance: Arc<WorkstationInstance>) {
        self.complete(CreateResult::Success(instance));
    }

    pub(crate) fn complete_with_failure(
        &self,
        message: impl Into<String>,
        cause: impl Into<String>,
    ) {
        self.complete(CreateResult::Failure {
            message: message.into(),
            cause: cause.into(),
        });
    }

    /// Set the result exactly once and wake every waiter. Later calls are
    /// no-ops so the first completion wins.
    fn complete(&self, result: CreateResult) {
        if self.result.set(result).is_err() {
            return;
        }
        *lock(&self.phase) = CreationPhase::Completed;
        self.done.notify_waiters();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
