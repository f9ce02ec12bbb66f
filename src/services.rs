use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::users::UserId;
use crate::repositories::conversations::{ConversationError, ConversationStoreRef};
use crate::repositories::ledger::{LedgerError, LedgerStoreRef};
use crate::settings::Settings;
use crate::transport::Transport;

pub mod http;
mod locks;
pub mod notifications;
pub mod scheduler;
pub mod workflow;

pub use locks::{UserLocks, UserSequencer};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Transaction {0} is already finalized")]
    AlreadyFinalized(Uuid),
    #[error("Referral commission for user {0} was already paid")]
    DuplicateReferral(UserId),
    #[error("User {0} is not allowed to do this")]
    Unauthorized(UserId),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Delivery error: {0} - {1}")]
    Delivery(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DuplicateUser(id) => {
                ServiceError::Validation(format!("user {} already exists", id))
            }
            LedgerError::UserNotFound(id) => ServiceError::NotFound(format!("user {}", id)),
            LedgerError::TransactionNotFound(id) => {
                ServiceError::NotFound(format!("transaction {}", id))
            }
            LedgerError::AlreadyFinalized(tx) => ServiceError::AlreadyFinalized(tx.id),
            LedgerError::DuplicateReferral(id) => ServiceError::DuplicateReferral(id),
            LedgerError::Unavailable(reason) => ServiceError::StoreUnavailable(reason),
        }
    }
}

impl From<ConversationError> for ServiceError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::Unavailable(reason) => ServiceError::StoreUnavailable(reason),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Handles to everything `start_services` spawned that needs an orderly stop.
pub struct RunningServices {
    pub workflow_channel: mpsc::Sender<workflow::WorkflowRequest>,
    scheduler: scheduler::SchedulerHandle,
    http: JoinHandle<()>,
}

impl RunningServices {
    pub async fn shutdown(self) {
        log::info!("Stopping scheduler.");
        self.scheduler.shutdown().await;

        log::info!("Stopping HTTP server.");
        self.http.abort();
    }
}

pub async fn start_services(
    settings: Settings,
    ledger: LedgerStoreRef,
    conversations: ConversationStoreRef,
    transport: Arc<dyn Transport>,
) -> Result<RunningServices, anyhow::Error> {
    let (notification_tx, mut notification_rx) = mpsc::channel(512);
    let (workflow_tx, mut workflow_rx) = mpsc::channel(512);

    let mut notification_service = notifications::NotificationService::new();
    let mut workflow_service = workflow::WorkflowService::new();

    log::info!("Starting notification service.");
    let notification_handler = notifications::NotificationRequestHandler::new(
        transport,
        notifications::RetryPolicy::new(
            settings.notifications.max_attempts,
            Duration::from_millis(settings.notifications.backoff_ms),
        ),
        settings.channels.admin,
    );
    tokio::spawn(async move {
        notification_service
            .run(notification_handler, &mut notification_rx)
            .await;
    });

    log::info!("Starting workflow service.");
    let engine = workflow::WorkflowEngine::new(
        ledger,
        conversations,
        notifications::Notifier::new(notification_tx),
        workflow::WorkflowConfig::from_settings(&settings),
    );
    tokio::spawn(async move {
        workflow_service
            .run(
                workflow::WorkflowRequestHandler::new(engine),
                &mut workflow_rx,
            )
            .await;
    });

    log::info!("Starting scheduler.");
    let scheduler = scheduler::spawn(
        workflow_tx.clone(),
        settings.scheduler.daily_report_hour,
        scheduler::TICK,
    );

    log::info!("Starting HTTP server.");
    let http_workflow_tx = workflow_tx.clone();
    let listen = settings.telegram.listen.clone();
    let secret = settings.telegram.webhook_secret.clone();
    let http = tokio::spawn(async move {
        if let Err(e) = http::start_http_server(&listen, http_workflow_tx, secret).await {
            log::error!("HTTP server stopped: {}", e);
        }
    });

    log::info!("Started services.");
    Ok(RunningServices {
        workflow_channel: workflow_tx,
        scheduler,
        http,
    })
}
