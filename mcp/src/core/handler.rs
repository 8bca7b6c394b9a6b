//! Client-side handler for backend notifications.
//!
//! Each backend session gets its own [`ProxyClientHandler`]. It identifies
//! the proxy during the handshake, forwards backend log messages into
//! `tracing`, and asks the aggregator to re-list a backend's tools when the
//! backend announces that its tool list changed.

use std::sync::Arc;

use rmcp::{
    model::{
        CancelledNotificationParam, ClientInfo, LoggingLevel, LoggingMessageNotificationParam,
        ProgressNotificationParam,
    },
    service::NotificationContext,
    ClientHandler, RoleClient,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Name announced to backends in the initialize handshake.
pub const CLIENT_NAME: &str = "toolscout";

/// Request to re-list one backend's tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub backend: String,
}

#[derive(Clone)]
pub struct ProxyClientHandler {
    backend: Arc<str>,
    client_info: ClientInfo,
    refresh_tx: Option<mpsc::Sender<RefreshRequest>>,
}

impl ProxyClientHandler {
    pub fn new(backend: impl AsRef<str>) -> Self {
        let mut client_info = ClientInfo::default();
        client_info.client_info.name = CLIENT_NAME.to_string();
        client_info.client_info.version = env!("CARGO_PKG_VERSION").to_string();

        Self {
            backend: Arc::from(backend.as_ref()),
            client_info,
            refresh_tx: None,
        }
    }

    #[must_use]
    pub fn with_refresh_channel(mut self, tx: mpsc::Sender<RefreshRequest>) -> Self {
        self.refresh_tx = Some(tx);
        self
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn send_refresh(&self) {
        let Some(tx) = &self.refresh_tx else {
            debug!(backend = %self.backend, "No refresh channel, ignoring tool list change");
            return;
        };
        if let Err(e) = tx.try_send(RefreshRequest {
            backend: self.backend.to_string(),
        }) {
            warn!(backend = %self.backend, error = %e, "Failed to queue refresh request");
        }
    }
}

impl ClientHandler for ProxyClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }

    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        info!(backend = %self.backend, "Backend tool list changed");
        self.send_refresh();
    }

    async fn on_cancelled(
        &self,
        params: CancelledNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        info!(
            backend = %self.backend,
            request_id = %params.request_id,
            reason = ?params.reason,
            "Backend cancelled request"
        );
    }

    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        debug!(
            backend = %self.backend,
            token = ?params.progress_token,
            progress = %params.progress,
            total = ?params.total,
            "Backend progress"
        );
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let logger = params.logger.as_deref().unwrap_or("backend");

        match params.level {
            LoggingLevel::Emergency
            | LoggingLevel::Alert
            | LoggingLevel::Critical
            | LoggingLevel::Error => {
                error!(backend = %self.backend, logger = %logger, "{}", params.data);
            }
            LoggingLevel::Warning => {
                warn!(backend = %self.backend, logger = %logger, "{}", params.data);
            }
            LoggingLevel::Notice | LoggingLevel::Info => {
                info!(backend = %self.backend, logger = %logger, "{}", params.data);
            }
            LoggingLevel::Debug => {
                debug!(backend = %self.backend, logger = %logger, "{}", params.data);
            }
        }
    }
}
