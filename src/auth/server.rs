//! One-shot loopback listener receiving the browser redirect
//!
//! The listener serves a single route, `GET /callback`. A request is checked
//! against the expected `state` before anything else happens; only then is its
//! `code` exchanged with the identity provider. The first successful exchange
//! is handed to the waiting flow through a oneshot channel, after which the
//! listener shuts itself down. Rejected requests get a 401 and the listener
//! keeps waiting.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::provider::{ExchangeResult, IdentityProvider};
use super::state::CorrelationState;
use crate::core::config::DEFAULT_CALLBACK_PORT;
use crate::core::error::{Error, Result};

/// Route the identity provider redirects the browser to
pub const CALLBACK_PATH: &str = "/callback";

const SUCCESS_BODY: &str = "Done, you can close this tab.";
const REJECTED_BODY: &str = "<h1>401 Unauthorized</h1><p>This login link is invalid or has expired.</p>";

/// How long `stop` waits for in-flight responses before aborting the server
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Listener settings
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind; must be a loopback address
    pub addr: SocketAddr,
    /// Host name used in the redirect URI sent to the provider
    pub redirect_host: String,
    /// Suppress per-request diagnostics
    pub quiet: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::on_port(DEFAULT_CALLBACK_PORT)
    }
}

impl ListenerConfig {
    /// Loopback listener on the given port (0 picks a free one)
    pub fn on_port(port: u16) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            redirect_host: "localhost".to_string(),
            quiet: true,
        }
    }
}

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Why a callback request was turned away.
///
/// These never reach the caller of the flow; each one is answered with a 401.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRejection {
    #[error("invalid callback")]
    InvalidCallback,

    #[error("code exchange failed")]
    ExchangeFailed,

    #[error("login already completed")]
    AlreadyCompleted,
}

impl IntoResponse for CallbackRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Html(REJECTED_BODY)).into_response()
    }
}

/// Shared state behind the `/callback` route
pub struct CallbackListener {
    expected_state: CorrelationState,
    provider: Arc<dyn IdentityProvider>,
    delivered: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<ExchangeResult>>>,
    shutdown: Arc<Notify>,
    quiet: bool,
}

impl CallbackListener {
    /// Bind the listener and start serving in the background.
    ///
    /// The socket is bound before this returns, so the browser can be sent
    /// to the redirect URI right away. The receiver resolves with the first
    /// successfully exchanged callback.
    pub async fn start(
        config: ListenerConfig,
        expected_state: CorrelationState,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<(RunningListener, oneshot::Receiver<ExchangeResult>)> {
        let start_failed = |reason: String| Error::ListenerStartFailed {
            addr: config.addr,
            reason,
        };

        if !config.addr.ip().is_loopback() {
            return Err(start_failed(
                "refusing to bind a non-loopback address".to_string(),
            ));
        }

        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|e| start_failed(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| start_failed(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let shutdown = Arc::new(Notify::new());

        let state = Arc::new(CallbackListener {
            expected_state,
            provider,
            delivered: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
            shutdown: Arc::clone(&shutdown),
            quiet: config.quiet,
        });

        let app = Router::new()
            .route(CALLBACK_PATH, get(callback))
            .with_state(state);

        let signal = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await });
            if let Err(e) = server.await {
                warn!(error = %e, "Callback listener stopped with an error");
            }
        });

        Ok((
            RunningListener {
                addr,
                redirect_host: config.redirect_host,
                shutdown,
                handle: Some(handle),
            },
            rx,
        ))
    }

    async fn handle(&self, params: CallbackParams) -> std::result::Result<(), CallbackRejection> {
        // State first: a forged callback must never reach the provider
        if !self.expected_state.matches(params.state.as_deref()) {
            return Err(CallbackRejection::InvalidCallback);
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(CallbackRejection::InvalidCallback)?;

        if self.delivered.load(Ordering::Acquire) {
            return Err(CallbackRejection::AlreadyCompleted);
        }

        let result = self.provider.exchange_code(&code).await.map_err(|e| {
            if !self.quiet {
                info!(error = %e, "Authorization code exchange failed");
            }
            CallbackRejection::ExchangeFailed
        })?;

        self.deliver(result)
    }

    /// Hand the result to the flow; only the first caller gets through
    fn deliver(&self, result: ExchangeResult) -> std::result::Result<(), CallbackRejection> {
        let Some(tx) = self.sender.lock().take() else {
            return Err(CallbackRejection::AlreadyCompleted);
        };
        self.delivered.store(true, Ordering::Release);
        self.shutdown.notify_one();

        tx.send(result).map_err(|_| CallbackRejection::AlreadyCompleted)
    }
}

async fn callback(
    State(listener): State<Arc<CallbackListener>>,
    query: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> std::result::Result<Html<&'static str>, CallbackRejection> {
    let outcome = match query {
        Ok(Query(params)) => listener.handle(params).await,
        Err(_) => Err(CallbackRejection::InvalidCallback),
    };

    if !listener.quiet {
        match &outcome {
            Ok(()) => info!("Callback accepted"),
            Err(rejection) => info!(reason = %rejection, "Callback rejected"),
        }
    }

    outcome.map(|()| Html(SUCCESS_BODY))
}

/// Handle to a listener serving in the background
pub struct RunningListener {
    addr: SocketAddr,
    redirect_host: String,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl RunningListener {
    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI to register with the authorization request
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.redirect_host,
            self.addr.port(),
            CALLBACK_PATH
        )
    }

    /// Whether the server task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop accepting connections; in-flight requests still finish
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Shut down and wait for the server task to exit
    pub async fn stop(mut self) {
        self.shutdown();

        let Some(handle) = self.handle.take() else {
            return;
        };
        let abort = handle.abort_handle();
        match tokio::time::timeout(STOP_GRACE, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Callback listener task failed"),
            Err(_) => {
                warn!("Callback listener did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

impl Drop for RunningListener {
    /// A flow dropped mid-wait must not keep the callback port bound
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.notify_one();
            handle.abort();
        }
    }
}
