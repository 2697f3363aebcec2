//! Browser login flow driver
//!
//! Generates the state token, starts the callback listener, sends the user
//! to the hosted login page and waits for the listener to hand back an
//! exchanged token, which is then checked with the provider once more.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::provider::{IdentityProvider, TokenCheck};
use super::server::{CallbackListener, ListenerConfig};
use super::state::CorrelationState;
use crate::core::error::{Error, Result};

/// Something that can show a URL to the user
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &Url) -> io::Result<()>;

    /// Whether `launch` tries to open anything at all
    fn opens_browser(&self) -> bool {
        true
    }
}

/// Opens the system default browser
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &Url) -> io::Result<()> {
        open::that(url.as_str())
    }
}

/// Never opens anything; the user follows the printed URL
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn launch(&self, _url: &Url) -> io::Result<()> {
        Err(io::Error::other("browser launch disabled"))
    }

    fn opens_browser(&self) -> bool {
        false
    }
}

/// Settings for one login attempt
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Hosted login page of the identity provider
    pub hosted_login: Url,
    pub listener: ListenerConfig,
    /// Give up waiting for the browser after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

/// Build the hosted login URL for an authorization code request
pub fn authorization_url(hosted_login: &Url, redirect_uri: &str, state: &CorrelationState) -> Url {
    let mut url = hosted_login.clone();
    url.query_pairs_mut()
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state.as_str());
    url
}

/// Console text pointing the user at the login page
fn announcement(url: &Url, opens_browser: bool) -> String {
    if opens_browser {
        format!("Opening browser to authenticate...\nURL: <{}>", url)
    } else {
        format!("Open this URL in a browser to authenticate:\nURL: <{}>", url)
    }
}

/// A single browser login attempt
pub struct LoginFlow {
    provider: Arc<dyn IdentityProvider>,
    options: FlowOptions,
    launcher: Box<dyn BrowserLauncher>,
}

impl LoginFlow {
    pub fn new(provider: Arc<dyn IdentityProvider>, options: FlowOptions) -> Self {
        Self {
            provider,
            options,
            launcher: Box::new(SystemBrowser),
        }
    }

    pub fn with_launcher(mut self, launcher: impl BrowserLauncher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    /// Run the flow to completion.
    ///
    /// Fails with `ListenerStartFailed` before any browser interaction if the
    /// callback port cannot be bound, `Timeout` if the user never finishes
    /// (only when a timeout is set), and `AuthenticationFailed` if the
    /// delivered token does not pass the provider's check.
    pub async fn run(self) -> Result<TokenCheck> {
        let state = CorrelationState::generate();

        let (listener, rx) = CallbackListener::start(
            self.options.listener.clone(),
            state.clone(),
            Arc::clone(&self.provider),
        )
        .await?;
        debug!(addr = %listener.local_addr(), "Callback listener ready");

        let url = authorization_url(&self.options.hosted_login, &listener.redirect_uri(), &state);

        let opens_browser = self.launcher.opens_browser();
        println!("{}", announcement(&url, opens_browser));
        if opens_browser {
            if let Err(e) = self.launcher.launch(&url) {
                eprintln!(
                    "Could not open a browser ({}). Open the URL above to continue.",
                    e
                );
            }
        }

        let received = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    listener.stop().await;
                    return Err(Error::Timeout { limit });
                }
            },
            None => rx.await,
        };
        listener.stop().await;

        let exchanged = received
            .map_err(|_| Error::auth_failed("callback listener exited without a result"))?;

        let check = self
            .provider
            .check_token(&exchanged.token)
            .await
            .map_err(|e| Error::auth_failed(format!("token check failed: {}", e)))?;

        if !check.identity.is_empty()
            && !exchanged.identity.is_empty()
            && check.identity != exchanged.identity
        {
            return Err(Error::auth_failed(
                "checked token belongs to a different identity",
            ));
        }

        Ok(check)
    }
}
