//! Browser-delegated login for Pangea AuthN
//!
//! Implements the authorization code capture for command-line tools: a
//! random `state` token, a one-shot loopback listener for the redirect, and
//! the code-for-token exchange followed by a token check.

pub mod flow;
pub mod provider;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use flow::{authorization_url, BrowserLauncher, FlowOptions, LoginFlow, NoBrowser, SystemBrowser};
pub use provider::{ExchangeResult, IdentityProvider, PangeaAuthn, ProviderError, TokenCheck};
pub use server::{CallbackListener, CallbackRejection, ListenerConfig, RunningListener};
pub use state::CorrelationState;
