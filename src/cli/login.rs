use crate::auth::{FlowOptions, ListenerConfig, LoginFlow, NoBrowser, PangeaAuthn};
use crate::core::config::{Config, LoginConfig};
use crate::core::error::{Error, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Arguments for the login command
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Pangea AuthN client API token
    #[arg(long, env = "PANGEA_AUTHN_CLIENT_TOKEN", hide_env_values = true)]
    pub authn_client_token: String,

    /// Pangea AuthN hosted login URL
    #[arg(long, env = "PANGEA_AUTHN_HOSTED_LOGIN")]
    pub authn_hosted_login: Option<String>,

    /// Pangea API domain [default: aws.us.pangea.cloud]
    #[arg(long, env = "PANGEA_DOMAIN")]
    pub pangea_domain: Option<String>,

    /// Local port for the login callback [default: 3000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds to wait for the browser login, 0 to wait forever [default: 300]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the login URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Log each callback request the listener receives
    #[arg(short, long)]
    pub verbose: bool,
}

/// Login settings after merging flags, environment and config file
struct ResolvedLogin {
    client_token: String,
    domain: String,
    open_browser: bool,
    options: FlowOptions,
}

fn resolve(args: LoginArgs, config: &LoginConfig) -> Result<ResolvedLogin> {
    let hosted_login = args
        .authn_hosted_login
        .or_else(|| config.hosted_login.clone())
        .ok_or_else(|| Error::ConfigError {
            message: "No hosted login URL. Pass --authn-hosted-login or set PANGEA_AUTHN_HOSTED_LOGIN."
                .to_string(),
        })?;
    let hosted_login = Url::parse(&hosted_login)?;

    if args.authn_client_token.trim().is_empty() {
        return Err(Error::ConfigError {
            message: "AuthN client token is empty".to_string(),
        });
    }

    let mut listener = ListenerConfig::on_port(args.port.unwrap_or(config.callback_port));
    listener.quiet = config.quiet && !args.verbose;

    let timeout = match args.timeout.unwrap_or(config.timeout_secs) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(ResolvedLogin {
        client_token: args.authn_client_token,
        domain: args.pangea_domain.unwrap_or_else(|| config.domain.clone()),
        open_browser: config.open_browser && !args.no_browser,
        options: FlowOptions {
            hosted_login,
            listener,
            timeout,
        },
    })
}

pub async fn run(args: LoginArgs) -> Result<()> {
    let config = Config::load()?;
    let resolved = resolve(args, &config.login)?;
    debug!(domain = %resolved.domain, port = resolved.options.listener.addr.port(), "Starting login");

    let authn = PangeaAuthn::new(resolved.client_token, &resolved.domain).map_err(|e| {
        Error::ConfigError {
            message: format!("Invalid Pangea domain '{}': {}", resolved.domain, e),
        }
    })?;

    let mut flow = LoginFlow::new(Arc::new(authn), resolved.options);
    if !resolved.open_browser {
        flow = flow.with_launcher(NoBrowser);
    }

    let check = tokio::select! {
        result = flow.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            return Err(Error::AuthenticationFailed {
                message: "login interrupted".to_string(),
            });
        }
    };

    println!();
    println!("Authenticated as {} ({}).", check.owner, check.identity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> LoginArgs {
        LoginArgs {
            authn_client_token: "pcl_test".to_string(),
            authn_hosted_login: None,
            pangea_domain: None,
            port: None,
            timeout: None,
            no_browser: false,
            verbose: false,
        }
    }

    #[test]
    fn test_hosted_login_is_required() {
        let result = resolve(args(), &LoginConfig::default());
        assert!(matches!(result, Err(Error::ConfigError { .. })));
    }

    #[test]
    fn test_defaults_from_config() {
        let config = LoginConfig {
            hosted_login: Some("https://pdn-test.login.aws.us.pangea.cloud/authorize".to_string()),
            ..LoginConfig::default()
        };
        let resolved = resolve(args(), &config).unwrap();

        assert_eq!(resolved.domain, "aws.us.pangea.cloud");
        assert_eq!(resolved.options.listener.addr.to_string(), "127.0.0.1:3000");
        assert_eq!(resolved.options.timeout, Some(Duration::from_secs(300)));
        assert!(resolved.options.listener.quiet);
        assert!(resolved.open_browser);
    }

    #[test]
    fn test_flags_override_config() {
        let config = LoginConfig {
            hosted_login: Some("https://from-config.example/authorize".to_string()),
            ..LoginConfig::default()
        };
        let resolved = resolve(
            LoginArgs {
                authn_hosted_login: Some("https://from-flag.example/authorize".to_string()),
                pangea_domain: Some("gcp.us.pangea.cloud".to_string()),
                port: Some(4000),
                timeout: Some(0),
                no_browser: true,
                verbose: true,
                ..args()
            },
            &config,
        )
        .unwrap();

        assert_eq!(resolved.options.hosted_login.host_str(), Some("from-flag.example"));
        assert_eq!(resolved.domain, "gcp.us.pangea.cloud");
        assert_eq!(resolved.options.listener.addr.port(), 4000);
        assert_eq!(resolved.options.timeout, None);
        assert!(!resolved.options.listener.quiet);
        assert!(!resolved.open_browser);
    }

    #[test]
    fn test_invalid_hosted_login_url() {
        let result = resolve(
            LoginArgs {
                authn_hosted_login: Some("not a url".to_string()),
                ..args()
            },
            &LoginConfig::default(),
        );
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[test]
    fn test_empty_client_token() {
        let result = resolve(
            LoginArgs {
                authn_client_token: "  ".to_string(),
                authn_hosted_login: Some("https://pdn-test.login.aws.us.pangea.cloud/authorize".to_string()),
                ..args()
            },
            &LoginConfig::default(),
        );
        assert!(matches!(result, Err(Error::ConfigError { .. })));
    }
}
