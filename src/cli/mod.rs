//! CLI command definitions and handlers

pub mod login;

use clap::{Parser, Subcommand};

const LONG_ABOUT: &str = r#"
Log in to Pangea AuthN from the terminal.

The login command starts a one-shot listener on localhost, opens the hosted
login page in your browser and waits for the redirect. Once the provider
confirms the session, the authenticated owner and identity are printed.

QUICK START:
    export PANGEA_AUTHN_CLIENT_TOKEN=pcl_...
    export PANGEA_AUTHN_HOSTED_LOGIN=https://pdn-....login.aws.us.pangea.cloud/authorize
    pangea-login login

HEADLESS MACHINES:
    pangea-login login --no-browser   Print the URL and wait for you to open it

Optional defaults live in config.toml under PANGEA_LOGIN_HOME (or the
platform config directory), section [login].
"#;

/// Browser-based login for Pangea AuthN
#[derive(Parser, Debug)]
#[command(name = "pangea-login")]
#[command(author, version)]
#[command(about = "Browser-based login for Pangea AuthN")]
#[command(long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate through the hosted login page
    #[command(after_help = "EXAMPLES:
    pangea-login login                       Use settings from the environment
    pangea-login login --port 4000           Listen for the redirect on port 4000
    pangea-login login --no-browser          Print the URL instead of opening it
    pangea-login login --timeout 0           Wait for the browser indefinitely")]
    Login(login::LoginArgs),
}
