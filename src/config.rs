//! Configuration management for the ImageDrive client.
//!
//! Settings come from command-line arguments via clap, with environment
//! variables (`IMAGEDRIVE_` prefix) as fallback. Everything is resolved once
//! at startup.
//!
//! # Example
//!
//! ```ignore
//! use imagedrive_client::config::Cli;
//!
//! let cli = Cli::parse();
//! let client_config = cli.client.client_config()?;
//! println!("Backend: {}", client_config.base_url);
//! ```
//!
//! # Environment Variables
//!
//! - `IMAGEDRIVE_API_BASE` - API base address, absolute or a path (default: /api/v1)
//! - `IMAGEDRIVE_ORIGIN` - Origin a relative base is joined onto (default: http://127.0.0.1:5000)
//! - `IMAGEDRIVE_CREDENTIALS` - Token file (default: ~/.imagedrive/credentials.json)
//! - `IMAGEDRIVE_ON_UNAUTHORIZED` - What a 401 clears: clear-session | clear-token
//! - `IMAGEDRIVE_PASSWORD` - Password for login/register
//! - `IMAGEDRIVE_PROXY_LISTEN` - Dev proxy bind address (default: 127.0.0.1:5173)
//! - `IMAGEDRIVE_PROXY_UPSTREAM` - Dev proxy backend (default: http://127.0.0.1:5000)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::api::{DEFAULT_K, DEFAULT_OCR_TOP_K};
use crate::client::{ClientConfig, DEFAULT_API_BASE, DEFAULT_ORIGIN};
use crate::credentials::default_credentials_path;
use crate::proxy::{ProxyConfig, DEFAULT_PROXY_LISTEN};
use crate::session::InvalidationPolicy;

/// Upper bound accepted for result counts.
pub const MAX_RESULTS: u32 = 200;

// =============================================================================
// CLI Arguments
// =============================================================================

/// ImageDrive - command-line client for the ImageDrive search service.
///
/// Log in once; the token is kept in a local credential file and attached to
/// every later request.
#[derive(Parser, Debug, Clone)]
#[command(name = "imagedrive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Print returned data as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that talks to the backend.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// API base address: absolute URL or a path joined onto --origin.
    #[arg(long, env = "IMAGEDRIVE_API_BASE")]
    pub api_base: Option<String>,

    /// Origin used when the API base is a path.
    #[arg(long, default_value = DEFAULT_ORIGIN, env = "IMAGEDRIVE_ORIGIN")]
    pub origin: String,

    /// File holding the bearer token.
    #[arg(long, env = "IMAGEDRIVE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// What to clear when the backend answers 401.
    #[arg(
        long,
        value_enum,
        default_value_t = InvalidationPolicy::ClearSession,
        env = "IMAGEDRIVE_ON_UNAUTHORIZED"
    )]
    pub on_unauthorized: InvalidationPolicy,
}

impl ClientArgs {
    /// Resolve the transport configuration.
    pub fn client_config(&self) -> Result<ClientConfig, String> {
        ClientConfig::resolve(self.api_base.as_deref(), &self.origin)
    }

    /// Token file location.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(default_credentials_path)
    }

    pub fn api_base_or_default(&self) -> &str {
        self.api_base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE)
    }
}

/// Username and password.
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    pub username: String,

    /// Password (prefer the environment variable over the command line).
    #[arg(long, env = "IMAGEDRIVE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Dev proxy options.
#[derive(Args, Debug, Clone)]
pub struct ProxyArgs {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_PROXY_LISTEN, env = "IMAGEDRIVE_PROXY_LISTEN")]
    pub listen: String,

    /// Backend the API prefix is forwarded to.
    #[arg(long, default_value = DEFAULT_ORIGIN, env = "IMAGEDRIVE_PROXY_UPSTREAM")]
    pub upstream: String,

    /// Path prefix to forward.
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub prefix: String,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ProxyArgs {
    pub fn proxy_config(&self) -> Result<ProxyConfig, String> {
        let upstream = Url::parse(&self.upstream)
            .map_err(|e| format!("Invalid upstream '{}': {}", self.upstream, e))?;
        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(format!("Unsupported upstream scheme: {}", upstream.scheme()));
        }

        Ok(ProxyConfig::new(upstream)
            .with_listen(self.listen.clone())
            .with_prefix(self.prefix.clone())
            .with_tracing(!self.no_tracing))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the issued token.
    Login(CredentialArgs),

    /// Create an account (does not log in).
    Register(CredentialArgs),

    /// Show the logged-in user.
    Me,

    /// Forget the stored token.
    Logout,

    /// Show backend health.
    Health,

    /// Upload an image.
    Upload {
        path: PathBuf,

        /// Skip comparing the server checksum with the local one.
        #[arg(long, default_value_t = false)]
        no_verify: bool,
    },

    /// Search images by text.
    SearchText {
        query: String,

        /// Number of results.
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: u32,
    },

    /// Search OCR-extracted text.
    SearchOcr {
        query: String,

        /// Maximum number of matches.
        #[arg(long, default_value_t = DEFAULT_OCR_TOP_K)]
        top_k: u32,
    },

    /// Find images similar to an uploaded one.
    Similar {
        image_id: i64,

        /// Number of results.
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: u32,
    },

    /// Resolve a client path to its page.
    Route { path: String },

    /// Run the development reverse proxy.
    Proxy(ProxyArgs),
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.command, Command::Route { .. } | Command::Proxy(_)) {
            self.client.client_config()?;
        }

        match &self.command {
            Command::Login(creds) | Command::Register(creds) => {
                if creds.username.trim().is_empty() {
                    return Err("username must not be empty".to_string());
                }
                if creds.password.is_empty() {
                    return Err(
                        "password must not be empty. Set --password or IMAGEDRIVE_PASSWORD"
                            .to_string(),
                    );
                }
            }
            Command::SearchText { k, .. } | Command::Similar { k, .. } => {
                validate_count("k", *k)?;
            }
            Command::SearchOcr { top_k, .. } => {
                validate_count("top_k", *top_k)?;
            }
            Command::Proxy(args) => {
                args.proxy_config()?;
            }
            _ => {}
        }

        Ok(())
    }
}

fn validate_count(name: &str, value: u32) -> Result<(), String> {
    if value == 0 || value > MAX_RESULTS {
        return Err(format!("{} must be between 1 and {}", name, MAX_RESULTS));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
