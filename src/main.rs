//! ImageDrive - command-line client for the ImageDrive search service.
//!
//! Each invocation loads the persisted token, runs one command through the
//! authenticated pipeline and exits.

use clap::Parser;
use serde::Serialize;
use std::fmt::Display;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagedrive_client::{
    config::{Cli, Command, CredentialArgs, ProxyArgs},
    error::SessionError,
    proxy::serve_proxy,
    ApiError, FileCredentialStore, HttpTransport, ImageDriveApi, Resolution, RouteTable, Session,
    UploadError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Command::Route { path } => return run_route(path),
        Command::Proxy(args) => return run_proxy(args).await,
        _ => {}
    }

    let session = match connect(&cli) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let api = ImageDriveApi::new(session.client().clone());

    match &cli.command {
        Command::Login(creds) => run_login(&session, creds, cli.json).await,
        Command::Register(creds) => run_register(&session, creds, cli.json).await,
        Command::Me => run_me(&session, cli.json).await,
        Command::Logout => run_logout(&session),
        Command::Health => run_health(&api, cli.json).await,
        Command::Upload { path, no_verify } => {
            match api.upload_file(path, !no_verify).await {
                Ok(image) => {
                    if cli.json {
                        print_json(&image)
                    } else {
                        println!("Uploaded {} as image {}", image.original_filename, image.image_id);
                        println!("  Checksum: {}", image.checksum);
                        println!("  Status: {}", image.status);
                        ExitCode::SUCCESS
                    }
                }
                Err(UploadError::Api(e)) => report_api_error(&e),
                Err(e) => fail(e),
            }
        }
        Command::SearchText { query, k } => match api.search_text(query, *k).await {
            Ok(results) => {
                if cli.json {
                    return print_json(&results);
                }
                if let Some(ref note) = results.note {
                    println!("Note: {}", note);
                }
                for hit in &results.results {
                    println!("{:>3}. image {} ({:.4})", hit.rank, hit.image_id, hit.similarity);
                }
                ExitCode::SUCCESS
            }
            Err(e) => report_api_error(&e),
        },
        Command::SearchOcr { query, top_k } => match api.search_ocr(query, *top_k).await {
            Ok(results) => {
                if cli.json {
                    return print_json(&results);
                }
                println!("{} match(es) for '{}'", results.count, results.query);
                for hit in &results.items {
                    println!("  image {}: {}", hit.image_id, hit.snippet);
                }
                ExitCode::SUCCESS
            }
            Err(e) => report_api_error(&e),
        },
        Command::Similar { image_id, k } => match api.similar(*image_id, *k).await {
            Ok(results) => {
                if cli.json {
                    return print_json(&results);
                }
                for hit in &results.results {
                    println!("{:>3}. image {} ({:.4})", hit.rank, hit.image_id, hit.similarity);
                }
                ExitCode::SUCCESS
            }
            Err(e) => report_api_error(&e),
        },
        Command::Route { .. } | Command::Proxy(_) => ExitCode::SUCCESS,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imagedrive_client=debug,imagedrive=debug,tower_http=debug"
    } else {
        "imagedrive_client=info,imagedrive=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the session from the persisted token.
fn connect(cli: &Cli) -> Result<Session, String> {
    let config = cli.client.client_config()?;
    let transport = HttpTransport::new(config).map_err(|e| e.to_string())?;
    let store = FileCredentialStore::new(cli.client.credentials_path());

    debug!(
        backend = %transport.config().base_url,
        store = %store.path().display(),
        "Connecting"
    );

    Ok(Session::connect(
        Arc::new(transport),
        Arc::new(store),
        cli.client.on_unauthorized,
    ))
}

// =============================================================================
// Auth Commands
// =============================================================================

async fn run_login(session: &Session, creds: &CredentialArgs, json: bool) -> ExitCode {
    match session.login(&creds.username, &creds.password).await {
        Ok(()) => {
            if json {
                return print_json(&session.user());
            }
            match session.user() {
                Some(user) => println!("Logged in as {} (id {})", user.username, user.user_id),
                None => println!("Logged in"),
            }
            ExitCode::SUCCESS
        }
        // A 401 here means bad credentials, not an expired session
        Err(e) => fail(e),
    }
}

async fn run_register(session: &Session, creds: &CredentialArgs, json: bool) -> ExitCode {
    match session.register(&creds.username, &creds.password).await {
        Ok(user) => {
            if json {
                return print_json(&user);
            }
            println!("Registered {}. Log in to continue.", creds.username);
            ExitCode::SUCCESS
        }
        Err(e) => report_session_error(&e),
    }
}

async fn run_me(session: &Session, json: bool) -> ExitCode {
    if !session.is_authenticated() {
        println!("Not logged in");
        return ExitCode::FAILURE;
    }

    match session.me().await {
        Ok(user) => {
            if json {
                return print_json(&user);
            }
            match user {
                Some(user) => println!("{} (id {})", user.username, user.user_id),
                None => println!("Logged in, user unknown"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_session_error(&e),
    }
}

fn run_logout(session: &Session) -> ExitCode {
    // Memory is cleared either way; a token left on disk would be reloaded
    if let Err(e) = session.state().clear() {
        eprintln!("Logged out, but the stored token could not be erased");
        return fail(e);
    }
    println!("Logged out");
    ExitCode::SUCCESS
}

// =============================================================================
// Backend Commands
// =============================================================================

async fn run_health(api: &ImageDriveApi, json: bool) -> ExitCode {
    let report = match api.health().await {
        Ok(report) => report,
        Err(e) => return report_api_error(&e),
    };

    if json {
        if print_json(&report) != ExitCode::SUCCESS {
            return ExitCode::FAILURE;
        }
    } else {
        println!("Status: {}", report.status);
        if let Some(ref version) = report.app_version {
            println!("Version: {}", version);
        }
        if let Some(dim) = report.embedding_dim {
            println!("Embedding dim: {}", dim);
        }
        for (key, value) in &report.details {
            println!("{}: {}", key, value);
        }
    }

    // A degraded backend fails the command in either output mode
    if report.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Local Commands
// =============================================================================

fn run_route(path: &str) -> ExitCode {
    match RouteTable::standard().resolve(path) {
        Resolution::Page { page, path } => {
            let access = if page.requires_session() {
                "login required"
            } else {
                "public"
            };
            println!("{} -> {} ({})", path, page, access);
            ExitCode::SUCCESS
        }
        Resolution::NotFound => {
            eprintln!("No route for {}", path);
            ExitCode::FAILURE
        }
    }
}

async fn run_proxy(args: &ProxyArgs) -> ExitCode {
    let config = match args.proxy_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("────────────────────────────────────────────────────────────────");
    println!("  Dev proxy listening on: http://{}", config.listen);
    println!("  Forwarding {} -> {}", config.prefix, config.upstream);
    println!("────────────────────────────────────────────────────────────────");

    if let Err(e) = serve_proxy(config).await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Output
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn report_session_error(e: &SessionError) -> ExitCode {
    match e {
        SessionError::Api(api) => report_api_error(api),
        other => fail(other),
    }
}

fn report_api_error(e: &ApiError) -> ExitCode {
    if e.is_unauthorized() {
        eprintln!("Session expired or invalid, please log in again");
    }
    fail(e)
}

fn fail(e: impl Display) -> ExitCode {
    eprintln!("Error: {}", e);
    ExitCode::FAILURE
}
