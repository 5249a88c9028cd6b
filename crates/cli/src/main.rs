//! `authloop` command line client.
//!
//! Run with: `authloop <command>`
//!
//! This is a CLI tool for people, so `println!` and `eprintln!` are
//! intentionally used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use authloop_common::auth::AuthSession;
use authloop_infra::{init_tracing, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let format = env::var("AUTHLOOP_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_tracing(format);

    let command = env::args().nth(1);
    let result = match command.as_deref() {
        Some("login") => run_login().await,
        Some("token") => run_token().await,
        Some("status") => run_status(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown command: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("authloop failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("authloop - OAuth authorization-code login helper");
    println!();
    println!("USAGE:");
    println!("    authloop <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    login     Sign in through the browser and report token expiry");
    println!("    token     Print a fresh bearer token to stdout");
    println!("    status    Show the loaded provider configuration");
    println!("    help      Show this help message");
    println!();
    println!("Configuration comes from AUTHLOOP_* environment variables (a .env file");
    println!("is loaded first) or from authloop.toml / config.json in the working directory.");
}

fn session() -> anyhow::Result<AuthSession> {
    let config = authloop_infra::load().context("failed to load OAuth configuration")?;
    AuthSession::new(config).context("invalid OAuth configuration")
}

/// Sign in and print how long the token is valid
async fn run_login() -> anyhow::Result<()> {
    let session = session()?;
    let outcome = session.ensure_valid_token().await;
    session.shutdown().await.context("failed to stop callback listener")?;

    let token = outcome.context("authorization failed")?;
    println!("Logged in. Access token expires in {} seconds.", token.seconds_until_expiry());
    if !token.has_refresh_token() {
        println!("The provider issued no refresh token; you will be asked to sign in again.");
    }
    Ok(())
}

/// Print a bearer token for use in shell pipelines
async fn run_token() -> anyhow::Result<()> {
    let session = session()?;
    let outcome = session.bearer_token().await;
    session.shutdown().await.context("failed to stop callback listener")?;

    println!("{}", outcome.context("could not obtain a bearer token")?);
    Ok(())
}

fn run_status() -> anyhow::Result<()> {
    let config = authloop_infra::load().context("failed to load OAuth configuration")?;

    println!("Provider:        {}", config.provider_origin());
    println!("Authorize URL:   {}", config.authorize_endpoint());
    println!("Token URL:       {}", config.token_url());
    println!("Client ID:       {}", config.client_id);
    println!("Credentials in:  {}", config.authorization_method);
    println!("Callback URL:    {}", config.callback_url);
    println!("Callback port:   {}", config.callback_port);
    println!("Scopes:          {}", config.scope_string());
    if let Some(audience) = &config.audience {
        println!("Audience:        {audience}");
    }
    match config.callback_wait() {
        Some(wait) => println!("Callback wait:   {}s", wait.as_secs()),
        None => println!("Callback wait:   unbounded"),
    }
    tracing::debug!(?config, "Status printed");
    Ok(())
}
