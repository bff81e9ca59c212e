//! Warden capability server.
//!
//! Usage:
//!   warden-server serve --config warden.toml
//!   warden-server mint-token --subject alice --days 30
//!
//! Every setting in the config file can be overridden by a flag or its
//! `MCP_SERVER_*` environment variable.

mod config;
mod http;
mod token;
mod wire;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use warden_auth::JwtVerifier;
use warden_contracts::error::{GateError, GateResult};
use warden_core::DispatchPipeline;
use warden_policy::{AllowlistGate, PermissionEngine};
use warden_registry::CapabilityRegistry;
use warden_verify::SchemaValidator;

use crate::config::{Overrides, ServerConfig};
use crate::wire::McpService;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Warden: an authenticated, origin-restricted capability server.
#[derive(Parser)]
#[command(name = "warden-server", version, about = "Warden capability server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the reference catalog over HTTP.
    Serve {
        /// TOML configuration file.
        #[arg(long, short)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print a signed credential the server will accept (shared-secret mode).
    MintToken {
        #[arg(long, short)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
        /// Value of the `sub` claim.
        #[arg(long, default_value = token::DEFAULT_SUBJECT)]
        subject: String,
        /// Lifetime in days.
        #[arg(long, default_value_t = token::DEFAULT_LIFETIME_DAYS)]
        days: i64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for per-stage decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve { config, overrides } => run_serve(config, &overrides),
        Command::MintToken {
            config,
            overrides,
            subject,
            days,
        } => run_mint_token(config, &overrides, &subject, days),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_serve(path: Option<PathBuf>, overrides: &Overrides) -> GateResult<()> {
    let config = ServerConfig::load(path.as_deref(), overrides)?;
    config.validate()?;

    // Built before the runtime exists: the key-set client is blocking.
    let pipeline = Arc::new(build_pipeline(&config)?);
    let service = Arc::new(McpService::new(Arc::clone(&pipeline), config.server.name.clone()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(http::serve(&config.server.bind, service));

    // The pipeline must outlive the runtime so its blocking client is
    // dropped on this thread.
    drop(runtime);
    drop(pipeline);
    outcome
}

fn run_mint_token(
    path: Option<PathBuf>,
    overrides: &Overrides,
    subject: &str,
    days: i64,
) -> GateResult<()> {
    let config = ServerConfig::load(path.as_deref(), overrides)?;
    let lifetime = chrono::Duration::try_days(days)
        .ok_or_else(|| GateError::config(format!("lifetime of {days} days is out of range")))?;

    let token = token::mint_token(&config.trust_config()?, subject, lifetime)?;
    println!("{token}");
    Ok(())
}

fn build_pipeline(config: &ServerConfig) -> GateResult<DispatchPipeline> {
    let mut registry = CapabilityRegistry::new();
    warden_ref_catalog::register_all(&mut registry)?;

    let validator = SchemaValidator::new();
    validator.check_entries(registry.entries())?;

    let gate = AllowlistGate::from_config(&config.allowlist_config()?)?;
    let trust = config.trust_config()?;
    let verifier = JwtVerifier::from_config(&trust)?;

    info!(
        name = %config.server.name,
        capabilities = registry.len(),
        algorithm = %verifier.algorithm(),
        any_origin = gate.allows_all(),
        "pipeline ready"
    );

    Ok(DispatchPipeline::new(
        Arc::new(gate),
        Arc::new(verifier),
        Arc::new(registry),
        Arc::new(validator),
        Arc::new(PermissionEngine::new(config.permissions.clone())),
    ))
}
