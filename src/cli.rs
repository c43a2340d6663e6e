//! Command-line interface for appraise.
//!
//! Provides the server entry point and a configuration check command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::ResolvedServiceConfig;
use crate::dispatch::{run_queue, JobDispatcher};
use crate::pipeline::{PipelineContext, ProgressTracker, Worker};
use crate::providers::{HttpModelClient, ProviderRouter};
use crate::retrieval::InMemoryIndex;
use crate::server::{app_state, router};
use crate::store::MemoryStore;

/// appraise - asynchronous document evaluation pipeline
#[derive(Parser, Debug)]
#[command(name = "appraise")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "APPRAISE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server and worker loop
    Serve {
        /// Address to bind to (overrides the config file)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Load and validate the configuration, printing the resolved rubric
    CheckConfig,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedServiceConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Serve { address } => serve(config, address).await,
            Commands::CheckConfig => check_config(config),
        }
    }
}

async fn serve(config: ResolvedServiceConfig, address: Option<String>) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(InMemoryIndex::new());
    let router_client = Arc::new(HttpModelClient::new(config.call_timeout));
    let provider_router = Arc::new(ProviderRouter::new(router_client));

    let ctx = Arc::new(PipelineContext {
        evaluations: store.clone(),
        results: store.clone(),
        catalog: store.clone(),
        index: index.clone(),
        router: provider_router,
        provider: config.provider.clone(),
        model: config.model.clone(),
        retry: config.retry.clone(),
    });

    let tracker = ProgressTracker::new(store.clone());
    let worker = Arc::new(
        Worker::new(
            ctx.clone(),
            tracker.clone(),
            config.system_rubric.clone(),
            config.prompts.clone(),
        )
        .with_run_timeout(config.run_timeout),
    );

    let (tx, rx) = tokio::sync::mpsc::channel(config.queue_capacity);
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        index,
        tx,
    ));

    tokio::spawn(run_queue(rx, worker, tracker));

    let state = app_state(
        store.clone(),
        store.clone(),
        store,
        dispatcher,
        &config,
    );
    let app = router(state);

    let bind = address.unwrap_or_else(|| config.address.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!(%bind, "appraise listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn check_config(config: ResolvedServiceConfig) -> Result<()> {
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (defaults)"),
    }
    println!("Provider: {} ({:?})", config.provider.name, config.provider.family);
    println!("Model: {}", config.model.identifier);
    println!(
        "Retry: {} attempts, {}ms initial delay",
        config.retry.max_attempts, config.retry.initial_delay_ms
    );
    println!("Call timeout: {:?}", config.call_timeout);
    println!("Run ceiling: {:?}", config.run_timeout);
    println!("Rubric tiers:");
    for tier in &config.system_rubric.tiers {
        println!("  {:>3}-{:<3} {}", tier.min, tier.max, tier.label);
    }
    Ok(())
}
