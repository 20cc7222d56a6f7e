// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use promptwood::config::{load_config, load_submission, validate_prompt, EngineConfig};
use promptwood::engine::events::TracingSink;
use promptwood::engine::ExecutionService;
use promptwood::errors::QueueError;
use promptwood::nodes::builtin_registry;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// promptwood - execute node-graph prompts through a cached, queued engine
#[derive(Parser)]
#[command(name = "promptwood")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a workflow, wait for it and print the history records as JSON
    Run {
        /// Prompt JSON, bare or wrapped in a submission envelope
        workflow: PathBuf,

        /// Engine config (YAML or TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Submit the workflow this many times; later runs hit the cache
        #[arg(long, default_value_t = 1)]
        repeat: usize,

        /// Queue ahead of anything already waiting
        #[arg(long)]
        front: bool,
    },

    /// Validate a workflow against the built-in nodes
    Validate {
        workflow: PathBuf,
    },

    /// List the registered node types and their slots
    Nodes,
}

fn init_tracing(cfg: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.get_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workflow,
            config,
            repeat,
            front,
        } => {
            let cfg = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("failed to load config: {}", path.display()))?,
                None => EngineConfig::default(),
            };
            init_tracing(&cfg);
            run(&cfg, &workflow, repeat, front).await
        }
        Commands::Validate { workflow } => {
            init_tracing(&EngineConfig::default());
            validate(&workflow)
        }
        Commands::Nodes => {
            init_tracing(&EngineConfig::default());
            list_nodes()
        }
    }
}

async fn run(cfg: &EngineConfig, workflow: &Path, repeat: usize, front: bool) -> Result<()> {
    let submission = load_submission(workflow)
        .with_context(|| format!("failed to load workflow: {}", workflow.display()))?;

    let service = ExecutionService::from_config(cfg, Arc::new(TracingSink));
    service.spawn_worker();

    let mut ids = Vec::with_capacity(repeat);
    for round in 0..repeat.max(1) {
        let mut next = submission.clone();
        if round > 0 {
            next.submission_id = None;
        }
        next.front |= front;

        match service.submit(next) {
            Ok(id) => ids.push(id),
            Err(QueueError::Rejected(errors)) => {
                for error in &errors {
                    eprintln!("{}", error);
                }
                bail!("workflow rejected with {} validation error(s)", errors.len());
            }
            Err(error) => return Err(error.into()),
        }
    }

    let mut records = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(record) = service.wait_for(id).await {
            records.push(record);
        }
    }
    service.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&records)?);
    eprintln!("cache: {}", serde_json::to_string(&service.cache_stats())?);
    Ok(())
}

fn validate(workflow: &Path) -> Result<()> {
    let submission = load_submission(workflow)
        .with_context(|| format!("failed to load workflow: {}", workflow.display()))?;
    let registry = builtin_registry();

    match validate_prompt(
        &registry,
        submission.prompt,
        submission.partial_execution_targets.as_deref(),
    ) {
        Ok(validated) => {
            println!(
                "valid: {} node(s), output targets {:?}",
                validated.prompt().len(),
                validated.targets()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("{}", error);
            }
            bail!("{} validation error(s)", errors.len())
        }
    }
}

fn list_nodes() -> Result<()> {
    let registry = builtin_registry();
    let nodes: Vec<_> = registry
        .class_types()
        .into_iter()
        .filter_map(|class_type| registry.get(class_type))
        .map(|capability| {
            json!({
                "class_type": capability.class_type(),
                "inputs": capability.inputs(),
                "outputs": capability.outputs(),
                "output_node": capability.is_output_node(),
                "idempotent": capability.idempotent(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}
