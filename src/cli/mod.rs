//! Command-line interface for sentiflow.
//!
//! Provides commands for running the workflow synchronously, managing
//! records in the store, and inspecting the workflow and configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    CapabilityRegistry, ClassifierConfig, FetchRecord, LogNotifier, RecordStore,
    SentimentClassifier, TelegramClient, TelegramConfig, TelegramNotifier, CAPABILITY_CLASSIFY,
    CAPABILITY_FETCH_RECORD, CAPABILITY_NOTIFY,
};
use crate::config::{self, NotifierConfig, ResolvedConfig};
use crate::core::{Orchestrator, Workflow};
use crate::domain::{ExecutionOutcome, Payload};

/// sentiflow - Sentiment notification workflow orchestrator
#[derive(Parser, Debug)]
#[command(name = "sentiflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the workflow for one input payload and print the result
    Run {
        /// Input payload as inline JSON
        #[arg(short, long, conflicts_with = "input")]
        payload: Option<String>,

        /// Input file (reads from stdin if neither --payload nor --input is given)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Workflow definition to use instead of the configured one
        #[arg(short, long)]
        workflow: Option<PathBuf>,

        /// Print the execution history along with the result
        #[arg(long)]
        history: bool,
    },

    /// Manage records in the record store
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Inspect workflow definitions
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// Insert or replace a record
    Put {
        /// Record key
        key: String,
        /// Record body as a JSON object
        json: String,
    },

    /// Print a record
    Get {
        /// Record key
        key: String,
    },

    /// Delete a record
    Delete {
        /// Record key
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// Print the active workflow definition as YAML
    Show,

    /// Validate a workflow definition file (the active one if omitted)
    Validate {
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                payload,
                input,
                workflow,
                history,
            } => run_workflow(payload, input, workflow, history).await,
            Commands::Record { command } => execute_record(command).await,
            Commands::Workflow { command } => execute_workflow(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Build the capability handles described by the configuration
pub fn build_registry(config: &ResolvedConfig) -> Result<CapabilityRegistry> {
    let store = RecordStore::open(&config.store_path)?;
    let fetch = FetchRecord::with_key_field(store, config.key_field.clone());
    let classifier = SentimentClassifier::new(config.classifier.clone());

    let mut registry = CapabilityRegistry::new()
        .with(CAPABILITY_FETCH_RECORD, Arc::new(fetch))
        .with(CAPABILITY_CLASSIFY, Arc::new(classifier));

    match &config.notifier {
        NotifierConfig::Log => {
            registry.register(CAPABILITY_NOTIFY, Arc::new(LogNotifier::new()));
        }
        NotifierConfig::Telegram {
            chat_id,
            bot_token,
            api_base,
        } => {
            let bot_token = bot_token
                .clone()
                .context("Telegram notifier needs a bot token (SENTIFLOW_TELEGRAM_TOKEN)")?;
            let client = TelegramClient::from_config(TelegramConfig {
                bot_token,
                chat_id: chat_id.clone(),
                api_base: api_base.clone(),
            });
            registry.register(CAPABILITY_NOTIFY, Arc::new(TelegramNotifier::new(client)));
        }
    }

    Ok(registry)
}

/// Load the workflow to run: explicit file, configured file, or built-in
pub fn load_workflow(config: &ResolvedConfig, explicit: Option<PathBuf>) -> Result<Workflow> {
    let mut workflow = match explicit.or_else(|| config.workflow.clone()) {
        Some(path) => Workflow::from_file(&path)?,
        None => Workflow::sentiment(),
    };
    config.limits.apply_to(&mut workflow.limits);
    Ok(workflow)
}

/// Run the workflow with the given input
async fn run_workflow(
    payload: Option<String>,
    input_file: Option<PathBuf>,
    workflow_file: Option<PathBuf>,
    show_history: bool,
) -> Result<()> {
    let config = config::config()?;

    // Get input
    let raw = if let Some(inline) = payload {
        inline
    } else if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --payload <json>, --input <file> or pipe to stdin");
    };

    let input = Payload::from_json_str(raw.trim()).context("Invalid input payload")?;

    let workflow = load_workflow(config, workflow_file)?;
    let registry = build_registry(config)?;
    let orchestrator = Orchestrator::new(workflow, registry)?;

    let report = orchestrator.start_execution(input).await;

    if show_history {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report.outcome)?);
    }

    match &report.outcome {
        ExecutionOutcome::Succeeded { .. } => {
            eprintln!(
                "\n[Execution {} succeeded in {}ms]",
                report.execution_id,
                report.duration_ms()
            );
        }
        ExecutionOutcome::Failed { cause } => {
            eprintln!("\n[Execution {} failed: {}]", report.execution_id, cause);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Execute record subcommands
async fn execute_record(command: RecordCommands) -> Result<()> {
    let config = config::config()?;
    let store = RecordStore::open(&config.store_path)?;

    match command {
        RecordCommands::Put { key, json } => {
            let record = Payload::from_json_str(&json).context("Invalid record JSON")?;
            store.put(&key, record).await?;
            println!("Stored record '{}'", key);
        }
        RecordCommands::Get { key } => match store.get(&key).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("Record '{}' not found", key),
        },
        RecordCommands::Delete { key } => {
            if store.delete(&key).await? {
                println!("Deleted record '{}'", key);
            } else {
                anyhow::bail!("Record '{}' not found", key);
            }
        }
    }

    Ok(())
}

/// Execute workflow subcommands
async fn execute_workflow(command: WorkflowCommands) -> Result<()> {
    let config = config::config()?;

    match command {
        WorkflowCommands::Show => {
            let workflow = load_workflow(config, None)?;
            print!("{}", workflow.to_yaml()?);
        }
        WorkflowCommands::Validate { file } => {
            let workflow = load_workflow(config, file)?;
            workflow.validate()?;
            println!(
                "Workflow '{}' is valid ({} states, capabilities: {})",
                workflow.name,
                workflow.states.len(),
                workflow.capabilities().join(", ")
            );
        }
    }

    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Home: {}", config.home.display());
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("Record store: {}", config.store_path.display());
    println!("Key field: {}", config.key_field);

    let ClassifierConfig {
        base_url,
        model,
        text_field,
        api_key,
    } = &config.classifier;
    println!("Classifier: {} (model {}, text field '{}')", base_url, model, text_field);
    println!(
        "Classifier API key: {}",
        if api_key.is_some() { "set" } else { "not set" }
    );

    match &config.notifier {
        NotifierConfig::Log => println!("Notifier: log"),
        NotifierConfig::Telegram { chat_id, .. } => println!("Notifier: telegram (chat {})", chat_id),
    }
    match &config.workflow {
        Some(path) => println!("Workflow: {}", path.display()),
        None => println!("Workflow: built-in sentiment"),
    }

    Ok(())
}
