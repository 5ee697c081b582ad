use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docflow::engine::PipelineEngine;
use docflow::generation::{GenerationClient, HttpGenerator};
use docflow::output::FileOutputRenderer;
use docflow::schema::{discover_schema, CapabilityKind};
use docflow::{parse_workflow_file, validate_workflow, Config, Error};

#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "Declarative document-analysis workflow engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file overriding the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow
    Run {
        /// Path to workflow YAML file
        file: String,
        /// Input values as name=value pairs (repeatable)
        #[arg(short, long)]
        input: Vec<String>,
        /// Override the output directory
        #[arg(long)]
        outputs_dir: Option<String>,
    },
    /// Validate a workflow file without running it
    Validate {
        /// Path to workflow YAML file
        file: String,
    },
    /// Inspect a database: discovered schema, relationships, capabilities
    Inspect {
        /// Path to SQLite database
        database: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "docflow=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            outputs_dir,
        } => cmd_run(&file, &input, outputs_dir.as_deref(), cli.config.as_deref()).await?,
        Commands::Validate { file } => cmd_validate(&file)?,
        Commands::Inspect { database } => cmd_inspect(&database)?,
    }

    Ok(())
}

async fn cmd_run(
    file: &str,
    inputs: &[String],
    outputs_dir: Option<&str>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let spec = parse_workflow_file(file)?;
    let provided = parse_input_pairs(inputs)?;
    let config = Config::load_from(config_path);

    let mut generator = HttpGenerator::new(&config.generation.endpoint);
    if let Some(model) = &config.generation.model {
        generator = generator.with_model(model);
    }
    if let Some(system) = &config.generation.system {
        generator = generator.with_system(system);
    }
    if let Some(temperature) = config.generation.temperature {
        generator = generator.with_temperature(temperature);
    }

    let client = GenerationClient::new(Arc::new(generator))
        .with_default_timeout(config.generation.timeout_seconds);
    let outputs_dir = outputs_dir
        .map(Into::into)
        .unwrap_or(config.outputs.directory);

    let engine = PipelineEngine::new(Arc::new(client))
        .with_renderer(Arc::new(FileOutputRenderer::new(outputs_dir)));

    let outcome = engine.run(&spec, &provided).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn cmd_validate(file: &str) -> anyhow::Result<()> {
    let spec = parse_workflow_file(file)?;
    match validate_workflow(&spec) {
        Ok(()) => {
            println!(
                "{} is valid: {} inputs, {} data sources, {} steps, {} outputs",
                file,
                spec.inputs.len(),
                spec.databases.len(),
                spec.processing_steps.len(),
                spec.outputs.len()
            );
            Ok(())
        }
        Err(Error::Validation(violations)) => {
            eprintln!("{} has {} problem(s):", file, violations.len());
            for violation in violations {
                eprintln!("  - {}", violation);
            }
            std::process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}

fn cmd_inspect(database: &str) -> anyhow::Result<()> {
    let schema = discover_schema(database)?;

    println!("{}", database);
    for table in schema.tables.values() {
        let main = match schema.main_table() {
            Some(m) if m.name == table.name => " (main)",
            _ => "",
        };
        println!("\n{}{} - {} rows", table.name, main, table.row_count);
        for column in &table.columns {
            let mut notes = Vec::new();
            if column.primary_key {
                notes.push("pk");
            }
            if !column.nullable {
                notes.push("not null");
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!(" [{}]", notes.join(", "))
            };
            println!("  {} {}{}", column.name, column.declared_type, notes);
        }
    }

    if !schema.relationships.is_empty() {
        println!("\nrelationships:");
        for rel in &schema.relationships {
            println!(
                "  {}.{} -> {}.{}",
                rel.from_table, rel.from_column, rel.to_table, rel.to_column
            );
        }
    }

    if !schema.suggested_queries.is_empty() {
        println!("\nsuggested queries:");
        for (name, sql) in &schema.suggested_queries {
            println!("  {}: {}", name, sql);
        }
    }

    println!("\ncapabilities:");
    for kind in CapabilityKind::ALL {
        println!("  {} - {}", kind.name(), kind.description());
        println!("    e.g. {}", kind.example());
    }

    Ok(())
}

fn parse_input_pairs(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut provided = HashMap::new();
    for pair in pairs {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("input '{}' is not in name=value form", pair)
        })?;
        provided.insert(name.to_string(), value.to_string());
    }
    Ok(provided)
}
