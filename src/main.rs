//! cpg-sema CLI - inspect type parsing and common-type computation

use clap::{Parser, Subcommand, ValueEnum};
use cpg_sema::config::{default_config_path, load_config, SemaConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "cpg-sema")]
#[command(version)]
#[command(about = "Type and symbol resolution core for code property graphs")]
#[command(long_about = r#"
cpg-sema parses type strings with per-language capability tables and
computes closest common supertypes over record hierarchies.

Example usage:
  cpg-sema parse "const std::vector<int>*" --language cpp
  cpg-sema common Dog* Cat* --record Dog:Animal --record Cat:Animal
  cpg-sema languages
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./cpg-sema.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "human")]
    format: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a type string and show its structure
    Parse {
        /// Raw type text, e.g. "const char*"
        #[arg(value_name = "TYPE")]
        text: String,

        /// Language table to parse with
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Compute the closest common supertype of several types
    Common {
        /// Raw type texts
        #[arg(value_name = "TYPE", required = true)]
        types: Vec<String>,

        /// Record binding as Name:Super1,Super2 (repeatable)
        #[arg(short, long = "record", value_parser = commands::parse_record_spec)]
        records: Vec<commands::RecordSpec>,

        /// Language table to parse with
        #[arg(short, long)]
        language: Option<String>,
    },

    /// List the known language capability tables
    Languages,

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    command: &'a str,
    data: T,
}

/// Print a json success envelope
pub fn emit_success<T: Serialize>(output_mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if output_mode.is_human() {
        return Ok(());
    }
    let envelope = Envelope {
        ok: true,
        command,
        data,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    if let Commands::Init { force } = cli.command {
        return commands::run_init(cli.format, &config_path, force);
    }

    let config = match load_config(Some(&config_path)) {
        Ok(Some(config)) => {
            tracing::debug!("Loaded config from {}", config_path.display());
            config
        }
        Ok(None) => SemaConfig::default(),
        Err(e) => {
            cpg_sema::ui::error(&format!("Failed to load {}: {}", config_path.display(), e));
            return Err(e);
        }
    };

    match cli.command {
        Commands::Parse { text, language } => {
            commands::run_parse(cli.format, &config, &text, language.as_deref())
        }
        Commands::Common {
            types,
            records,
            language,
        } => commands::run_common(cli.format, &config, &types, &records, language.as_deref()),
        Commands::Languages => commands::run_languages(cli.format, &config),
        Commands::Init { .. } => Ok(()),
    }
}
