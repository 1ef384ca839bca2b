use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use schempack::{convert, translate, Tables};

/// Convert a Java-edition schematic into a Bedrock command stream.
#[derive(Parser)]
#[command(name = "schempack", version, about)]
struct Cli {
    /// Schematic file (.schematic, .schem or .litematic)
    input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the Java → Bedrock translation table
    #[arg(long)]
    java_map: Option<PathBuf>,

    /// Override the legacy "id:meta" table
    #[arg(long)]
    legacy_map: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let java_json = match &cli.java_map {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading translation table {}", path.display()))?,
        None => translate::JAVA_TABLE_JSON.to_string(),
    };
    let legacy_json = match &cli.legacy_map {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading legacy table {}", path.display()))?,
        None => translate::LEGACY_TABLE_JSON.to_string(),
    };
    let tables = Tables::from_json(&java_json, &legacy_json)?;

    let input = fs::read(&cli.input)
        .with_context(|| format!("reading schematic {}", cli.input.display()))?;

    let stats = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output {}", path.display()))?;
            let mut sink = BufWriter::new(file);
            let stats = convert(&input, &tables, &mut sink)?;
            sink.flush()?;
            stats
        }
        None => {
            let stdout = io::stdout();
            let mut sink = BufWriter::new(stdout.lock());
            let stats = convert(&input, &tables, &mut sink)?;
            sink.flush()?;
            stats
        }
    };

    info!(
        commands = stats.commands,
        filled = stats.filled_cells,
        skipped = stats.skipped_cells,
        "conversion finished"
    );
    Ok(())
}
