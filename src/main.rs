use chainwatch::{Result, model, render, source, spec};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainwatch")]
#[command(about = "Member-path checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, classify, and group a listing of paths.
    Check {
        #[arg(long)]
        types: String,

        #[arg(long)]
        paths: String,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Write the report here instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CHAINWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Check {
            types,
            paths,
            format,
            out,
        } => {
            // 1) Load + validate the type catalog.
            let catalog = spec::TypeCatalog::load(&types)?;
            tracing::info!(types = catalog.len(), "catalog loaded");

            // 2) Parse the path listing.
            let raws = source::parse_paths_file(&paths)?;

            // 3) Extract, classify, group.
            let analysis = model::analyze(&raws, &catalog);
            let data = model::build_report_data(&analysis);

            // 4) Render.
            let report = match format {
                Format::Text => render::render_text_report(&data)?,
                Format::Json => render::render_json_report(&data)?,
            };
            match &out {
                Some(file) => {
                    std::fs::write(file, &report).with_context(|| format!("write {}", file))?;
                    println!("Wrote {}", file);
                }
                None => print!("{}", report),
            }

            if data.has_rejections() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
