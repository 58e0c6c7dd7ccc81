use clap::{Parser, Subcommand};
use remito_ingest::config::Config;
use remito_ingest::form_plan::{FormFillRequest, build_plan};
use remito_ingest::llm_extract::LlmExtractor;
use remito_ingest::notes::{ParsedNote, catalog};
use remito_ingest::pipeline;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "remito_ingest",
    version,
    about = "Read handwritten delivery notes and prepare stock-movement form entries"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML config file (built-in defaults when omitted).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a note image with the vision model and apply business rules.
    Parse {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Apply business rules to a note already saved as JSON.
    Rules {
        #[arg(value_name = "NOTE_JSON")]
        note: PathBuf,
    },

    /// Print the field-by-field form plan for a note saved as JSON.
    Plan {
        #[arg(value_name = "NOTE_JSON")]
        note: PathBuf,

        /// Date as written on the note (DD/MM/YY); overrides the note's own.
        #[arg(long)]
        fecha: Option<String>,

        #[arg(long)]
        salida: Option<String>,

        #[arg(long)]
        entrada: Option<String>,

        #[arg(long)]
        comentarios: Option<String>,
    },

    /// Print the product catalog in match order.
    Catalog,
}

#[derive(Serialize)]
struct CatalogEntry {
    key: &'static str,
    value: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing; stdout is reserved for JSON output
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Install crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    let cli = Cli::parse();
    let cfg = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Parse { image } => {
            let extractor = LlmExtractor::new(cfg.llm.clone())?;
            let note = pipeline::process_image(&image, &extractor).await?;
            print_json(&note)?;
        }
        Command::Rules { note } => {
            let parsed = read_note(&note)?;
            print_json(&pipeline::process_note(&parsed))?;
        }
        Command::Plan {
            note,
            fecha,
            salida,
            entrada,
            comentarios,
        } => {
            let augmented = pipeline::process_note(&read_note(&note)?);
            let mut request = FormFillRequest::from_note(&augmented, &cfg.form);
            request.fecha = fecha.or(request.fecha);
            request.salida = salida.unwrap_or(request.salida);
            request.entrada = entrada.unwrap_or(request.entrada);
            request.comentarios = comentarios;

            let today = OffsetDateTime::now_utc().date();
            let plan = build_plan(&request, &cfg.form.url, today);
            info!(fields = plan.fields.len(), items = plan.items_filled, "Form plan ready");
            print_json(&plan)?;
        }
        Command::Catalog => {
            for s in catalog::shadowed_entries() {
                warn!(key = s.key, hidden = s.hidden, "Catalog key shadows a later entry");
            }
            let entries: Vec<CatalogEntry> = catalog::CATALOG
                .iter()
                .map(|&(key, value)| CatalogEntry { key, value })
                .collect();
            print_json(&entries)?;
        }
    }

    Ok(())
}

fn read_note(path: &Path) -> Result<ParsedNote, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read note {}: {e}", path.display()))?;
    let note: ParsedNote = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse note {}: {e}", path.display()))?;
    info!(path = %path.display(), items = note.items.len(), "Loaded note");
    Ok(note)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
