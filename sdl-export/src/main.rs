//! Point d'entrée CLI pour sdl-export

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use sdl_export::cli::{self, Commands};
use sdl_export::report::ExportStatus;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Exporter des fichiers SDL (Autodesk SDF Loader) vers GeoJSON
#[derive(Parser)]
#[command(name = "sdl-export")]
#[command(author, version)]
#[command(about = "Exporter des fichiers SDL (Autodesk SDF Loader) vers GeoJSON")]
#[command(long_about = "Lecture en flux du format SDL : un enregistrement mal formé est exporté \
avec parseError=1 sans interrompre la lecture.\n\nLe CRS par défaut peut être fourni par la \
variable SDL_SRS (fichier .env accepté).")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::ToGeojson(args) => {
            debug!(path = %args.path.display(), output = %args.output.display(), srid = ?args.srid, "Export vers GeoJSON");
            let report = cli::cmd_export(&args)?;
            if !cli.quiet {
                report.display();
            }
            if report.status == ExportStatus::Failed {
                anyhow::bail!("No SDL file could be exported");
            }
        }
        Commands::Info(args) => {
            debug!(path = %args.path.display(), "Inspection");
            cli::cmd_info(&args)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
