mod export; // engineering and keyframe file writers
mod scene; // JSON scene document
mod session; // operations on one scene
mod settings; // layered configuration

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use export::{CsvRowSink, write_keyframes};
use scene::Scene;
use session::Session;
use settings::{AutocorrectMode, load_settings};

/// Feasibility checks, autocorrection and wheel baking for differential-drive robot animation.
#[derive(Debug, Parser)]
#[command(name = "roboanim", version)]
struct Cli {
    /// Settings file layered over config/default.toml.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Scene document (JSON).
    scene: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the chassis animation for sideways slip.
    Validate,
    /// Rebuild slipping segments and bake them onto the chassis.
    Autocorrect {
        /// Path geometry; defaults to the configured mode.
        #[arg(long, value_enum)]
        mode: Option<AutocorrectMode>,
    },
    /// Restore the chassis keyframes from before the first autocorrect.
    Revert,
    /// Compute wheel angles and rates for the chassis animation.
    BuildCache,
    /// Key wheel rotations from the wheel cache.
    Bake,
    /// Remove rotation keyframes from the wheel objects.
    Clear,
    /// Export t, x, y, yaw and wheel angles and rates.
    ExportCsv {
        /// Output file; defaults to the configured path.
        path: Option<PathBuf>,
    },
    /// Export the chassis keyframes.
    ExportKeyframes {
        /// Output file; defaults to the configured path.
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<String> {
    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    let scene = Scene::load(&cli.scene)?;
    let mut session = Session::new(settings, scene);
    info!(command = ?cli.command, "Running command");

    let (message, mutated) = match cli.command {
        Command::Validate => {
            let report = session.validate()?;
            if let Err(e) = report.ensure_feasible() {
                anyhow::bail!("This won't work: {e}.");
            }
            ("Motion is feasible (no slip violations).".to_owned(), false)
        }
        Command::Autocorrect { mode } => {
            let outcome = session.autocorrect(mode).context("Autocorrect failed")?;
            (
                format!("Autocorrect baked {} frames. Re-run Validate Motion.", outcome.frames_baked),
                outcome.changed,
            )
        }
        Command::Revert => {
            session.revert()?;
            ("Original chassis keyframes restored.".to_owned(), true)
        }
        Command::BuildCache => {
            let cache = session.build_cache()?;
            let geometry = cache.geometry();
            let (rpm_l, rpm_r) = cache.max_rpm();
            (
                format!(
                    "OK | r={:.4} m | track={:.4} m | maxRPM L/R {:.1}/{:.1}",
                    geometry.wheel_radius, geometry.track_width, rpm_l, rpm_r
                ),
                true,
            )
        }
        Command::Bake => {
            session.bake()?;
            ("Baked wheel rotations to keyframes.".to_owned(), true)
        }
        Command::Clear => {
            let removed = session.clear();
            if removed > 0 {
                (format!("Cleared {removed} rotation keyframes"), true)
            } else {
                ("Nothing to clear on wheel objects.".to_owned(), false)
            }
        }
        Command::ExportCsv { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(&session.settings().csv_path));
            let cache = session.export_cache().context("Failed to write CSV")?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to write CSV: cannot create {}", path.display()))?;
            let mut sink = CsvRowSink::new(file);
            let settings = session.settings();
            let rows = cache
                .export(&mut sink, settings.sampling(), settings.export_units())
                .context("Failed to write CSV")?;
            sink.finish()?;
            (format!("Wrote {} ({} samples)", path.display(), rows), false)
        }
        Command::ExportKeyframes { path } => {
            let settings = session.settings();
            let path = path.unwrap_or_else(|| PathBuf::from(&settings.other_export_path));
            let rows = session.keyframe_rows().context("Failed to write")?;
            let n = write_keyframes(&path, &rows, settings.other_export_format).context("Failed to write")?;
            (format!("Keyframes exported to {} ({} rows)", path.display(), n), false)
        }
    };

    if mutated {
        session.scene().save(&cli.scene)?;
    }
    Ok(message)
}
