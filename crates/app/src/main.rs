use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dance_build_core::{pipeline, BuildConfig, BuildRequest, FsMoveLibrary};
use tracing_subscriber::EnvFilter;

fn main() -> dance_build_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };

    match cli.command {
        Commands::Build { request, output } => run_build(&config, &request, output),
        Commands::Check { request } => run_check(&config, &request),
        Commands::Midi { request, output } => run_midi(&config, &request, &output),
    }
}

fn read_request(path: &Path) -> dance_build_core::Result<BuildRequest> {
    let bytes = std::fs::read(path)?;
    BuildRequest::from_json(&bytes)
}

fn run_build(
    config: &BuildConfig,
    request: &Path,
    output: Option<PathBuf>,
) -> dance_build_core::Result<()> {
    let mut request = read_request(request)?;
    if let Some(output) = output {
        request.output_path = output;
    }
    tracing::info!(song = %request.song.name, output = ?request.output_path, "building song");

    let report = pipeline::run_build(&request, config)?;
    tracing::info!(
        bundle = ?report.bundle_dir,
        midi = ?report.midi_path,
        entries = report.entries,
        "build finished"
    );
    Ok(())
}

fn run_check(config: &BuildConfig, request: &Path) -> dance_build_core::Result<()> {
    let request = read_request(request)?;
    let library = FsMoveLibrary::new(&request.library_root);
    let compiled = pipeline::compile(&request, config, &library)?;
    tracing::info!(
        moves = compiled.graph.parents.len(),
        clips = compiled.graph.variants.len(),
        battle_steps = compiled.battle.len(),
        party_jumps = compiled.party_jumps.len(),
        "request is valid"
    );
    Ok(())
}

fn run_midi(config: &BuildConfig, request: &Path, output: &Path) -> dance_build_core::Result<()> {
    let request = read_request(request)?;
    let library = FsMoveLibrary::new(&request.library_root);
    let compiled = pipeline::compile(&request, config, &library)?;
    std::fs::write(output, compiled.timing.to_smf_bytes()?)?;
    tracing::info!(?output, "wrote timing file");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile a dance song description into a game bundle", long_about = None)]
struct Cli {
    /// Optional JSON build configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a request and write the bundle and timing file.
    Build {
        /// Path to the JSON build request.
        request: PathBuf,
        /// Overrides the request's output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run every compiler stage without writing anything.
    Check {
        /// Path to the JSON build request.
        request: PathBuf,
    },
    /// Compile a request and write only the MIDI timing file.
    Midi {
        /// Path to the JSON build request.
        request: PathBuf,
        /// Output path for the MIDI file.
        output: PathBuf,
    },
}
