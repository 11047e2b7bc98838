use std::path::PathBuf;

use clap::{Parser, Subcommand};
use results_compiler::config::CompileConfig;
use results_compiler::io::excel_write;
use results_compiler::{CompileError, Result, compiler, source};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Compile(args) => execute_compile(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| CompileError::Logging(error.to_string()))
}

fn execute_compile(args: CompileArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => CompileConfig::load(path)?,
        None => CompileConfig::default(),
    };

    let files = source::load_directory(&args.input)?;
    info!(
        file_count = files.len(),
        input = %args.input.display(),
        "loaded source workbooks"
    );

    let compilation = compiler::compile_files(config, files)?;
    excel_write::write_compilation(&args.output, &compilation)?;
    info!(
        rows = compilation.table.rows.len(),
        rejections = compilation.rejections.len(),
        output = %args.output.display(),
        "results written"
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Compile heterogeneous Excel workbooks into one results table."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile every workbook in a directory into a single results workbook.
    Compile(CompileArgs),
}

#[derive(clap::Args)]
struct CompileArgs {
    /// Directory containing the source workbooks.
    #[arg(long)]
    input: PathBuf,

    /// Destination path for the compiled workbook.
    #[arg(long)]
    output: PathBuf,

    /// Optional JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}
