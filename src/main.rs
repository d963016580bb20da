use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tzgrid::{LoadMode, TimezoneEngine, TzGridError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Function {
    /// Full lookup; oceans resolve to Etc/GMT zones
    At,
    /// Full lookup, but ocean matches are reported as no result
    AtLand,
    /// Only answer when the shortcut cell is covered by a single zone
    Unique,
    /// Test every candidate polygon instead of stopping early
    Certain,
    /// Shortcut-only best guess without polygon tests
    Likely,
}

#[derive(Debug, Parser)]
#[command(
    name = "tzgrid",
    version,
    about = "Offline IANA timezone lookup for WGS84 coordinates"
)]
struct Cli {
    /// Longitude in degrees (-180 to 180)
    #[arg(allow_negative_numbers = true)]
    lon: f64,
    /// Latitude in degrees (-90 to 90)
    #[arg(allow_negative_numbers = true)]
    lat: f64,
    /// Directory containing the compiled timezone dataset
    #[arg(short, long, default_value = "data")]
    data: PathBuf,
    /// Query procedure to run
    #[arg(short, long, value_enum, default_value_t = Function::At)]
    function: Function,
    /// Read the dataset into memory instead of memory-mapping it
    #[arg(long)]
    in_memory: bool,
    /// Log dataset loading details to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[allow(deprecated)]
fn run(cli: &Cli) -> Result<Option<String>, TzGridError> {
    let mode = if cli.in_memory {
        LoadMode::InMemory
    } else {
        LoadMode::Mmap
    };
    let engine = TimezoneEngine::open_with(&cli.data, mode)?;
    let coord = (cli.lon, cli.lat);
    let name = match cli.function {
        Function::At => engine.timezone_at(&coord)?,
        Function::AtLand => engine.timezone_at_land(&coord)?,
        Function::Unique => engine.unique_timezone_at(&coord)?,
        Function::Certain => engine.certain_timezone_at(&coord)?,
        Function::Likely => engine.likely_timezone_at(&coord)?,
    };
    Ok(name.map(str::to_owned))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    match run(&cli) {
        Ok(Some(name)) => {
            println!("{}", name);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!();
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}
