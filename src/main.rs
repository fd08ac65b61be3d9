use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use clap::{ArgAction, Parser};
use log::{LevelFilter, info};
use miette::{IntoDiagnostic, Result, WrapErr};
use rust_decimal::Decimal;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use time::{OffsetDateTime, macros::format_description};
use ubf::{Config, compile, compile_network, render_network};

/// Compiles a UBF reaction network, and any mass-spectrometry measurements, into an FTBL flux table
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The UBF network to compile
    network: PathBuf,
    /// Mass-spectrometry measurements to add to the MASS_SPECTROMETRY section
    #[arg(long)]
    ms: Option<PathBuf>,
    /// Where to write the result, instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// The program converting compiled reactions into an FTBL file
    #[arg(long, env = "UBF2FTBL_CONVERTER", default_value = Config::DEFAULT_CONVERTER)]
    converter: String,
    /// An extra argument for the converter (may be repeated)
    #[arg(long = "converter-arg", allow_hyphen_values = true)]
    converter_args: Vec<String>,
    /// The deviation written next to every intensity
    #[arg(long, default_value = "0.01")]
    deviation: Decimal,
    /// Write the compiled reactions without running the converter
    #[arg(long, conflicts_with = "ms")]
    txt_only: bool,
    /// Fail when the network has no `// Reactions` line
    #[arg(long)]
    strict: bool,
    /// Log more detail (may be repeated)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let network = read(&args.network)?;
    let mass_spec = args.ms.as_deref().map(read).transpose()?;

    let config = Config {
        deviation: args.deviation,
        converter: args.converter,
        converter_args: args.converter_args,
        strict_section: args.strict,
        banner: Some(banner()?),
    };

    let output = if args.txt_only {
        let reactions = compile_network(&network, &config)?;
        render_network(&reactions, config.banner.as_deref())
    } else {
        compile(
            &network,
            mass_spec.as_deref(),
            &config.external_converter(),
            &config,
        )?
    };

    match args.output {
        Some(path) => {
            fs::write(&path, output)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => io::stdout().lock().write_all(output.as_bytes()).into_diagnostic()?,
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match (args.quiet, args.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).into_diagnostic()
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn banner() -> Result<String> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let now = OffsetDateTime::now_utc().format(format).into_diagnostic()?;
    Ok(format!(
        "automatically produced by ubf2ftbl {}\nat {now}",
        env!("CARGO_PKG_VERSION")
    ))
}
