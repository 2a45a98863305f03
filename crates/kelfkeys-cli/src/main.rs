//! kelfkeys CLI - KELF key profiles
//!
//! Usage:
//!   kelfkeys decrypt <input> <output> [-k <kind>]
//!   kelfkeys encrypt <headerid> <input> <output> [-k <kind>]
//!   kelfkeys keys [--json]

mod engine;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use kelfkeys_core::{inspect, Command, CommandError, Dispatcher, KeystoreError, KeystoreReport, KeystoreResolver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::engine::DetachedEngine;

/// Exit code for usage errors, matching clap
const USAGE_EXIT: u8 = 2;

const HEADER_HELP: &str = "\
<HEADERID>:
  fmcb - for retail PS2 memory cards
  fhdb - for retail PS2 HDD (HDD OSD / BB Navigator)
  mbr  - for retail PS2 HDD (mbr injection).
         Note: for mbr elf should load from 0x100000 and should be without headers:
         readelf -h <input_elf> should show 0x100000 or 0x100008
         $(EE_OBJCOPY) -O binary -v <input_elf> <headerless_elf>
  bmcc - for arcade memory cards (optional with -k arcade)";

#[derive(Parser)]
#[command(name = "kelfkeys")]
#[command(version)]
#[command(about = "Decrypt and encrypt KELF files with per-environment key profiles", long_about = None)]
struct Cli {
    /// Keystore file to use instead of the default locations
    #[arg(long, global = true, env = "KELF_KEYSTORE", value_name = "PATH")]
    keystore: Option<PathBuf>,

    /// Log keystore resolution details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt and check the signature of a KELF file
    Decrypt {
        input: PathBuf,
        output: PathBuf,

        /// Key profile: retail, dev, proto or arcade
        #[arg(short = 'k', long = "kind", value_name = "KEYSTORE")]
        kind: Option<String>,
    },

    /// Encrypt and sign a KELF file
    #[command(after_help = HEADER_HELP)]
    Encrypt {
        /// Header template: fmcb, fhdb, mbr or bmcc
        #[arg(value_name = "HEADERID")]
        header: String,
        input: PathBuf,
        output: PathBuf,

        /// Key profile: retail, dev, proto or arcade
        #[arg(short = 'k', long = "kind", value_name = "KEYSTORE")]
        kind: Option<String>,
    },

    /// Show which keystore would be used and the key lengths it holds
    Keys {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_error(err),
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let resolver = match cli.keystore {
        Some(path) => KeystoreResolver::explicit(path),
        None => KeystoreResolver::platform(),
    };
    tracing::debug!(candidates = ?resolver.candidates(), "keystore search order");

    let command = match cli.command {
        Commands::Decrypt { input, output, kind } => Command::Decrypt { input, output, kind },
        Commands::Encrypt { header, input, output, kind } => {
            Command::Encrypt { header, input, output, kind }
        }
        Commands::Keys { json } => {
            let report = inspect(&resolver)?;
            return print_report(&report, json);
        }
    };

    Dispatcher::new(DetachedEngine, resolver).run(&command)?;
    Ok(())
}

fn print_report(report: &KeystoreReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("keystore: {}", report.path.display());
    if report.profiles.is_empty() {
        println!("  (no profiles)");
    }
    for profile in &report.profiles {
        println!("[{}]", profile.kind);
        for key in &profile.keys {
            println!("  {:<24} {} bytes", key.name, key.bytes);
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<CommandError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<KeystoreError>() {
        return e.exit_code();
    }
    1
}

/// Help and version go out as-is. A missing or unknown subcommand prints
/// the usage text on stdout and fails.
fn usage_error(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let _ = Cli::command().print_help();
            ExitCode::from(USAGE_EXIT)
        }
        ErrorKind::InvalidSubcommand => {
            let token = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(token)) => token.clone(),
                _ => String::new(),
            };
            let unknown = CommandError::UnknownCommand(token);
            eprintln!("error: {unknown}");
            let _ = Cli::command().print_help();
            ExitCode::from(unknown.exit_code())
        }
        _ => {
            let _ = err.print();
            ExitCode::from(USAGE_EXIT)
        }
    }
}
