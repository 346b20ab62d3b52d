use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod info;
mod list;
mod rand_cmd;
mod selftest;

/// fipsrng command-line tool: SP 800-90A random bytes and self-tests.
#[derive(Parser)]
#[command(name = "fipsrng")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random bytes.
    Rand {
        /// Number of bytes.
        #[arg(short, long)]
        num: usize,
        /// Output format: hex or base64.
        #[arg(long, default_value = "hex")]
        format: String,
        /// DRBG algorithm (e.g. SHA256, AES-256-ECB, HMAC-SHA512).
        #[arg(long)]
        alg: Option<String>,
        /// Requested security strength in bits; 0 picks the highest.
        #[arg(long)]
        strength: Option<u32>,
        /// Reseed before every request.
        #[arg(long)]
        pr: bool,
    },
    /// List registered DRBG algorithms.
    List {
        /// Only FIPS-approved, non-excluded algorithms.
        #[arg(long)]
        fips: bool,
    },
    /// Run the power-up self-tests.
    Selftest,
    /// Show limits, seed source and entropy estimate of an algorithm.
    Info {
        /// DRBG algorithm.
        #[arg(long, default_value = "SHA256")]
        alg: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Rand {
            num,
            format,
            alg,
            strength,
            pr,
        } => rand_cmd::run(*num, format, alg.as_deref(), *strength, *pr),
        Commands::List { fips } => list::run(*fips),
        Commands::Selftest => selftest::run(),
        Commands::Info { alg } => info::run(alg),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
