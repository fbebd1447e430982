//! ITCH 5.0 order book backtester.
//!
//! Streams a historical NASDAQ TotalView-ITCH capture through one of four
//! order book engines and prints packets, total nanoseconds, and nanoseconds
//! per packet.

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing::Level;

mod backtest;

use orderbook::{EngineConfig, ScalarBook, SoaBook, SoaPriceBook};

#[derive(Parser)]
#[command(name = "itchbt")]
#[command(about = "ITCH 5.0 order book backtester")]
struct Cli {
    /// Input ITCH file
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Input ITCH file (positional form)
    #[arg(value_name = "PATH")]
    input: Option<PathBuf>,

    /// Order book implementation
    #[arg(long, value_enum, default_value = "scalar")]
    isa: Isa,

    /// Log every book mutation
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Isa {
    Scalar,
    Soa,
    #[value(name = "soa_price")]
    SoaPrice,
    Avx2,
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        // Usage and argument problems exit 1; --help prints and exits 0.
        process::exit(if err.use_stderr() { 1 } else { 0 })
    });

    let level = if cli.trace { Level::TRACE } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    let Some(file) = cli.file.or(cli.input) else {
        eprintln!("error: no input file specified");
        process::exit(1)
    };

    let config = EngineConfig::default();
    let result = match cli.isa {
        Isa::Scalar => backtest::run::<ScalarBook>(&file, config),
        Isa::Soa => backtest::run::<SoaBook>(&file, config),
        Isa::SoaPrice => backtest::run::<SoaPriceBook>(&file, config),
        #[cfg(target_arch = "x86_64")]
        Isa::Avx2 => {
            if !is_x86_feature_detected!("avx2") {
                eprintln!("error: --isa avx2 requires a CPU with AVX2");
                process::exit(1);
            }
            backtest::run::<orderbook::Avx2Book>(&file, config)
        }
        #[cfg(not(target_arch = "x86_64"))]
        Isa::Avx2 => {
            eprintln!("error: --isa avx2 is only available on x86_64");
            process::exit(1)
        }
    };

    match result {
        Ok(summary) => {
            println!(
                "{} packets in {} nanos , {:.2} nanos per packet",
                summary.packets,
                summary.nanos,
                summary.nanos_per_packet()
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}
