mod buffer;
mod generator;
mod solve;
mod stats;
mod throughput;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use generator::SystemKind;
use ldlt_common::status::FAULT_BASE;
use ldlt_core::channel::{ChannelConfig, DEFAULT_MAX_POLLS};
use ldlt_core::sim::SimAccelerator;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Drive the LDLT accelerator command protocol against the simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one system and check the answer.
    Solve {
        #[arg(long, default_value_t = 4)]
        size: usize,
        #[arg(long, value_enum, default_value_t = SystemKind::Identity)]
        kind: SystemKind,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Simulate an accelerator that never completes.
        #[arg(long)]
        hang: bool,
        #[command(flatten)]
        channel: ChannelArgs,
    },
    /// Issue a status check on an idle accelerator.
    Probe,
    /// Solve many random systems in parallel.
    Bench {
        #[arg(long, default_value_t = 10_000)]
        systems: usize,
        #[arg(long, default_value_t = 8)]
        size: usize,
        /// Extra busy checks added per system, up to this many.
        #[arg(long, default_value_t = 0)]
        jitter: u32,
        #[command(flatten)]
        channel: ChannelArgs,
    },
}

#[derive(Args)]
struct ChannelArgs {
    /// Busy status checks before the simulated accelerator completes.
    #[arg(long, default_value_t = 0)]
    latency: u32,
    /// Status checks before giving up with a timeout.
    #[arg(long, default_value_t = DEFAULT_MAX_POLLS)]
    max_polls: u32,
    /// Treat status words at or above 1 << 63 as faults.
    #[arg(long)]
    report_faults: bool,
    /// Skip the idle probe before submitting.
    #[arg(long)]
    no_probe: bool,
}

impl ChannelArgs {
    fn config(&self) -> ChannelConfig {
        let config = ChannelConfig::default()
            .with_max_polls(self.max_polls)
            .with_probe(!self.no_probe);
        if self.report_faults {
            config.with_fault_threshold(FAULT_BASE)
        } else {
            config
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Solve {
            size,
            kind,
            seed,
            hang,
            channel,
        } => {
            let sim = if hang {
                SimAccelerator::hanging()
            } else {
                SimAccelerator::new().with_latency(channel.latency)
            };
            solve::run_solve(kind, size, seed, sim, channel.config())?;
        }
        Commands::Probe => {
            solve::run_probe(SimAccelerator::new())?;
        }
        Commands::Bench {
            systems,
            size,
            jitter,
            channel,
        } => {
            throughput::run_benchmark(systems, size, channel.latency, jitter, channel.config())?;
        }
    }
    Ok(())
}
