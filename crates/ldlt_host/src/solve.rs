//! Single-command runs against the simulated accelerator.
//!
//! Mirrors the bring-up sequence used on hardware: probe the accelerator,
//! solve one system, probe again, and report the outcome.

use crate::generator::{System, SystemKind};
use anyhow::{Context, Result, bail};
use ldlt_core::channel::{ChannelConfig, CommandChannel};
use ldlt_core::sim::SimAccelerator;
use tracing::info;

/// Largest error tolerated between the accelerator's answer and the known
/// solution.
pub const TOLERANCE: f64 = 1e-8;

/// Solves one generated system and prints the result.
///
/// # Arguments
///
/// * `kind` - Identity or random SPD system
/// * `n` - System dimension
/// * `seed` - Seed for random systems
/// * `sim` - Simulated accelerator to run on
/// * `config` - Channel configuration
pub fn run_solve(
    kind: SystemKind,
    n: usize,
    seed: u64,
    sim: SimAccelerator,
    config: ChannelConfig,
) -> Result<()> {
    let mut system = System::generate(kind, n, seed)?;
    let n = system.n;
    let mut channel = CommandChannel::with_config(sim, config);

    let before = channel.probe();
    info!(status = before, "pre-solve probe");

    let done = channel
        .solve(&mut system.matrix, &mut system.rhs, n, n)
        .with_context(|| format!("{n}x{n} {kind:?} solve failed"))?;

    let after = channel.probe();
    info!(status = after, "post-solve probe");

    let error = system.max_error();
    println!("Solution:   {:?}", &*system.rhs);
    println!("Expected:   {:?}", system.solution);
    println!("Max error:  {:.3e}", error);
    println!(
        "Initial status {:#x}, {} status checks",
        done.initial_status, done.polls
    );

    if error > TOLERANCE {
        bail!("solution error {error:.3e} exceeds tolerance {TOLERANCE:.0e}");
    }
    Ok(())
}

/// Probes an idle simulated accelerator and prints the status word.
pub fn run_probe(sim: SimAccelerator) -> Result<()> {
    let mut channel = CommandChannel::new(sim);
    let status = channel.probe();
    println!("Status: {:#x}", status);
    if status != 0 {
        bail!("accelerator not idle");
    }
    Ok(())
}
