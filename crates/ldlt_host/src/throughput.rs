use crate::generator::System;
use crate::solve::TOLERANCE;
use crate::stats::PollStats;
use anyhow::{Context, Result, bail};
use ldlt_core::channel::{ChannelConfig, CommandChannel};
use ldlt_core::sim::SimAccelerator;
use rayon::prelude::*;
use std::time::Instant;

/// Solves `systems` random SPD systems, each on its own simulated
/// accelerator and channel, in parallel.
///
/// Every command gets `latency` busy checks plus a per-system jitter in
/// `0..=jitter`. Any failed or inaccurate solve aborts the run.
pub fn run_benchmark(
    systems: usize,
    size: usize,
    latency: u32,
    jitter: u32,
    config: ChannelConfig,
) -> Result<()> {
    println!("Starting Benchmark (Parallel - Rayon)...");
    println!("Systems: {}, Size: {}x{}", systems, size, size);
    let start_bench = Instant::now();

    let polls: Vec<u32> = (0..systems as u64)
        .into_par_iter()
        .map(|seed| -> Result<u32> {
            let mut system = System::random_spd(size, seed)?;
            let n = system.n;
            let sim = SimAccelerator::new().with_latency(command_latency(seed, latency, jitter));
            let mut channel = CommandChannel::with_config(sim, config);

            let done = channel
                .solve(&mut system.matrix, &mut system.rhs, n, n)
                .with_context(|| format!("system {seed} failed"))?;
            let error = system.max_error();
            if error > TOLERANCE {
                bail!("system {seed}: error {error:.3e} exceeds tolerance");
            }
            Ok(done.polls)
        })
        .collect::<Result<_>>()?;

    let duration = start_bench.elapsed();
    let seconds = duration.as_secs_f64();
    let throughput = polls.len() as f64 / seconds;

    let mut stats = PollStats::new(bucket_width(latency, jitter));
    for &p in &polls {
        stats.update(p);
    }

    println!("Results");
    println!("Time: {:.4} s", seconds);
    println!("Throughput: {:.2} solves/s", throughput);
    println!("Solved: {}/{}", polls.len(), systems);
    stats.print_report();

    Ok(())
}

/// Busy checks the simulator reports for system `seed`.
fn command_latency(seed: u64, latency: u32, jitter: u32) -> u32 {
    let extra = (seed % (u64::from(jitter) + 1)) as u32;
    latency.saturating_add(extra)
}

/// Histogram bucket width spreading the expected poll range over 8 buckets.
fn bucket_width(latency: u32, jitter: u32) -> u32 {
    latency.saturating_add(jitter).div_ceil(8).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldlt_core::LdltError;

    #[test]
    fn jitter_stays_within_range() {
        for seed in 0..32 {
            let l = command_latency(seed, 10, 3);
            assert!((10..=13).contains(&l));
        }
        assert_eq!(command_latency(7, 10, 0), 10);
    }

    #[test]
    fn extreme_latency_saturates() {
        assert_eq!(command_latency(5, u32::MAX, u32::MAX), u32::MAX);
        assert_eq!(bucket_width(u32::MAX, u32::MAX), u32::MAX.div_ceil(8));
        assert_eq!(bucket_width(0, 0), 1);
    }

    #[test]
    fn extreme_latency_run_times_out() {
        let config = ChannelConfig::default().with_max_polls(8);
        let err = run_benchmark(2, 2, u32::MAX, u32::MAX, config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LdltError>(),
            Some(&LdltError::AcceleratorTimeout { polls: 8 })
        );
    }

    #[test]
    fn small_benchmark_succeeds() {
        run_benchmark(8, 3, 2, 2, ChannelConfig::default()).unwrap();
    }
}
