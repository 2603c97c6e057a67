//! Channel against an accelerator that runs on its own thread.
//!
//! The worker reads the descriptor by address and writes the solution from
//! another OS thread, then publishes the status word with `Release`. The
//! host observes it with `Acquire` in `check_status`, so any result it reads
//! after completion must be the worker's.

mod common;

use common::{MAX_N, assert_close, random_spd_system};
use ldlt_common::descriptor::Descriptor;
use ldlt_common::status::{STATUS_BUSY, STATUS_IDLE};
use ldlt_core::LdltError;
use ldlt_core::accelerator::Accelerator;
use ldlt_core::channel::{ChannelConfig, ChannelState, CommandChannel};
use ldlt_core::descriptor::{Aligned, CommandDescriptor};
use ldlt_core::ldlt;
use ldlt_core::sim::FAULT_ZERO_PIVOT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

struct ThreadedAccelerator {
    status: Arc<AtomicU64>,
    jobs: Option<Sender<usize>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedAccelerator {
    fn spawn() -> Self {
        Self::with_gate(None)
    }

    /// Worker waits for a message on the returned sender before each job.
    fn gated() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self::with_gate(Some(rx)), tx)
    }

    fn with_gate(gate: Option<Receiver<()>>) -> Self {
        let status = Arc::new(AtomicU64::new(STATUS_IDLE));
        let (jobs, rx) = mpsc::channel::<usize>();
        let published = Arc::clone(&status);

        let worker = thread::spawn(move || {
            for addr in rx {
                if let Some(gate) = &gate {
                    let _ = gate.recv();
                }
                thread::yield_now();

                let desc = unsafe { (addr as *const Descriptor).read_volatile() };
                let rows = desc.rows as usize;
                let cols = desc.cols as usize;
                let (a, b) = unsafe {
                    (
                        std::slice::from_raw_parts_mut(desc.matrix_addr as *mut f64, rows * cols),
                        std::slice::from_raw_parts_mut(desc.vector_addr as *mut f64, rows),
                    )
                };
                let status = match ldlt::solve_in_place(a, b, rows, cols) {
                    Ok(()) => STATUS_IDLE,
                    Err(_) => FAULT_ZERO_PIVOT,
                };
                published.store(status, Ordering::Release);
            }
        });

        Self {
            status,
            jobs: Some(jobs),
            worker: Some(worker),
        }
    }
}

impl Accelerator for ThreadedAccelerator {
    unsafe fn submit(&mut self, descriptor: *const Descriptor) -> u64 {
        self.status.store(STATUS_BUSY, Ordering::SeqCst);
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(descriptor as usize);
        }
        STATUS_BUSY
    }

    fn check_status(&mut self) -> u64 {
        self.status.load(Ordering::Acquire)
    }
}

impl Drop for ThreadedAccelerator {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn patient() -> ChannelConfig {
    ChannelConfig::default().with_max_polls(u32::MAX)
}

#[test]
fn identity_solve_across_threads() {
    let mut a = Aligned([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);
    let mut b = Aligned([1.0, 2.0, 3.0, 4.0]);
    let mut channel = CommandChannel::with_config(ThreadedAccelerator::spawn(), patient());

    assert_eq!(channel.probe(), STATUS_IDLE);
    channel.solve(&mut a.0, &mut b.0, 4, 4).unwrap();
    assert_eq!(b.0, [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn random_spd_systems_across_threads() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut channel = CommandChannel::with_config(ThreadedAccelerator::spawn(), patient());

    for _ in 0..200 {
        let n = rng.gen_range(1..=MAX_N);
        let mut a = Aligned([0.0f64; MAX_N * MAX_N]);
        let mut b = Aligned([0.0f64; MAX_N]);
        let mut x = [0.0f64; MAX_N];
        random_spd_system(&mut rng, n, &mut a.0, &mut x, &mut b.0);

        channel.solve(&mut a.0[..n * n], &mut b.0[..n], n, n).unwrap();
        assert_close(&b.0[..n], &x[..n], 1e-8);
        assert_eq!(channel.state(), ChannelState::Done);
    }
}

#[test]
fn stalled_worker_times_out_then_drains() {
    let (accel, gate) = ThreadedAccelerator::gated();
    let config = ChannelConfig::default().with_max_polls(10_000);
    let mut channel = CommandChannel::with_config(accel, config);

    let mut a = Aligned([2.0f64, 0.0, 0.0, 4.0]);
    let mut b = Aligned([2.0f64, 2.0]);
    let desc = CommandDescriptor::encode(&mut a.0, &mut b.0, 2, 2).unwrap();

    unsafe { channel.submit(&desc) }.unwrap();
    assert_eq!(
        channel.await_completion(),
        Err(LdltError::AcceleratorTimeout { polls: 10_000 })
    );
    assert_eq!(unsafe { channel.submit(&desc) }, Err(LdltError::ChannelBusy));

    gate.send(()).unwrap();
    let done = loop {
        match channel.await_completion() {
            Ok(done) => break done,
            Err(LdltError::AcceleratorTimeout { .. }) => continue,
            Err(e) => panic!("unexpected error: {e}"),
        }
    };
    assert!(done.polls > 10_000);
    assert_eq!(b.0, [1.0, 0.5]);
}

#[test]
fn worker_fault_surfaces_with_threshold() {
    let config = patient().with_fault_threshold(ldlt_common::status::FAULT_BASE);
    let mut channel = CommandChannel::with_config(ThreadedAccelerator::spawn(), config);
    let mut a = Aligned([0.0f64; 4]);
    let mut b = Aligned([1.0f64; 2]);
    assert_eq!(
        channel.solve(&mut a.0, &mut b.0, 2, 2),
        Err(LdltError::AcceleratorFault(FAULT_ZERO_PIVOT))
    );
}
