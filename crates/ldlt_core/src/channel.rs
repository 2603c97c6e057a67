//! Command/status channel for the LDLT accelerator.
//!
//! One channel owns one accelerator handle and tracks at most one command.
//! The exchange for a solve is:
//!
//! 1. optional probe, refusing to submit if the unit is not idle;
//! 2. fence, so the descriptor and buffers are visible to the accelerator;
//! 3. solve request with the descriptor address;
//! 4. status checks until the word reads zero, bounded by `max_polls`;
//! 5. fence, so host reads observe the accelerator's writes.
//!
//! Steps 2 and 5 live inside `submit` and `await_completion`, so callers
//! using the low-level primitives get the same ordering as `solve`. Every
//! path that retires a command, faults included, ends with a fence.

use crate::LdltError;
use crate::accelerator::Accelerator;
use crate::descriptor::CommandDescriptor;
use ldlt_common::status::STATUS_IDLE;
use tracing::{debug, trace, warn};

/// Default bound on status checks per `await_completion` call.
pub const DEFAULT_MAX_POLLS: u32 = 1_000_000;

/// Channel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Status checks issued by one `await_completion` call before it gives
    /// up with `AcceleratorTimeout`.
    pub max_polls: u32,

    /// Status values at or above this threshold are faults instead of
    /// "busy". `None` treats every nonzero value as busy.
    pub fault_threshold: Option<u64>,

    /// Probe the accelerator before each `solve` and refuse to submit if it
    /// is not idle.
    pub probe_before_submit: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            fault_threshold: None,
            probe_before_submit: true,
        }
    }
}

impl ChannelConfig {
    /// Sets the bound on status checks per `await_completion` call.
    ///
    /// # Arguments
    ///
    /// * `max_polls` - Checks issued before reporting `AcceleratorTimeout`.
    ///   Zero makes every wait time out without touching the accelerator.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Treats status words at or above `threshold` as fault codes.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Lowest fault code. `FAULT_BASE` is the conventional
    ///   choice.
    pub fn with_fault_threshold(mut self, threshold: u64) -> Self {
        self.fault_threshold = Some(threshold);
        self
    }

    /// Enables or disables the idle check issued before each `solve`.
    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe_before_submit = probe;
        self
    }

    /// Interprets a status word under this configuration.
    pub fn classify(&self, status: u64) -> StatusClass {
        match self.fault_threshold {
            _ if status == STATUS_IDLE => StatusClass::Idle,
            Some(threshold) if status >= threshold => StatusClass::Fault(status),
            _ => StatusClass::Busy(status),
        }
    }
}

/// Meaning of a status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Zero: idle, or the outstanding command completed.
    Idle,

    /// Nonzero and below the fault threshold: still working.
    Busy(u64),

    /// At or above the configured fault threshold.
    Fault(u64),
}

/// Lifecycle of the command tracked by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Nothing submitted yet, or the last command faulted.
    Idle,
    /// Solve request issued, no status check yet.
    Submitted,
    /// At least one status check returned busy.
    Busy,
    /// The last command completed; buffers belong to the host again.
    Done,
    /// A `solve` timed out and returned its buffers to the caller while the
    /// command was still running. The channel issues no further
    /// instructions and refuses every operation.
    Abandoned,
}

impl ChannelState {
    /// True while the accelerator may still access the command's buffers.
    pub fn is_outstanding(self) -> bool {
        matches!(
            self,
            ChannelState::Submitted | ChannelState::Busy | ChannelState::Abandoned
        )
    }
}

/// Summary of a completed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    /// Status word returned by the solve request itself.
    pub initial_status: u64,

    /// Status checks issued after submission, the final zero included.
    pub polls: u32,
}

/// Blocking, one-command-at-a-time channel to an accelerator.
pub struct CommandChannel<A: Accelerator> {
    accel: A,
    config: ChannelConfig,
    state: ChannelState,
    last: Completion,
    fault: Option<u64>,
}

impl<A: Accelerator> CommandChannel<A> {
    /// Creates a channel with the default configuration.
    pub fn new(accel: A) -> Self {
        Self::with_config(accel, ChannelConfig::default())
    }

    /// Creates an idle channel over `accel`.
    ///
    /// # Arguments
    ///
    /// * `accel` - Accelerator handle. The channel assumes it is the only
    ///   issuer of requests to the unit.
    /// * `config` - Polling bound, fault threshold, and probe policy.
    pub fn with_config(accel: A, config: ChannelConfig) -> Self {
        Self {
            accel,
            config,
            state: ChannelState::Idle,
            last: Completion::default(),
            fault: None,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Shared access to the accelerator, e.g. to inspect a simulator.
    pub fn accelerator(&self) -> &A {
        &self.accel
    }

    /// Exclusive access to the accelerator.
    ///
    /// Requests issued through this handle bypass the channel's state
    /// tracking.
    pub fn accelerator_mut(&mut self) -> &mut A {
        &mut self.accel
    }

    /// Returns the accelerator handle.
    ///
    /// Fails with `ChannelBusy` while a command is outstanding, since the
    /// channel is the only thing tracking it.
    pub fn into_inner(self) -> Result<A, LdltError> {
        if self.state.is_outstanding() {
            return Err(LdltError::ChannelBusy);
        }
        Ok(self.accel)
    }

    /// Issues a status check without a command and returns the raw status.
    ///
    /// Does not change the channel state.
    pub fn probe(&mut self) -> u64 {
        let status = self.accel.check_status();
        trace!(status, "probe");
        status
    }

    /// Fences and issues a solve request for `descriptor`.
    ///
    /// Returns the initial status word. The command is then outstanding
    /// until `await_completion` observes zero or a fault.
    ///
    /// # Errors
    ///
    /// `ChannelBusy` if a command is already outstanding, in which case no
    /// instruction is issued. `AcceleratorFault` if the initial status is in
    /// the fault range; the command is then not outstanding.
    ///
    /// # Safety
    ///
    /// `descriptor` and the buffers it borrows must not be moved, dropped,
    /// or accessed until `await_completion` returns `Ok` or
    /// `AcceleratorFault`.
    pub unsafe fn submit(&mut self, descriptor: &CommandDescriptor<'_>) -> Result<u64, LdltError> {
        if self.state.is_outstanding() {
            warn!(state = ?self.state, "submit rejected: command outstanding");
            return Err(LdltError::ChannelBusy);
        }

        self.accel.fence();
        let status = unsafe { self.accel.submit(descriptor.as_ptr()) };
        trace!(
            descriptor = descriptor.as_ptr() as usize,
            rows = descriptor.rows(),
            cols = descriptor.cols(),
            status,
            "submit"
        );

        self.last = Completion {
            initial_status: status,
            polls: 0,
        };
        self.fault = None;
        if let StatusClass::Fault(code) = self.config.classify(status) {
            self.accel.fence();
            self.retire_faulted(code);
            warn!(code, "accelerator refused command");
            return Err(LdltError::AcceleratorFault(code));
        }
        self.state = ChannelState::Submitted;
        Ok(status)
    }

    /// Issues one status check for the outstanding command.
    ///
    /// Returns `Some` once the command completed. With nothing outstanding
    /// this reports the previous command's outcome without touching the
    /// accelerator.
    ///
    /// # Errors
    ///
    /// `AcceleratorFault` if this check, or the previous command, faulted.
    /// `AcceleratorTimeout` without issuing a check once the channel is
    /// `Abandoned`.
    pub fn poll(&mut self) -> Result<Option<Completion>, LdltError> {
        if self.state == ChannelState::Abandoned {
            return Err(LdltError::AcceleratorTimeout {
                polls: self.last.polls,
            });
        }
        if !self.state.is_outstanding() {
            return self.retired().map(Some);
        }

        let status = self.accel.check_status();
        self.last.polls = self.last.polls.saturating_add(1);
        trace!(status, polls = self.last.polls, "status check");

        match self.config.classify(status) {
            StatusClass::Busy(_) => {
                self.state = ChannelState::Busy;
                Ok(None)
            }
            StatusClass::Idle => {
                self.accel.fence();
                self.state = ChannelState::Done;
                debug!(polls = self.last.polls, "command complete");
                Ok(Some(self.last))
            }
            StatusClass::Fault(code) => {
                self.accel.fence();
                self.retire_faulted(code);
                warn!(code, polls = self.last.polls, "accelerator fault");
                Err(LdltError::AcceleratorFault(code))
            }
        }
    }

    /// Spins on status checks until the outstanding command completes.
    ///
    /// # Errors
    ///
    /// `AcceleratorTimeout` after `max_polls` busy checks in this call. A
    /// command started with `submit` stays outstanding and a later call may
    /// still drain it; an `Abandoned` channel never issues another check.
    /// `AcceleratorFault` if the status enters the fault range.
    pub fn await_completion(&mut self) -> Result<Completion, LdltError> {
        for _ in 0..self.config.max_polls {
            if let Some(done) = self.poll()? {
                return Ok(done);
            }
            core::hint::spin_loop();
        }
        if !self.state.is_outstanding() {
            return self.retired();
        }
        warn!(polls = self.last.polls, "accelerator timeout");
        Err(LdltError::AcceleratorTimeout {
            polls: self.last.polls,
        })
    }

    /// Solves `matrix * x = vector` on the accelerator, writing `x` into
    /// `vector`.
    ///
    /// Blocks until the accelerator reports completion. The accelerator may
    /// also overwrite `matrix` with its factors.
    ///
    /// # Arguments
    ///
    /// * `matrix` - Row-major `rows x cols` buffer, 16-byte aligned.
    /// * `vector` - Right-hand side of at least `rows` elements, 16-byte
    ///   aligned. Holds the solution on success.
    ///
    /// # Returns
    ///
    /// The initial status and the number of status checks it took.
    ///
    /// # Errors
    ///
    /// `InvalidDescriptor` for bad shapes or alignment; `ChannelBusy` if a
    /// command is outstanding or the probe finds the unit busy;
    /// `AcceleratorTimeout` and `AcceleratorFault` as for
    /// `await_completion`. A timeout leaves the channel `Abandoned`: the
    /// descriptor lived in this call's frame, so the command can no longer
    /// be waited on and the channel issues nothing further.
    pub fn solve(
        &mut self,
        matrix: &mut [f64],
        vector: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> Result<Completion, LdltError> {
        let descriptor = CommandDescriptor::encode(matrix, vector, rows, cols)?;
        if self.state.is_outstanding() {
            return Err(LdltError::ChannelBusy);
        }

        if self.config.probe_before_submit {
            let status = self.probe();
            match self.config.classify(status) {
                StatusClass::Idle => {}
                StatusClass::Busy(status) => {
                    warn!(status, "accelerator busy before submit");
                    return Err(LdltError::ChannelBusy);
                }
                StatusClass::Fault(code) => return Err(LdltError::AcceleratorFault(code)),
            }
        }

        // SAFETY: `descriptor` lives in this frame and holds the buffer
        // borrows until we return. Every return below follows completion or
        // a fault, except a timeout, which abandons the channel first so the
        // command is never checked against the dead frame.
        unsafe { self.submit(&descriptor)? };
        match self.await_completion() {
            Err(LdltError::AcceleratorTimeout { polls }) => {
                self.state = ChannelState::Abandoned;
                warn!(polls, "solve abandoned after timeout");
                Err(LdltError::AcceleratorTimeout { polls })
            }
            result => result,
        }
    }

    fn retire_faulted(&mut self, code: u64) {
        self.state = ChannelState::Idle;
        self.fault = Some(code);
    }

    /// Outcome of the last retired command.
    fn retired(&self) -> Result<Completion, LdltError> {
        match self.fault {
            Some(code) => Err(LdltError::AcceleratorFault(code)),
            None => Ok(self.last),
        }
    }
}
