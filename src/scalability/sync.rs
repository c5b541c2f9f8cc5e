// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Synchronization of the pipes of a frame.
//!
//! Pipes synchronize through 32-bit counters in shared memory, manipulated by atomic commands
//! and polled by wait commands inside the command streams. Three counters are used:
//!
//! * the front-end handoff, incremented by the front end and consumed by back end 0,
//! * the start barrier, which all pipes reach before doing any work so that they start
//!   together,
//! * the completion counter, incremented by every pipe but the final one, which waits for all
//!   the others before reporting the frame status.
//!
//! Every wait is bracketed by a watchdog stop and restart, as a pipe may legitimately wait for
//! longer than the hang detection timeout.

use log::trace;

use crate::backend::AtomicOp;
use crate::backend::BackendResult;
use crate::backend::CommandStream;
use crate::backend::ContextId;
use crate::backend::ScalabilityBackend;
use crate::scalability::phase::Phase;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::scalability::ScalabilityMode;
use crate::scalability::ScalabilityState;

/// Value of the placeholder writes following the start barrier.
pub const DELAY_MARKER: u32 = 0xDE1A;

/// Shared counters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CounterId {
    BackEndStart,
    FrontEndHandoff,
    Completion,
}

/// How a counter gets back to zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Every participant takes back its own increment once released.
    SelfResetting,
    /// The final pipe takes back the increments of the other pipes.
    ResetByFinalPipe,
    /// Cleared at the start of every frame.
    ResetAtFrameStart,
}

/// A rendezvous on a shared counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub counter: CounterId,
    /// Value the waiting side waits for.
    pub expected: u32,
    pub reset_policy: ResetPolicy,
}

impl Barrier {
    /// Whether the counter is cleared by [`ScalabilityState::init_sync_resources`].
    pub fn needs_frame_reset(&self) -> bool {
        self.reset_policy != ResetPolicy::SelfResetting
    }
}

/// The barriers of a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncPrimitives {
    pub start: Barrier,
    pub fe_handoff: Barrier,
    pub completion: Barrier,
}

impl SyncPrimitives {
    pub fn new(pipe_num: u8) -> Self {
        Self {
            start: Barrier {
                counter: CounterId::BackEndStart,
                expected: u32::from(pipe_num),
                reset_policy: ResetPolicy::SelfResetting,
            },
            fe_handoff: Barrier {
                counter: CounterId::FrontEndHandoff,
                expected: 1,
                reset_policy: ResetPolicy::SelfResetting,
            },
            completion: Barrier {
                counter: CounterId::Completion,
                expected: u32::from(pipe_num.saturating_sub(1)),
                reset_policy: ResetPolicy::ResetByFinalPipe,
            },
        }
    }

    pub fn barriers(&self) -> [Barrier; 3] {
        [self.start, self.fe_handoff, self.completion]
    }
}

impl Default for SyncPrimitives {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Emits the start barrier: the stream stalls until `participants` streams reached it.
///
/// The placeholder writes following the wait give the other engines time to observe the counter
/// before it gets decremented again.
pub fn emit_start_barrier<C: CommandStream>(
    cmd: &mut C,
    counter: &C::Buffer,
    delay_scratch: &C::Buffer,
    participants: u32,
    num_delay: u32,
) -> BackendResult<()> {
    cmd.watchdog_stop()?;
    cmd.atomic(counter, AtomicOp::Increment)?;
    cmd.wait_until_equal(counter, participants)?;
    for _ in 0..num_delay {
        cmd.store_dword(delay_scratch, 0, DELAY_MARKER)?;
    }
    cmd.atomic(counter, AtomicOp::Decrement)?;
    cmd.watchdog_start()
}

/// Emits the front-end side of the handoff to back end 0.
pub fn emit_fe_handoff_signal<C: CommandStream>(
    cmd: &mut C,
    counter: &C::Buffer,
) -> BackendResult<()> {
    cmd.atomic(counter, AtomicOp::Increment)
}

/// Emits the back-end 0 side of the handoff: waits for the front end, then consumes its signal.
pub fn emit_fe_handoff_wait<C: CommandStream>(cmd: &mut C, counter: &C::Buffer) -> BackendResult<()> {
    cmd.watchdog_stop()?;
    cmd.wait_until_equal(counter, 1)?;
    cmd.atomic(counter, AtomicOp::Decrement)?;
    cmd.watchdog_start()
}

/// Emits the completion wait of the final pipe, which also takes back the increments of the
/// `others` other pipes.
pub fn emit_completion_wait<C: CommandStream>(
    cmd: &mut C,
    counter: &C::Buffer,
    others: u32,
) -> BackendResult<()> {
    cmd.watchdog_stop()?;
    cmd.wait_until_equal(counter, others)?;
    for _ in 0..others {
        cmd.atomic(counter, AtomicOp::Decrement)?;
    }
    cmd.watchdog_start()
}

pub fn emit_completion_signal<C: CommandStream>(
    cmd: &mut C,
    counter: &C::Buffer,
) -> BackendResult<()> {
    cmd.atomic(counter, AtomicOp::Increment)
}

pub fn emit_counter_reset<C: CommandStream>(cmd: &mut C, counter: &C::Buffer) -> BackendResult<()> {
    cmd.store_dword(counter, 0, 0)
}

impl<B: ScalabilityBackend> ScalabilityState<B> {
    /// Clears the counters of the frame that are not reset by their participants.
    ///
    /// Emitted into the first phase of scalable frames, before any pipe can reach a barrier.
    pub fn init_sync_resources(&mut self, cmd: &mut B::CommandBuffer) -> Result<()> {
        if self.mode == ScalabilityMode::SinglePipe {
            return Ok(());
        }

        for barrier in self.sync.barriers() {
            if barrier.needs_frame_reset() {
                emit_counter_reset(cmd, self.resources.counter(barrier.counter))?;
            }
        }

        self.sync_initialized = true;

        Ok(())
    }

    /// Emits the end of the front end: the streamout overflow flag, then the handoff to back
    /// end 0.
    pub fn signal_fe_done(&mut self, cmd: &mut B::CommandBuffer) -> Result<()> {
        if !self.phase.is_front_end() {
            return Err(ScalabilityError::InvalidParameter(format!(
                "cannot end the front end during {:?}",
                self.phase
            )));
        }

        let cabac = self.resources.cabac_streamout().ok_or_else(|| {
            ScalabilityError::InvalidParameter("no CABAC streamout buffer".into())
        })?;
        let allocated_size = u32::try_from(cabac.size).map_err(|_| {
            ScalabilityError::InvalidParameter(format!(
                "CABAC streamout buffer too large: {} bytes",
                cabac.size
            ))
        })?;
        cmd.store_streamout_overflow(self.resources.fe_status(), 0, allocated_size)?;

        if self.fe_separate_submission {
            let sync = self.resources.fe_be_sync().ok_or_else(|| {
                ScalabilityError::InvalidParameter("no front end sync object".into())
            })?;
            self.backend.engine_signal(ContextId::FrontEnd, sync)?;
        } else {
            emit_fe_handoff_signal(cmd, self.resources.counter(self.sync.fe_handoff.counter))?;
        }

        trace!("front end done, separate submission: {}", self.fe_separate_submission);

        Ok(())
    }

    /// Emits what a pipe runs before its own work: the wait for the front end in back end 0,
    /// then the start barrier.
    ///
    /// In virtual tile mode the back ends end their stream right after the barrier if the front
    /// end overflowed its streamout buffer.
    pub fn wait_and_start_back_ends(&mut self, cmd: &mut B::CommandBuffer) -> Result<()> {
        match self.phase {
            Phase::BackEnd(pipe) => {
                if pipe == 0 {
                    if self.fe_separate_submission {
                        let sync = self.resources.fe_be_sync().ok_or_else(|| {
                            ScalabilityError::InvalidParameter("no front end sync object".into())
                        })?;
                        self.backend.engine_wait(self.contexts.video_context(), sync)?;
                    } else {
                        emit_fe_handoff_wait(
                            cmd,
                            self.resources.counter(self.sync.fe_handoff.counter),
                        )?;
                    }
                }

                self.start_barrier(cmd, self.sync.start.expected)?;
                cmd.conditional_end(self.resources.fe_status(), 0, 0)?;
            }
            Phase::RealTile { phase, .. } if phase == 0 || self.config.phased_submission => {
                let participants = self
                    .real_tile
                    .map(|layout| layout.pipes_in_phase(phase))
                    .unwrap_or(self.pipe_num);
                self.start_barrier(cmd, u32::from(participants))?;
            }
            _ => (),
        }

        Ok(())
    }

    fn start_barrier(&self, cmd: &mut B::CommandBuffer, participants: u32) -> Result<()> {
        trace!("{:?}: start barrier of {} pipes", self.phase, participants);

        emit_start_barrier(
            cmd,
            self.resources.counter(self.sync.start.counter),
            self.resources.delay_scratch(),
            participants,
            self.config.num_delay,
        )?;

        Ok(())
    }

    /// Emits the completion protocol at the final pass of the current pipe.
    ///
    /// The final pipe waits for every other pipe, the other pipes signal it.
    pub fn signal_pipe_completion(&mut self, cmd: &mut B::CommandBuffer) -> Result<()> {
        let pipe = match self.phase.pipe() {
            Some(pipe) if self.is_pipe_final_pass() => pipe,
            _ => {
                return Err(ScalabilityError::InvalidParameter(format!(
                    "{:?} is not the final pass of a pipe",
                    self.phase
                )))
            }
        };
        let is_final = self.is_final_pipe();

        if self.mode != ScalabilityMode::SinglePipe {
            let counter = self.resources.counter(self.sync.completion.counter);

            if is_final {
                emit_completion_wait(cmd, counter, self.sync.completion.expected)?;
            } else {
                emit_completion_signal(cmd, counter)?;
            }
        }

        let buffer = self.buffer_index_for_phase(self.phase)?;
        self.completion.note_pipe_done(pipe, buffer, is_final)?;
        trace!("pipe {} done, final: {}", pipe, is_final);

        Ok(())
    }

    /// Whether the current phase is the last pass of the pipe responsible for the frame status.
    ///
    /// Exactly one phase per frame satisfies this.
    pub fn is_final_pipe(&self) -> bool {
        self.phase_context().is_final_phase(self.phase)
    }

    /// Whether the current phase is the last pass of its pipe.
    pub fn is_pipe_final_pass(&self) -> bool {
        match (self.mode, self.phase) {
            (ScalabilityMode::SinglePipe, Phase::Legacy) => true,
            (ScalabilityMode::VirtualTile, Phase::BackEnd(pipe)) => pipe < self.pipe_num,
            (ScalabilityMode::RealTile, Phase::RealTile { phase, pipe }) => self
                .real_tile
                .map(|layout| layout.last_phase_of_pipe(pipe) == phase)
                .unwrap_or(false),
            _ => false,
        }
    }
}
