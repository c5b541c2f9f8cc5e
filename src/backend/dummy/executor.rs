// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A simple model of engines executing command streams in parallel.
//!
//! Streams advance in lockstep: at every step, each running stream executes at most one command,
//! in round-robin order. A stream blocked on a wait does not advance until the awaited value
//! shows up in memory.

use anyhow::anyhow;
use log::trace;

use crate::backend::dummy::Buffer;
use crate::backend::dummy::Command;
use crate::backend::AtomicOp;

const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    Running,
    /// All commands have been executed.
    Completed,
    /// Ended early by a conditional end.
    Terminated,
    /// Blocked on a wait that can never be satisfied, or still running when the step limit was
    /// reached.
    Stalled,
}

/// Outcome of [`Executor::run`].
#[derive(Debug)]
pub struct ExecutionReport {
    /// Final state of each stream.
    pub states: Vec<StreamState>,
    pub steps: usize,
    /// Number of waits reached while the watchdog was armed.
    pub armed_waits: usize,
    /// Work executed, in execution order, along with the index of the executing stream.
    pub work_done: Vec<(usize, String)>,
}

impl ExecutionReport {
    pub fn all_completed(&self) -> bool {
        self.states.iter().all(|s| *s == StreamState::Completed)
    }

    pub fn is_deadlocked(&self) -> bool {
        self.states.iter().any(|s| *s == StreamState::Stalled)
    }
}

#[derive(Clone, Debug)]
pub struct Executor {
    max_steps: usize,
    start_delays: Vec<usize>,
    reported_streamout_size: u32,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

struct Stream {
    commands: Vec<Command>,
    pc: usize,
    state: StreamState,
    watchdog_armed: bool,
    /// Whether the wait at `pc` has already been attempted.
    waiting: bool,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            start_delays: vec![],
            reported_streamout_size: 0,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Delays the start of stream `i` by `delays[i]` steps.
    pub fn with_start_delays(mut self, delays: Vec<usize>) -> Self {
        self.start_delays = delays;
        self
    }

    /// Size the engines report having written to the CABAC streamout buffer.
    pub fn with_reported_streamout_size(mut self, size: u32) -> Self {
        self.reported_streamout_size = size;
        self
    }

    fn start_delay(&self, stream: usize) -> usize {
        self.start_delays.get(stream).copied().unwrap_or(0)
    }

    /// Runs `streams` until they all completed, terminated or stalled.
    ///
    /// Fails if a command accesses memory out of the bounds of its buffer.
    pub fn run(&self, streams: Vec<Vec<Command>>) -> anyhow::Result<ExecutionReport> {
        let mut streams: Vec<Stream> = streams
            .into_iter()
            .map(|commands| Stream {
                commands,
                pc: 0,
                state: StreamState::Running,
                watchdog_armed: false,
                waiting: false,
            })
            .collect();

        let mut report = ExecutionReport {
            states: vec![],
            steps: 0,
            armed_waits: 0,
            work_done: vec![],
        };

        while streams.iter().any(|s| s.state == StreamState::Running) {
            if report.steps == self.max_steps {
                for stream in streams.iter_mut().filter(|s| s.state == StreamState::Running) {
                    stream.state = StreamState::Stalled;
                }
                break;
            }

            let mut progressed = false;
            let mut delayed = false;

            for (index, stream) in streams.iter_mut().enumerate() {
                if stream.state != StreamState::Running {
                    continue;
                }

                if report.steps < self.start_delay(index) {
                    delayed = true;
                    continue;
                }

                progressed |= self.step(index, stream, &mut report)?;
            }

            report.steps += 1;

            if !progressed && !delayed {
                trace!("no stream can progress after {} steps", report.steps);
                for stream in streams.iter_mut().filter(|s| s.state == StreamState::Running) {
                    stream.state = StreamState::Stalled;
                }
            }
        }

        report.states = streams.iter().map(|s| s.state).collect();

        Ok(report)
    }

    /// Executes the next command of `stream`. Returns whether the stream progressed.
    fn step(
        &self,
        index: usize,
        stream: &mut Stream,
        report: &mut ExecutionReport,
    ) -> anyhow::Result<bool> {
        let Some(command) = stream.commands.get(stream.pc) else {
            stream.state = StreamState::Completed;
            return Ok(true);
        };

        match command {
            Command::WatchdogStart => stream.watchdog_armed = true,
            Command::WatchdogStop => stream.watchdog_armed = false,
            Command::Atomic { target, op } => {
                let value = read(target, 0)?;
                let value = match op {
                    AtomicOp::Increment => value.wrapping_add(1),
                    AtomicOp::Decrement => value.wrapping_sub(1),
                };
                write(target, 0, value)?;
            }
            Command::WaitUntilEqual { target, value } => {
                if !stream.waiting {
                    stream.waiting = true;
                    if stream.watchdog_armed {
                        report.armed_waits += 1;
                    }
                }

                if read(target, 0)? != *value {
                    return Ok(false);
                }

                stream.waiting = false;
            }
            Command::StoreDword {
                target,
                offset,
                value,
            } => write(target, *offset, *value)?,
            Command::ConditionalEnd {
                target,
                offset,
                compare,
            } => {
                if read(target, *offset)? <= *compare {
                    trace!("stream {} ended by {:?}", index, target);
                    stream.state = StreamState::Terminated;
                    return Ok(true);
                }
            }
            // Streams have no physical engine, their index stands in for the engine id.
            Command::StoreRegister { target, offset, .. } => {
                write(target, *offset, index as u32)?
            }
            Command::StoreStreamoutOverflow {
                status,
                offset,
                allocated_size,
            } => {
                let flag = if self.reported_streamout_size < *allocated_size {
                    u32::MAX
                } else {
                    0
                };
                write(status, *offset, flag)?;
            }
            Command::Work(label) => report.work_done.push((index, label.clone())),
        }

        stream.pc += 1;
        if stream.pc == stream.commands.len() {
            stream.state = StreamState::Completed;
        }

        Ok(true)
    }
}

fn read(buffer: &Buffer, offset: usize) -> anyhow::Result<u32> {
    buffer
        .read_dword(offset)
        .ok_or_else(|| anyhow!("read out of bounds of {:?} at offset {}", buffer, offset))
}

fn write(buffer: &Buffer, offset: usize, value: u32) -> anyhow::Result<()> {
    buffer
        .write_dword(offset, value)
        .ok_or_else(|| anyhow!("write out of bounds of {:?} at offset {}", buffer, offset))
}
