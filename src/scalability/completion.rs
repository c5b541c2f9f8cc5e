// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Submission decisions and frame completion bookkeeping.

use log::trace;

use crate::backend::BufferIndex;
use crate::backend::CommandStream;
use crate::backend::HwRegister;
use crate::scalability::phase::Phase;
use crate::scalability::phase::PhaseContext;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::scalability::ScalabilityMode;

/// Highest number of pipes whose engine id fits in a status report record.
pub const MAX_REPORTED_PIPES: u8 = 4;

/// Hint attached to a submission telling the kernel how to schedule its command buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubmissionKind {
    /// One command buffer on one engine.
    SinglePipe,
    /// Command buffers to run in parallel on several engines.
    Scalable,
}

/// Whether the command buffer of `ctx.current` completes a submission.
///
/// Phases that do not complete one are batched with the following phases.
pub fn should_submit_command_buffer(
    ctx: &PhaseContext,
    fe_separate_submission: bool,
    phased_submission: bool,
) -> bool {
    match (ctx.mode, ctx.current) {
        (ScalabilityMode::SinglePipe, Phase::Legacy) => true,
        (ScalabilityMode::VirtualTile, Phase::FrontEnd) => fe_separate_submission,
        (ScalabilityMode::VirtualTile, phase @ Phase::BackEnd(_)) => {
            phase.is_final_back_end(ctx.pipe_num)
        }
        (ScalabilityMode::RealTile, Phase::RealTile { phase, pipe }) => match ctx.real_tile {
            Some(layout) if phased_submission => layout.is_last_pass_of_phase(phase, pipe),
            Some(layout) => layout.is_last_pass(phase, pipe),
            None => false,
        },
        _ => false,
    }
}

/// Returns the submission hint for the command buffer of `ctx.current`.
pub fn submission_kind(ctx: &PhaseContext, fe_separate_submission: bool) -> SubmissionKind {
    if ctx.mode == ScalabilityMode::SinglePipe
        || (fe_separate_submission && ctx.current.is_front_end_adjacent())
    {
        SubmissionKind::SinglePipe
    } else {
        SubmissionKind::Scalable
    }
}

/// Layout of the decode status report buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusReportLayout {
    /// Size of the record of one frame, in bytes.
    pub record_size: usize,
    /// Offset within a record of the engine id of pipe 0. The ids of the other pipes follow.
    pub engine_id_offset: usize,
    /// Number of records. Report indices wrap around.
    pub record_count: u32,
}

impl Default for StatusReportLayout {
    fn default() -> Self {
        Self {
            record_size: 64,
            engine_id_offset: 16,
            record_count: 32,
        }
    }
}

impl StatusReportLayout {
    pub fn validate(&self) -> Result<()> {
        let ids_end = self.engine_id_offset.checked_add(4 * usize::from(MAX_REPORTED_PIPES));

        if self.record_count == 0 || !matches!(ids_end, Some(end) if end <= self.record_size) {
            return Err(ScalabilityError::InvalidParameter(format!(
                "invalid status report layout {:?}",
                self
            )));
        }

        self.buffer_size()?;

        Ok(())
    }

    pub fn buffer_size(&self) -> Result<usize> {
        usize::try_from(self.record_count)
            .ok()
            .and_then(|count| self.record_size.checked_mul(count))
            .ok_or_else(|| {
                ScalabilityError::InvalidParameter(format!(
                    "status report layout {:?} does not fit in memory",
                    self
                ))
            })
    }

    /// Offset of the engine id of `pipe` for the frame reported at `report_index`.
    pub fn engine_id_offset(&self, report_index: u32, pipe: u8) -> usize {
        (report_index % self.record_count) as usize * self.record_size
            + self.engine_id_offset
            + 4 * usize::from(pipe)
    }
}

/// Stores the id of the engine running `phase` into the status report of the frame.
///
/// Phases that run before the picture is split are not tied to a pipe and record nothing. Only
/// the first [`MAX_REPORTED_PIPES`] pipes have room in a record; the others record nothing either.
pub fn record_engine_id<C: CommandStream>(
    cmd: &mut C,
    status_report: &C::Buffer,
    layout: &StatusReportLayout,
    report_index: u32,
    phase: Phase,
) -> Result<()> {
    let pipe = match phase.pipe() {
        Some(pipe) => pipe,
        None => return Ok(()),
    };

    if pipe >= MAX_REPORTED_PIPES {
        trace!("no room to report the engine of pipe {}", pipe);
        return Ok(());
    }

    cmd.store_register(
        status_report,
        layout.engine_id_offset(report_index, pipe),
        HwRegister::CsEngineId,
    )?;

    Ok(())
}

/// Everything needed to report the status of a frame once it is decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCompletion {
    pub status_report_index: u32,
    /// Pipe responsible for the frame status.
    pub final_pipe: u8,
    /// Command buffer of the final pipe, the one to attach the completion fence to.
    pub final_buffer: BufferIndex,
    pub pipe_num: u8,
}

/// Keeps track of the pipes that emitted their completion signal during a frame.
#[derive(Clone, Debug, Default)]
pub struct CompletionTracker {
    signaled: Vec<bool>,
    final_pipe: Option<(u8, BufferIndex)>,
    status_report_index: u32,
    pipe_num: u8,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Prepares the tracker for a frame decoded by `pipe_num` pipes.
    pub fn reset(&mut self, pipe_num: u8, status_report_index: u32) {
        self.signaled.clear();
        self.signaled.resize(usize::from(pipe_num), false);
        self.final_pipe = None;
        self.status_report_index = status_report_index;
        self.pipe_num = pipe_num;
    }

    /// Records that `pipe` emitted its completion signal into `buffer`.
    pub fn note_pipe_done(&mut self, pipe: u8, buffer: BufferIndex, is_final: bool) -> Result<()> {
        let signaled = self.signaled.get_mut(usize::from(pipe)).ok_or_else(|| {
            ScalabilityError::InvalidParameter(format!("no pipe {} in this frame", pipe))
        })?;

        if *signaled {
            return Err(ScalabilityError::InvalidParameter(format!(
                "pipe {} completed twice",
                pipe
            )));
        }

        if is_final {
            if let Some((other, _)) = self.final_pipe {
                return Err(ScalabilityError::InvalidParameter(format!(
                    "pipe {} cannot be final, pipe {} already is",
                    pipe, other
                )));
            }
            self.final_pipe = Some((pipe, buffer));
        }

        *signaled = true;

        Ok(())
    }

    /// Number of pipes that have not signaled their completion yet.
    pub fn pending_pipes(&self) -> usize {
        self.signaled.iter().filter(|signaled| !**signaled).count()
    }

    /// Returns the completion of the frame, once every pipe has signaled.
    pub fn frame_completion(&self) -> Option<FrameCompletion> {
        if self.signaled.is_empty() || self.pending_pipes() > 0 {
            return None;
        }

        self.final_pipe.map(|(final_pipe, final_buffer)| FrameCompletion {
            status_report_index: self.status_report_index,
            final_pipe,
            final_buffer,
            pipe_num: self.pipe_num,
        })
    }
}
