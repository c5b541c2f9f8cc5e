// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Routing of phases to command buffers and execution contexts.

use log::debug;

use crate::backend::BufferIndex;
use crate::backend::ContextId;
use crate::backend::ScalabilityBackend;
use crate::scalability::partition::RealTileLayout;
use crate::scalability::phase::Phase;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;

/// Returns the command buffer `phase` is written into.
///
/// With separate front-end submission the front end goes into the primary buffer, which is
/// submitted on its own, and back end `k` into secondary buffer `k`. Otherwise secondary buffer 0
/// is reserved for the front end and back end `k` goes into secondary buffer `k + 1`.
pub fn buffer_index_for(phase: Phase, fe_separate_submission: bool) -> Result<BufferIndex> {
    let index = match phase {
        Phase::Init | Phase::Legacy => BufferIndex::Primary,
        Phase::ShortFormatConvert | Phase::FrontEnd => {
            if fe_separate_submission {
                BufferIndex::Primary
            } else {
                BufferIndex::Secondary(0)
            }
        }
        Phase::BackEnd(k) => {
            if fe_separate_submission {
                BufferIndex::Secondary(k)
            } else {
                BufferIndex::Secondary(k.checked_add(1).ok_or_else(|| {
                    ScalabilityError::InvalidParameter(format!("back end {} out of range", k))
                })?)
            }
        }
        Phase::RealTile { pipe, .. } => BufferIndex::Secondary(pipe),
    };

    Ok(index)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipeRole {
    /// Not part of a multi-pipe submission.
    Alone,
    /// First pipe of a multi-pipe submission.
    Master,
    /// Any other pipe of a multi-pipe submission, ranked from 0.
    Slave(u8),
}

/// How a command buffer takes part in its submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubmissionRole {
    pub kind: PipeRole,
    /// Whether this is the last pipe of the submission.
    pub is_last_pipe: bool,
}

/// Returns the submission role of the command buffer of `phase`.
pub fn submission_role_for(
    phase: Phase,
    pipe_num: u8,
    real_tile: Option<&RealTileLayout>,
) -> SubmissionRole {
    let (pipe, pipes_in_submission) = match phase {
        Phase::Init | Phase::ShortFormatConvert | Phase::FrontEnd | Phase::Legacy => {
            return SubmissionRole {
                kind: PipeRole::Alone,
                is_last_pipe: false,
            }
        }
        Phase::BackEnd(k) => (k, pipe_num),
        Phase::RealTile { phase, pipe } => (
            pipe,
            real_tile
                .map(|layout| layout.pipes_in_phase(phase))
                .unwrap_or(pipe_num),
        ),
    };

    SubmissionRole {
        kind: match pipe {
            0 => PipeRole::Master,
            rank => PipeRole::Slave(rank - 1),
        },
        is_last_pipe: u16::from(pipe) + 1 == u16::from(pipes_in_submission),
    }
}

/// Returns the number of parallel rings needed to decode with `pipe_num` pipes.
///
/// The front end gets a ring of its own when it runs in the same submission as three back ends
/// or more. With two pipes it shares the ring of back end 0.
pub fn ring_count_for(
    pipe_num: u8,
    fe_separate_submission: bool,
    real_tile: bool,
    num_vdbox: u8,
) -> Result<u8> {
    let ring_count = match pipe_num {
        0 => {
            return Err(ScalabilityError::InvalidParameter(
                "cannot decode with 0 pipes".into(),
            ))
        }
        1 | 2 => pipe_num,
        n if fe_separate_submission || real_tile => n,
        n => n.saturating_add(1),
    };

    if ring_count > num_vdbox {
        return Err(ScalabilityError::InvalidParameter(format!(
            "{} pipes need {} rings but only {} engines are available",
            pipe_num, ring_count, num_vdbox
        )));
    }

    Ok(ring_count)
}

/// Returns the context to use for `ring_count` parallel rings.
pub fn context_for_ring_count(ring_count: u8) -> ContextId {
    match ring_count {
        0 | 1 => ContextId::Video,
        2 => ContextId::VideoMultiPipe,
        _ => ContextId::VideoTriplePipe,
    }
}

/// Keeps track of the video execution context and recreates it when the ring count changes.
#[derive(Debug, Default)]
pub struct ExecutionContextManager {
    bound: Option<(ContextId, u8)>,
}

impl ExecutionContextManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Currently bound context and its ring count.
    pub fn bound(&self) -> Option<(ContextId, u8)> {
        self.bound
    }

    /// The context back ends and legacy decoding run on.
    pub fn video_context(&self) -> ContextId {
        self.bound
            .map(|(context, _)| context)
            .unwrap_or(ContextId::Video)
    }

    /// Makes sure the bound context has `ring_count` rings, creating a new one if needed.
    ///
    /// Returns the newly created context, or `None` if the current one could be kept.
    pub fn reconcile<B: ScalabilityBackend>(
        &mut self,
        backend: &mut B,
        ring_count: u8,
    ) -> Result<Option<ContextId>> {
        if ring_count == 0 || ring_count > backend.num_vdbox() {
            return Err(ScalabilityError::InvalidParameter(format!(
                "cannot create a context with {} rings on {} engines",
                ring_count,
                backend.num_vdbox()
            )));
        }

        if matches!(self.bound, Some((_, bound)) if bound == ring_count) {
            return Ok(None);
        }

        let context = context_for_ring_count(ring_count);
        debug!(
            "ring count changing from {:?} to {}, using {:?}",
            self.bound.map(|(_, rings)| rings),
            ring_count,
            context
        );

        backend.create_context(context, ring_count)?;
        backend.register_completion_notify(context)?;
        backend.set_context(context)?;
        self.bound = Some((context, ring_count));

        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::Backend;
    use crate::backend::dummy::Event;

    #[test]
    fn buffer_indices() {
        assert_eq!(buffer_index_for(Phase::Legacy, false).unwrap(), BufferIndex::Primary);
        assert_eq!(buffer_index_for(Phase::FrontEnd, false).unwrap(), BufferIndex::Secondary(0));
        assert_eq!(
            buffer_index_for(Phase::ShortFormatConvert, false).unwrap(),
            BufferIndex::Secondary(0)
        );
        assert_eq!(buffer_index_for(Phase::BackEnd(0), false).unwrap(), BufferIndex::Secondary(1));
        assert_eq!(buffer_index_for(Phase::BackEnd(2), false).unwrap(), BufferIndex::Secondary(3));

        assert_eq!(buffer_index_for(Phase::FrontEnd, true).unwrap(), BufferIndex::Primary);
        assert_eq!(buffer_index_for(Phase::BackEnd(0), true).unwrap(), BufferIndex::Secondary(0));
        assert_eq!(buffer_index_for(Phase::BackEnd(2), true).unwrap(), BufferIndex::Secondary(2));

        assert_eq!(
            buffer_index_for(Phase::RealTile { phase: 3, pipe: 1 }, false).unwrap(),
            BufferIndex::Secondary(1)
        );
        assert!(buffer_index_for(Phase::BackEnd(255), false).is_err());
        assert_eq!(BufferIndex::Secondary(2).plus_one(), 3);
    }

    #[test]
    fn buffer_index_is_stable_across_frame() {
        for fe_separate_submission in [false, true] {
            let indices: Vec<BufferIndex> = (0..4)
                .map(|k| buffer_index_for(Phase::BackEnd(k), fe_separate_submission).unwrap())
                .collect();

            for k in 0..4 {
                assert_eq!(
                    buffer_index_for(Phase::BackEnd(k), fe_separate_submission).unwrap(),
                    indices[usize::from(k)]
                );
            }

            // No two back ends share a buffer, and none shares the front end's.
            let fe = buffer_index_for(Phase::FrontEnd, fe_separate_submission).unwrap();
            for (i, index) in indices.iter().enumerate() {
                assert_ne!(*index, fe);
                assert!(!indices[i + 1..].contains(index));
            }
        }
    }

    #[test]
    fn roles() {
        let alone = SubmissionRole {
            kind: PipeRole::Alone,
            is_last_pipe: false,
        };
        assert_eq!(submission_role_for(Phase::FrontEnd, 3, None), alone);
        assert_eq!(submission_role_for(Phase::Legacy, 1, None), alone);

        assert_eq!(
            submission_role_for(Phase::BackEnd(0), 3, None),
            SubmissionRole {
                kind: PipeRole::Master,
                is_last_pipe: false
            }
        );
        assert_eq!(
            submission_role_for(Phase::BackEnd(1), 3, None),
            SubmissionRole {
                kind: PipeRole::Slave(0),
                is_last_pipe: false
            }
        );
        assert_eq!(
            submission_role_for(Phase::BackEnd(2), 3, None),
            SubmissionRole {
                kind: PipeRole::Slave(1),
                is_last_pipe: true
            }
        );

        let layout = RealTileLayout::new(3, 4).unwrap();
        assert!(submission_role_for(Phase::RealTile { phase: 0, pipe: 2 }, 3, Some(&layout))
            .is_last_pipe);
        assert_eq!(
            submission_role_for(Phase::RealTile { phase: 1, pipe: 0 }, 3, Some(&layout)),
            SubmissionRole {
                kind: PipeRole::Master,
                is_last_pipe: true
            }
        );
    }

    #[test]
    fn ring_counts() {
        assert_eq!(ring_count_for(1, false, false, 4).unwrap(), 1);
        assert_eq!(ring_count_for(2, false, false, 2).unwrap(), 2);
        assert_eq!(ring_count_for(3, true, false, 3).unwrap(), 3);
        assert_eq!(ring_count_for(3, false, true, 3).unwrap(), 3);
        assert_eq!(ring_count_for(3, false, false, 4).unwrap(), 4);

        assert!(matches!(
            ring_count_for(3, false, false, 3),
            Err(ScalabilityError::InvalidParameter(_))
        ));
        assert!(ring_count_for(3, true, false, 2).is_err());
        assert!(ring_count_for(0, true, false, 2).is_err());
    }

    #[test]
    fn context_recreated_only_on_change() {
        let mut backend = Backend::new(3);
        let mut manager = ExecutionContextManager::new();

        assert_eq!(manager.reconcile(&mut backend, 1).unwrap(), Some(ContextId::Video));
        assert_eq!(manager.reconcile(&mut backend, 1).unwrap(), None);
        assert_eq!(
            manager.reconcile(&mut backend, 2).unwrap(),
            Some(ContextId::VideoMultiPipe)
        );
        assert_eq!(manager.reconcile(&mut backend, 2).unwrap(), None);
        assert_eq!(
            manager.reconcile(&mut backend, 3).unwrap(),
            Some(ContextId::VideoTriplePipe)
        );
        assert_eq!(manager.video_context(), ContextId::VideoTriplePipe);

        let created = backend
            .events()
            .iter()
            .filter(|e| matches!(e, Event::ContextCreated { .. }))
            .count();
        let notified = backend
            .events()
            .iter()
            .filter(|e| matches!(e, Event::CompletionNotifyRegistered(_)))
            .count();
        assert_eq!(created, 3);
        assert_eq!(notified, 3);

        assert!(manager.reconcile(&mut backend, 4).is_err());
        assert_eq!(manager.bound(), Some((ContextId::VideoTriplePipe, 3)));
    }
}
