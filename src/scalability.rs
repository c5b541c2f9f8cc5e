// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Multi-pipe decoding of a frame.
//!
//! [`ScalabilityState`] is created once per decode session. For each frame,
//! [`ScalabilityState::init_frame`] decides how many pipes to use and how to split the picture
//! between them. The driver then walks the phases of the frame with
//! [`ScalabilityState::advance_phase`] and programs each of them with
//! [`ScalabilityState::program_phase`], which emits the synchronization primitives the phase
//! needs around the decoding commands, and tells when the command buffers are ready to be
//! submitted.
//!
//! A frame is decoded in one of three modes:
//!
//! * single pipe: one legacy phase, on one engine.
//! * virtual tile: a front end parses the whole picture, then each pipe runs a back end over a
//!   column range chosen by [`partition::partition`].
//! * real tile: the picture has tile columns of its own, which are dealt to the pipes in as many
//!   phases as needed by [`partition::partition_real_tiles`].

pub mod completion;
pub mod partition;
pub mod phase;
pub mod pipe_num;
pub mod resources;
pub mod router;
pub mod sync;

use log::debug;
use log::trace;
use log::warn;
use thiserror::Error;

use crate::backend::BackendError;
use crate::backend::BufferIndex;
use crate::backend::CommandStream;
use crate::backend::ContextId;
use crate::backend::ScalabilityBackend;
use crate::scalability::completion::record_engine_id;
use crate::scalability::completion::CompletionTracker;
use crate::scalability::completion::FrameCompletion;
use crate::scalability::completion::StatusReportLayout;
use crate::scalability::completion::SubmissionKind;
use crate::scalability::partition::partition;
use crate::scalability::partition::partition_real_tiles;
use crate::scalability::partition::CodingGeometry;
use crate::scalability::partition::PipeAssignment;
use crate::scalability::partition::RealTileLayout;
use crate::scalability::partition::SplitPolicy;
use crate::scalability::partition::TileColumns;
use crate::scalability::phase::check_phase_validity;
use crate::scalability::phase::determine_next_phase;
use crate::scalability::phase::Phase;
use crate::scalability::phase::PhaseContext;
use crate::scalability::pipe_num::HwCapability;
use crate::scalability::pipe_num::PipeNumDecider;
use crate::scalability::pipe_num::PipeNumOverrides;
use crate::scalability::pipe_num::PipeNumParams;
use crate::scalability::pipe_num::RealTileCaps;
use crate::scalability::pipe_num::ResolutionThresholds;
use crate::scalability::pipe_num::ThresholdPipeNumDecider;
use crate::scalability::resources::BufferSizeParams;
use crate::scalability::resources::ScalabilityResources;
use crate::scalability::router::buffer_index_for;
use crate::scalability::router::ring_count_for;
use crate::scalability::router::submission_role_for;
use crate::scalability::router::ExecutionContextManager;
use crate::scalability::router::SubmissionRole;
use crate::scalability::sync::SyncPrimitives;
use crate::Codec;
use crate::SurfaceFormat;

/// Number of placeholder writes following the start barrier wait.
pub const DEFAULT_NUM_DELAY: u32 = 15;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScalabilityMode {
    #[default]
    SinglePipe,
    VirtualTile,
    RealTile,
}

#[derive(Error, Debug)]
pub enum ScalabilityError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("no transition from {from:?} in {mode:?} mode")]
    InvalidTransition { from: Phase, mode: ScalabilityMode },
    #[error("unsupported partition: {0}")]
    UnsupportedPartition(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ScalabilityError {
    /// Whether the error is caused by an invalid input or state. These errors are fatal to the
    /// frame being decoded.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(
            self,
            ScalabilityError::InvalidParameter(_) | ScalabilityError::InvalidTransition { .. }
        )
    }

    /// Whether the error reveals a bug in this crate rather than a problem with its inputs.
    pub fn is_logic_error(&self) -> bool {
        matches!(self, ScalabilityError::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScalabilityError>;

/// Session-wide configuration.
#[derive(Clone, Debug)]
pub struct ScalabilityConfig {
    /// Number of placeholder writes following the start barrier wait.
    pub num_delay: u32,
    /// Whether the front end is submitted on its own, before the back ends. Defaults to whether
    /// more than two engines are available. Never used in real tile mode.
    pub fe_separate_submission: Option<bool>,
    pub split_policy: SplitPolicy,
    /// Submit each real tile phase on its own instead of the whole frame at once.
    pub phased_submission: bool,
    pub enable_real_tile: bool,
    /// Allow real tile decoding of pictures with more tile columns than pipes.
    pub real_tile_multi_phase: bool,
    pub thresholds: ResolutionThresholds,
    pub overrides: PipeNumOverrides,
    pub status_layout: StatusReportLayout,
}

impl Default for ScalabilityConfig {
    fn default() -> Self {
        Self {
            num_delay: DEFAULT_NUM_DELAY,
            fe_separate_submission: None,
            split_policy: Default::default(),
            phased_submission: false,
            enable_real_tile: true,
            real_tile_multi_phase: true,
            thresholds: Default::default(),
            overrides: Default::default(),
            status_layout: Default::default(),
        }
    }
}

/// Tile structure of a picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileParams {
    pub columns: TileColumns,
    pub rows: u8,
}

/// Properties of the frame about to be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameParams {
    pub geometry: CodingGeometry,
    pub format: SurfaceFormat,
    /// Tile structure, if tiles are enabled.
    pub tiles: Option<TileParams>,
    /// Size of the compressed frame, in bytes.
    pub max_frame_size: usize,
    /// Whether post-decode scaling is used.
    pub using_sfc: bool,
    pub secure_decode: bool,
    /// Whether the slice data must be converted from short format first.
    pub short_format_in_use: bool,
    /// HEVC screen content coding extension in use. Only decoded with a single pipe.
    pub screen_content_coding: bool,
    /// Record of the status report buffer the frame reports into.
    pub status_report_index: u32,
}

impl FrameParams {
    pub fn new(geometry: CodingGeometry, format: SurfaceFormat) -> Self {
        Self {
            geometry,
            format,
            tiles: None,
            max_frame_size: 0,
            using_sfc: false,
            secure_decode: false,
            short_format_in_use: false,
            screen_content_coding: false,
            status_report_index: 0,
        }
    }
}

/// How a frame is going to be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSetup {
    pub mode: ScalabilityMode,
    pub pipe_num: u8,
    /// Number of phases to program, `Init` excluded.
    pub pass_count: u32,
    pub real_tile: Option<RealTileLayout>,
}

/// A command buffer checked out for a phase.
#[derive(Debug)]
pub struct CommandBufferSlot<C> {
    pub index: BufferIndex,
    pub buffer: C,
}

struct FramePlan {
    mode: ScalabilityMode,
    pipe_num: u8,
    real_tile: Option<RealTileLayout>,
    assignments: Vec<PipeAssignment>,
}

/// Highest number of virtual tile pipes whose rings fit in `num_vdbox` engines.
fn max_virtual_tile_pipes(num_vdbox: u8, fe_separate_submission: bool) -> u8 {
    if fe_separate_submission {
        num_vdbox
    } else if num_vdbox >= 4 {
        num_vdbox - 1
    } else {
        num_vdbox.min(2)
    }
}

/// Multi-pipe decoding state of a session.
pub struct ScalabilityState<B: ScalabilityBackend> {
    // Declared before the backend so it is dropped first.
    resources: ScalabilityResources<B>,
    backend: B,
    codec: Codec,
    config: ScalabilityConfig,
    decider: Box<dyn PipeNumDecider>,
    real_tile_caps: RealTileCaps,
    contexts: ExecutionContextManager,

    fe_separate_configured: bool,
    fe_separate_submission: bool,
    mode: ScalabilityMode,
    pipe_num: u8,
    ring_count: u8,
    phase: Phase,
    short_format_in_use: bool,
    real_tile: Option<RealTileLayout>,
    assignments: Vec<PipeAssignment>,
    sync: SyncPrimitives,
    sync_initialized: bool,
    completion: CompletionTracker,
    status_report_index: u32,
    /// Whether the last call to `init_frame` succeeded.
    frame_ready: bool,
}

impl<B: ScalabilityBackend> ScalabilityState<B> {
    /// Creates the state of a session decoding `codec` on `backend`.
    pub fn new(mut backend: B, codec: Codec, config: ScalabilityConfig) -> Result<Self> {
        let num_vdbox = backend.num_vdbox();
        if num_vdbox == 0 {
            return Err(ScalabilityError::InvalidParameter(
                "no video decode engine available".into(),
            ));
        }

        config.status_layout.validate()?;

        let fe_separate_configured = config.fe_separate_submission.unwrap_or(num_vdbox > 2);
        if fe_separate_configured {
            backend.create_context(ContextId::FrontEnd, 1)?;
            backend.register_completion_notify(ContextId::FrontEnd)?;
        }

        let resources = ScalabilityResources::new(
            &mut backend,
            codec,
            fe_separate_configured,
            &config.status_layout,
        )?;

        let real_tile_caps = RealTileCaps {
            enabled: config.enable_real_tile,
            multi_phase: config.real_tile_multi_phase,
            ..Default::default()
        };
        let decider = Box::new(ThresholdPipeNumDecider {
            thresholds: config.thresholds.clone(),
            real_tile: real_tile_caps,
            split_policy: config.split_policy,
        });

        debug!(
            "{:?} session on {} engines, separate front end submission: {}",
            codec, num_vdbox, fe_separate_configured
        );

        Ok(Self {
            resources,
            backend,
            codec,
            config,
            decider,
            real_tile_caps,
            contexts: ExecutionContextManager::new(),
            fe_separate_configured,
            fe_separate_submission: false,
            mode: ScalabilityMode::SinglePipe,
            pipe_num: 1,
            ring_count: 1,
            phase: Phase::Init,
            short_format_in_use: false,
            real_tile: None,
            assignments: vec![],
            sync: Default::default(),
            sync_initialized: false,
            completion: CompletionTracker::new(),
            status_report_index: 0,
            frame_ready: false,
        })
    }

    /// Replaces the pipe number decision strategy.
    pub fn with_pipe_num_decider(mut self, decider: Box<dyn PipeNumDecider>) -> Self {
        self.decider = decider;
        self
    }

    /// Decides how the frame described by `params` is decoded, and prepares the contexts and
    /// buffers this requires. Resets the phase to [`Phase::Init`].
    ///
    /// On failure the state is left in single pipe mode and no phase can be programmed until a
    /// frame is successfully initialized.
    pub fn init_frame(&mut self, params: &FrameParams) -> Result<FrameSetup> {
        self.frame_ready = false;

        match self.setup_frame(params) {
            Ok(setup) => {
                self.frame_ready = true;
                Ok(setup)
            }
            Err(e) => {
                warn!(
                    "failed to set up {}x{} frame: {}",
                    params.geometry.resolution.width, params.geometry.resolution.height, e
                );
                self.clear_frame(params.status_report_index);
                Err(e)
            }
        }
    }

    fn clear_frame(&mut self, status_report_index: u32) {
        self.phase = Phase::Init;
        self.mode = ScalabilityMode::SinglePipe;
        self.pipe_num = 1;
        self.real_tile = None;
        self.assignments.clear();
        self.fe_separate_submission = false;
        self.short_format_in_use = false;
        self.sync = SyncPrimitives::new(1);
        self.sync_initialized = false;
        self.status_report_index = status_report_index;
        self.completion.reset(0, status_report_index);
    }

    /// Sets up the frame, only touching the frame state once every fallible step succeeded.
    fn setup_frame(&mut self, params: &FrameParams) -> Result<FrameSetup> {
        let num_vdbox = self.backend.num_vdbox();
        let pipe_params = PipeNumParams {
            resolution: params.geometry.resolution,
            format: params.format,
            tiles_enabled: params.tiles.is_some(),
            tile_columns: params
                .tiles
                .as_ref()
                .map(|tiles| u8::try_from(tiles.columns.count()).unwrap_or(u8::MAX))
                .unwrap_or(1),
            tile_rows: params.tiles.as_ref().map(|tiles| tiles.rows).unwrap_or(1),
            using_sfc: params.using_sfc,
            secure_decode: params.secure_decode,
        };

        let mut pipe_num = if params.screen_content_coding {
            debug!("screen content coding in use, decoding with a single pipe");
            1
        } else {
            self.decider.decide_pipe_num(
                &pipe_params,
                &HwCapability { num_vdbox },
                &self.config.overrides,
            )?
        };

        if pipe_num > 1 && !self.backend.supports_secondary_buffers() {
            debug!("no secondary command buffers, decoding with a single pipe");
            pipe_num = 1;
        }

        let plan = self.plan_frame(params, &pipe_params, pipe_num)?;
        let fe_separate_submission =
            self.fe_separate_configured && plan.mode == ScalabilityMode::VirtualTile;
        let ring_count = ring_count_for(
            plan.pipe_num,
            fe_separate_submission,
            plan.mode == ScalabilityMode::RealTile,
            num_vdbox,
        )?;

        let toggle_cabac =
            plan.mode == ScalabilityMode::VirtualTile && num_vdbox > 2 && fe_separate_submission;
        if toggle_cabac {
            self.resources.toggle_cabac_streamout();
        }

        if let Err(e) = self.prepare_frame_resources(params, plan.mode, ring_count) {
            if toggle_cabac {
                self.resources.toggle_cabac_streamout();
            }
            return Err(e);
        }

        let pass_count = match (plan.mode, plan.real_tile) {
            (ScalabilityMode::RealTile, Some(layout)) => u32::from(layout.tile_columns()),
            (ScalabilityMode::VirtualTile, _) => u32::from(plan.pipe_num) + 1,
            _ => 1,
        } + u32::from(params.short_format_in_use);

        self.phase = Phase::Init;
        self.mode = plan.mode;
        self.pipe_num = plan.pipe_num;
        self.real_tile = plan.real_tile;
        self.assignments = plan.assignments;
        self.fe_separate_submission = fe_separate_submission;
        self.short_format_in_use = params.short_format_in_use;
        self.sync = SyncPrimitives::new(self.pipe_num);
        self.sync_initialized = false;
        self.status_report_index = params.status_report_index;
        self.completion.reset(self.pipe_num, params.status_report_index);
        self.ring_count = ring_count;

        let setup = FrameSetup {
            mode: self.mode,
            pipe_num: self.pipe_num,
            pass_count,
            real_tile: self.real_tile,
        };
        debug!(
            "{}x{} frame: {:?}, {} ring(s)",
            params.geometry.resolution.width,
            params.geometry.resolution.height,
            setup,
            self.ring_count
        );

        Ok(setup)
    }

    /// Allocates the buffers a frame decoded in `mode` needs and binds a context with
    /// `ring_count` rings.
    fn prepare_frame_resources(
        &mut self,
        params: &FrameParams,
        mode: ScalabilityMode,
        ring_count: u8,
    ) -> Result<()> {
        if mode != ScalabilityMode::SinglePipe {
            let size_params = BufferSizeParams {
                resolution: params.geometry.resolution,
                ctb_log2_size: params.geometry.ctb_log2_size(),
                bit_depth: params.format.bit_depth(),
                chroma: params.format.chroma_format(),
                max_frame_size: params.max_frame_size,
            };
            self.resources.ensure_variable_buffers(
                &mut self.backend,
                &size_params,
                mode == ScalabilityMode::VirtualTile,
            )?;
        }

        self.contexts.reconcile(&mut self.backend, ring_count)?;

        Ok(())
    }

    fn plan_frame(
        &self,
        params: &FrameParams,
        pipe_params: &PipeNumParams,
        pipe_num: u8,
    ) -> Result<FramePlan> {
        if pipe_num > 1 {
            let real_tiles = params.tiles.as_ref().filter(|_| {
                pipe_params.real_tile_possible(&self.real_tile_caps)
                    && !params.secure_decode
                    && (self.real_tile_caps.multi_phase || pipe_params.tile_columns <= pipe_num)
            });

            if let Some(tiles) = real_tiles {
                let (layout, assignments) =
                    partition_real_tiles(pipe_num, &params.geometry, &tiles.columns)?;

                return Ok(FramePlan {
                    mode: ScalabilityMode::RealTile,
                    pipe_num: layout.pipe_num(),
                    real_tile: Some(layout),
                    assignments,
                });
            }

            let pipe_num = pipe_num
                .min(max_virtual_tile_pipes(
                    self.backend.num_vdbox(),
                    self.fe_separate_configured,
                ))
                .min(self.config.split_policy.max_pipe_num());

            if pipe_num > 1 {
                match partition(
                    pipe_num,
                    &params.geometry,
                    self.config.split_policy,
                    self.fe_separate_configured,
                ) {
                    Ok(assignments) => {
                        return Ok(FramePlan {
                            mode: ScalabilityMode::VirtualTile,
                            pipe_num,
                            real_tile: None,
                            assignments,
                        })
                    }
                    Err(ScalabilityError::UnsupportedPartition(reason)) => {
                        debug!("decoding with a single pipe: {}", reason);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(FramePlan {
            mode: ScalabilityMode::SinglePipe,
            pipe_num: 1,
            real_tile: None,
            assignments: partition(1, &params.geometry, SplitPolicy::Even, false)?,
        })
    }

    pub fn phase_context(&self) -> PhaseContext {
        PhaseContext {
            mode: self.mode,
            short_format_in_use: self.short_format_in_use,
            pipe_num: self.pipe_num,
            real_tile: self.real_tile,
            current: self.phase,
        }
    }

    /// Moves to the next phase of the frame and returns it.
    pub fn advance_phase(&mut self) -> Result<Phase> {
        if !self.frame_ready {
            return Err(ScalabilityError::InvalidParameter(
                "no frame has been initialized".into(),
            ));
        }

        let ctx = self.phase_context();
        let next = determine_next_phase(&ctx)?;
        check_phase_validity(&ctx, next)?;

        trace!("{:?} -> {:?}", self.phase, next);
        self.phase = next;

        Ok(next)
    }

    /// Whether the final phase of the frame has been reached.
    pub fn is_frame_done(&self) -> bool {
        self.phase_context().is_final_phase(self.phase)
    }

    fn buffer_index_for_phase(&self, phase: Phase) -> Result<BufferIndex> {
        if self.mode == ScalabilityMode::SinglePipe || !self.backend.supports_secondary_buffers()
        {
            return Ok(BufferIndex::Primary);
        }

        buffer_index_for(phase, self.fe_separate_submission)
    }

    /// Checks out the command buffer of the current phase.
    pub fn get_buffer_for_phase(&mut self) -> Result<CommandBufferSlot<B::CommandBuffer>> {
        let index = self.buffer_index_for_phase(self.phase)?;
        let buffer = self.backend.get_command_buffer(index)?;

        Ok(CommandBufferSlot { index, buffer })
    }

    /// Gives back a command buffer obtained with [`Self::get_buffer_for_phase`].
    pub fn return_buffer_for_phase(
        &mut self,
        slot: CommandBufferSlot<B::CommandBuffer>,
    ) -> Result<()> {
        self.backend.return_command_buffer(slot.index, slot.buffer)?;
        Ok(())
    }

    /// With separate front-end submission, switches to the context the current phase runs on.
    pub fn switch_context_for_phase(&mut self) -> Result<()> {
        if !self.fe_separate_submission {
            return Ok(());
        }

        let context = match self.phase {
            Phase::ShortFormatConvert => ContextId::FrontEnd,
            // Already switched by the short format conversion.
            Phase::FrontEnd if !self.short_format_in_use => ContextId::FrontEnd,
            Phase::BackEnd(0) => self.contexts.video_context(),
            _ => return Ok(()),
        };

        self.backend.set_context(context)?;

        Ok(())
    }

    /// Programs the current phase into its command buffer.
    ///
    /// `decode` emits the decoding commands of the phase, and gets called once the phase is
    /// allowed to start. Returns whether the command buffers must be submitted now, see
    /// [`Self::ring_assignment`] for which ones.
    pub fn program_phase<F>(&mut self, decode: F) -> Result<bool>
    where
        F: FnOnce(Phase, &mut B::CommandBuffer) -> Result<()>,
    {
        if self.phase == Phase::Init {
            return Err(ScalabilityError::InvalidParameter(
                "no phase to program before advancing".into(),
            ));
        }

        let mut slot = self.get_buffer_for_phase()?;
        let programmed = self.emit_phase(&mut slot.buffer, decode);
        self.return_buffer_for_phase(slot)?;
        programmed?;

        Ok(self.should_submit_command_buffer())
    }

    fn emit_phase<F>(&mut self, cmd: &mut B::CommandBuffer, decode: F) -> Result<()>
    where
        F: FnOnce(Phase, &mut B::CommandBuffer) -> Result<()>,
    {
        let phase = self.phase;

        self.switch_context_for_phase()?;
        if !self.sync_initialized {
            self.init_sync_resources(cmd)?;
        }
        if phase.starts_watchdog(self.short_format_in_use) {
            cmd.watchdog_start()?;
        }
        self.wait_and_start_back_ends(cmd)?;

        decode(phase, cmd)?;

        if phase.is_front_end() {
            self.signal_fe_done(cmd)?;
        }
        record_engine_id(
            cmd,
            self.resources.status_report(),
            &self.config.status_layout,
            self.status_report_index,
            phase,
        )?;
        if self.is_pipe_final_pass() {
            self.signal_pipe_completion(cmd)?;
        }

        Ok(())
    }

    pub fn should_submit_command_buffer(&self) -> bool {
        completion::should_submit_command_buffer(
            &self.phase_context(),
            self.fe_separate_submission,
            self.config.phased_submission,
        )
    }

    pub fn submission_kind(&self) -> SubmissionKind {
        completion::submission_kind(&self.phase_context(), self.fe_separate_submission)
    }

    pub fn submission_role(&self) -> SubmissionRole {
        submission_role_for(self.phase, self.pipe_num, self.real_tile.as_ref())
    }

    /// Command buffers of the submission completed by the current phase, one list per ring.
    /// Buffers sharing a ring run one after the other.
    pub fn ring_assignment(&self) -> Vec<Vec<BufferIndex>> {
        if self.mode == ScalabilityMode::SinglePipe || !self.backend.supports_secondary_buffers()
        {
            return vec![vec![BufferIndex::Primary]];
        }

        let one_per_ring = |count: u8| -> Vec<Vec<BufferIndex>> {
            (0..count).map(|i| vec![BufferIndex::Secondary(i)]).collect()
        };

        match self.mode {
            ScalabilityMode::VirtualTile if self.fe_separate_submission => {
                if self.phase.is_front_end_adjacent() {
                    vec![vec![BufferIndex::Primary]]
                } else {
                    one_per_ring(self.pipe_num)
                }
            }
            // The front end shares the ring of back end 0.
            ScalabilityMode::VirtualTile if self.ring_count == self.pipe_num => {
                let mut rings = vec![vec![BufferIndex::Secondary(0), BufferIndex::Secondary(1)]];
                rings.extend((2..=self.pipe_num).map(|i| vec![BufferIndex::Secondary(i)]));
                rings
            }
            ScalabilityMode::VirtualTile => one_per_ring(self.pipe_num + 1),
            _ => match (self.phase, self.real_tile) {
                (Phase::RealTile { phase, .. }, Some(layout)) if self.config.phased_submission => {
                    one_per_ring(layout.pipes_in_phase(phase))
                }
                _ => one_per_ring(self.pipe_num),
            },
        }
    }

    /// Work of the pipe running the current phase.
    pub fn current_assignment(&self) -> Option<&PipeAssignment> {
        match self.phase {
            Phase::Legacy => self.assignments.first(),
            Phase::BackEnd(pipe) => self.assignments.iter().find(|a| a.pipe == pipe),
            Phase::RealTile { phase, pipe } => self
                .assignments
                .iter()
                .find(|a| a.phase == phase && a.pipe == pipe),
            Phase::Init | Phase::ShortFormatConvert | Phase::FrontEnd => None,
        }
    }

    /// Completion of the frame, once all its pipes have been programmed.
    pub fn frame_completion(&self) -> Option<FrameCompletion> {
        self.completion.frame_completion()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn config(&self) -> &ScalabilityConfig {
        &self.config
    }

    pub fn mode(&self) -> ScalabilityMode {
        self.mode
    }

    pub fn pipe_num(&self) -> u8 {
        self.pipe_num
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the front end of the current frame is submitted on its own.
    pub fn fe_separate_submission(&self) -> bool {
        self.fe_separate_submission
    }

    pub fn ring_count(&self) -> u8 {
        self.ring_count
    }

    pub fn bound_context(&self) -> Option<(ContextId, u8)> {
        self.contexts.bound()
    }

    pub fn real_tile_layout(&self) -> Option<&RealTileLayout> {
        self.real_tile.as_ref()
    }

    pub fn assignments(&self) -> &[PipeAssignment] {
        &self.assignments
    }

    pub fn sync_primitives(&self) -> &SyncPrimitives {
        &self.sync
    }

    pub fn resources(&self) -> &ScalabilityResources<B> {
        &self.resources
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
