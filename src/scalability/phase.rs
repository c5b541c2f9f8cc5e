// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Phases a frame goes through, and the rules to move from one to the next.
//!
//! In virtual tile mode the front end parses the whole picture, then each pipe runs one back-end
//! phase over its column range. In real tile mode the picture has its own tile columns, which
//! are dealt to the pipes in as many phases as needed. Single-pipe frames run a single legacy
//! phase. Any mode can be preceded by a short format conversion phase.

use log::error;

use crate::scalability::partition::RealTileLayout;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::scalability::ScalabilityMode;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Init,
    /// Conversion of short format slice data into long format.
    ShortFormatConvert,
    /// Single-pipe decoding.
    Legacy,
    FrontEnd,
    /// Back end of the given pipe.
    BackEnd(u8),
    /// Pass of `pipe` during real tile `phase`.
    RealTile { phase: u8, pipe: u8 },
}

impl Phase {
    pub fn is_front_end(&self) -> bool {
        matches!(self, Phase::FrontEnd)
    }

    pub fn is_back_end(&self) -> bool {
        matches!(self, Phase::BackEnd(_))
    }

    pub fn is_real_tile(&self) -> bool {
        matches!(self, Phase::RealTile { .. })
    }

    /// Whether this phase runs before the picture is split between pipes.
    pub fn is_front_end_adjacent(&self) -> bool {
        match self {
            Phase::ShortFormatConvert | Phase::FrontEnd => true,
            Phase::Init | Phase::Legacy | Phase::BackEnd(_) | Phase::RealTile { .. } => false,
        }
    }

    /// Returns the pipe index this phase runs on, if it is tied to a given pipe.
    pub fn pipe(&self) -> Option<u8> {
        match self {
            Phase::Legacy => Some(0),
            Phase::BackEnd(pipe) | Phase::RealTile { pipe, .. } => Some(*pipe),
            Phase::Init | Phase::ShortFormatConvert | Phase::FrontEnd => None,
        }
    }

    /// Whether this is the last back end of a frame decoded by `pipe_num` pipes.
    pub fn is_final_back_end(&self, pipe_num: u8) -> bool {
        matches!(self, Phase::BackEnd(k) if u16::from(*k) + 1 == u16::from(pipe_num))
    }

    /// Whether this is a pass of the first real tile phase.
    pub fn is_first_real_tile_phase(&self) -> bool {
        matches!(self, Phase::RealTile { phase: 0, .. })
    }

    /// Whether the watchdog timer should be started when the phase begins.
    ///
    /// A front end preceded by a short format conversion shares the timer started by the
    /// conversion phase.
    pub fn starts_watchdog(&self, short_format_in_use: bool) -> bool {
        match self {
            Phase::ShortFormatConvert | Phase::BackEnd(_) => true,
            Phase::FrontEnd => !short_format_in_use,
            Phase::Init | Phase::Legacy | Phase::RealTile { .. } => false,
        }
    }
}

/// Everything the phase transition rules depend on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhaseContext {
    pub mode: ScalabilityMode,
    pub short_format_in_use: bool,
    pub pipe_num: u8,
    /// Layout of the frame, if in real tile mode.
    pub real_tile: Option<RealTileLayout>,
    pub current: Phase,
}

impl PhaseContext {
    /// Whether `phase` is the last phase of the frame.
    pub fn is_final_phase(&self, phase: Phase) -> bool {
        match (self.mode, phase) {
            (ScalabilityMode::SinglePipe, Phase::Legacy) => true,
            (ScalabilityMode::VirtualTile, phase) => phase.is_final_back_end(self.pipe_num),
            (ScalabilityMode::RealTile, Phase::RealTile { phase, pipe }) => self
                .real_tile
                .map(|layout| layout.is_last_pass(phase, pipe))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn real_tile_layout(&self) -> Result<RealTileLayout> {
        self.real_tile.ok_or_else(|| {
            ScalabilityError::InvalidParameter("real tile mode without a tile layout".into())
        })
    }
}

/// Checks that `phase` can be executed given `ctx`.
pub fn check_phase_validity(ctx: &PhaseContext, phase: Phase) -> Result<()> {
    let scalable = ctx.mode != ScalabilityMode::SinglePipe;
    let virtual_tile = ctx.mode == ScalabilityMode::VirtualTile && ctx.pipe_num >= 2;

    let valid = match phase {
        Phase::Init => true,
        Phase::ShortFormatConvert => ctx.short_format_in_use,
        Phase::Legacy => !scalable,
        Phase::FrontEnd => virtual_tile,
        Phase::BackEnd(k) => virtual_tile && k < ctx.pipe_num,
        Phase::RealTile { phase, pipe } => {
            ctx.mode == ScalabilityMode::RealTile
                && ctx
                    .real_tile
                    .map(|layout| phase < layout.phase_num() && pipe < layout.pipes_in_phase(phase))
                    .unwrap_or(false)
        }
    };

    if valid {
        Ok(())
    } else {
        Err(ScalabilityError::InvalidParameter(format!(
            "{:?} is not valid in {:?} mode with {} pipe(s)",
            phase, ctx.mode, ctx.pipe_num
        )))
    }
}

/// Returns the phase following `ctx.current`.
///
/// Asking for the successor of the final phase of a frame is an error.
pub fn determine_next_phase(ctx: &PhaseContext) -> Result<Phase> {
    check_phase_validity(ctx, ctx.current)?;

    if ctx.is_final_phase(ctx.current) {
        return Err(ScalabilityError::InvalidParameter(format!(
            "{:?} is the final phase of the frame",
            ctx.current
        )));
    }

    let next = match (ctx.mode, ctx.current) {
        (_, Phase::Init) if ctx.short_format_in_use => Phase::ShortFormatConvert,
        (ScalabilityMode::SinglePipe, Phase::Init | Phase::ShortFormatConvert) => Phase::Legacy,
        (ScalabilityMode::VirtualTile, Phase::Init | Phase::ShortFormatConvert) => Phase::FrontEnd,
        (ScalabilityMode::VirtualTile, Phase::FrontEnd) => Phase::BackEnd(0),
        (ScalabilityMode::VirtualTile, Phase::BackEnd(k)) => Phase::BackEnd(k + 1),
        (ScalabilityMode::RealTile, Phase::Init | Phase::ShortFormatConvert) => {
            Phase::RealTile { phase: 0, pipe: 0 }
        }
        (ScalabilityMode::RealTile, Phase::RealTile { phase, pipe }) => {
            match ctx.real_tile_layout()?.next_pass(phase, pipe) {
                Some((phase, pipe)) => Phase::RealTile { phase, pipe },
                None => return Err(unreachable_transition(ctx)),
            }
        }
        _ => return Err(unreachable_transition(ctx)),
    };

    Ok(next)
}

fn unreachable_transition(ctx: &PhaseContext) -> ScalabilityError {
    error!(
        "no transition from {:?} in {:?} mode ({} pipes), this is a bug",
        ctx.current, ctx.mode, ctx.pipe_num
    );

    ScalabilityError::InvalidTransition {
        from: ctx.current,
        mode: ctx.mode,
    }
}
