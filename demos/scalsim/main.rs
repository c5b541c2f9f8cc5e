// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! scalsim, a program showing how cros-scalability decodes a frame: how many pipes are used,
//! how the picture is split, which phases are programmed and how the simulated engines execute
//! the resulting command streams.

use cros_scalability::backend::dummy::executor::Executor;
use cros_scalability::backend::dummy::Backend;
use cros_scalability::scalability::partition::CodingGeometry;
use cros_scalability::scalability::partition::TileColumns;
use cros_scalability::scalability::FrameParams;
use cros_scalability::scalability::ScalabilityConfig;
use cros_scalability::scalability::ScalabilityState;
use cros_scalability::scalability::TileParams;
use cros_scalability::Codec;
use cros_scalability::Resolution;

use crate::util::Args;

mod util;

fn main() {
    env_logger::init();

    let args: Args = argh::from_env();

    let resolution = Resolution::from((args.width, args.height));
    let geometry = match args.codec {
        Codec::Hevc => CodingGeometry::hevc(resolution, 0, 3).expect("invalid frame geometry"),
        Codec::Vp9 => CodingGeometry::vp9(resolution),
    };

    let config = ScalabilityConfig {
        fe_separate_submission: args.fe_separate,
        split_policy: args.split,
        phased_submission: args.phased,
        ..Default::default()
    };

    let mut state = ScalabilityState::new(Backend::new(args.vdbox), args.codec, config)
        .expect("failed to create scalability state");

    let params = FrameParams {
        tiles: args.tile_columns.map(|columns| TileParams {
            columns: TileColumns::Uniform(columns),
            rows: 1,
        }),
        max_frame_size: 1 << 20,
        short_format_in_use: args.short_format,
        ..FrameParams::new(geometry, args.format)
    };

    let setup = state.init_frame(&params).expect("failed to initialize frame");
    println!(
        "{:?} mode, {} pipe(s), {} pass(es), front end submitted separately: {}",
        setup.mode,
        setup.pipe_num,
        setup.pass_count,
        state.fe_separate_submission()
    );
    for assignment in state.assignments() {
        println!(
            "  pipe {} phase {}: min CB columns {:?} from LCU {}",
            assignment.pipe, assignment.phase, assignment.columns, assignment.start_lcu
        );
    }

    let executor = Executor::new().with_reported_streamout_size(args.streamout_size);

    while !state.is_frame_done() {
        let phase = state.advance_phase().expect("failed to advance phase");
        let submit = state
            .program_phase(|phase, cmd| {
                cmd.push_work(format!("{:?}", phase));
                Ok(())
            })
            .expect("failed to program phase");
        println!("programmed {:?}", phase);

        if !submit {
            continue;
        }

        let rings = state.ring_assignment();
        println!("submitting {:?} on {:?}", rings, state.bound_context());
        let streams = state.backend_mut().take_streams(&rings);
        let report = executor.run(streams).expect("failed to execute command streams");

        for (ring, work) in &report.work_done {
            println!("  ring {}: {}", ring, work);
        }
        println!("  final states: {:?}, {} steps", report.states, report.steps);
        if report.is_deadlocked() {
            println!("  deadlock!");
        }
    }

    if let Some(completion) = state.frame_completion() {
        println!(
            "frame complete: status report {}, final pipe {} on {:?}",
            completion.status_report_index, completion.final_pipe, completion.final_buffer
        );
    }
}
