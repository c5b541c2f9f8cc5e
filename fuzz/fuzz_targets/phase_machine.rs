#![no_main]

use cros_scalability::scalability::partition::RealTileLayout;
use cros_scalability::scalability::phase::check_phase_validity;
use cros_scalability::scalability::phase::determine_next_phase;
use cros_scalability::scalability::phase::Phase;
use cros_scalability::scalability::phase::PhaseContext;
use cros_scalability::scalability::ScalabilityMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mode = match data[0] % 3 {
        0 => ScalabilityMode::SinglePipe,
        1 => ScalabilityMode::VirtualTile,
        _ => ScalabilityMode::RealTile,
    };
    let pipe_num = data[1] % 8;
    let real_tile = RealTileLayout::new(pipe_num, data[2]).ok();

    let mut ctx = PhaseContext {
        mode,
        short_format_in_use: data[3] & 1 != 0,
        pipe_num,
        real_tile,
        current: Phase::Init,
    };

    // Walking from Init must end, either on an error or on the final phase.
    let mut passes = 0u32;
    while let Ok(next) = determine_next_phase(&ctx) {
        if check_phase_validity(&ctx, next).is_err() {
            break;
        }
        ctx.current = next;
        passes += 1;
        assert!(passes <= 2 + 256);
    }
});
