#![no_main]

use cros_scalability::scalability::partition::partition;
use cros_scalability::scalability::partition::partition_real_tiles;
use cros_scalability::scalability::partition::CodingGeometry;
use cros_scalability::scalability::partition::SplitPolicy;
use cros_scalability::scalability::partition::TileColumns;
use cros_scalability::Resolution;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let width = u32::from(u16::from_le_bytes([data[0], data[1]]));
    let height = u32::from(u16::from_le_bytes([data[2], data[3]]));
    let pipe_num = data[4] % 8;
    let policy = match data[5] % 3 {
        0 => SplitPolicy::Even,
        1 => SplitPolicy::FirstColumnAligned,
        _ => SplitPolicy::FixedFirstColumn(u32::from(data[6])),
    };
    let fe_separate_submission = data[7] & 1 != 0;

    // 8x8 or 16x16 minimum coding blocks, 64x64 CTBs.
    let log2_min_cb_size_minus3 = (data[7] >> 6) % 2;
    let Ok(geometry) = CodingGeometry::hevc(
        Resolution::from((width, height)),
        log2_min_cb_size_minus3,
        3 - log2_min_cb_size_minus3,
    ) else {
        return;
    };

    if let Ok(assignments) = partition(pipe_num, &geometry, policy, fe_separate_submission) {
        let total = geometry.width_in_min_cb();
        assert_eq!(assignments.first().map(|a| a.columns.start), Some(0));
        assert_eq!(assignments.last().map(|a| a.columns.end), Some(total));
        for pair in assignments.windows(2) {
            assert_eq!(pair[0].columns.end, pair[1].columns.start);
            assert!(pair[0].width_in_min_cb() > 0);
        }
    }

    let tiles = if data.len() > 8 {
        TileColumns::Explicit(data[8..].iter().map(|w| u32::from(*w)).collect())
    } else {
        TileColumns::Uniform(data[6])
    };

    if let Ok((layout, assignments)) = partition_real_tiles(pipe_num, &geometry, &tiles) {
        assert_eq!(assignments.len(), usize::from(layout.tile_columns()));
        assert!(layout.pipe_num() <= layout.tile_columns());
    }
});
