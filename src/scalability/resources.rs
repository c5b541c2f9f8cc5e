// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Memory shared by the pipes of a frame.
//!
//! Fixed-size buffers are allocated once per session. Buffers whose size depends on the picture
//! are allocated on first use and reallocated whenever a frame needs more than what is
//! allocated. Dropping [`ScalabilityResources`] releases everything.

use log::debug;

use crate::backend::ScalabilityBackend;
use crate::scalability::completion::StatusReportLayout;
use crate::scalability::sync::CounterId;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::ChromaFormat;
use crate::Codec;
use crate::Resolution;

const CACHELINE_SIZE: usize = 64;
/// Slice state streamout: 8 cachelines for each of up to 600 slices.
pub const SLICE_STATE_STREAMOUT_SIZE: usize = 600 * 8 * CACHELINE_SIZE;
const SEMAPHORE_SIZE: usize = 4;
const FE_STATUS_SIZE: usize = 4;

/// Buffers whose size depends on the picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableBuffer {
    MvUpRightColStore,
    IntraPredUpRightColStore,
    IntraPredLeftReconColStore,
    /// Entropy decoding output of the front end, read by the back ends.
    CabacStreamout,
}

impl VariableBuffer {
    pub const ALL: [VariableBuffer; 4] = [
        VariableBuffer::MvUpRightColStore,
        VariableBuffer::IntraPredUpRightColStore,
        VariableBuffer::IntraPredLeftReconColStore,
        VariableBuffer::CabacStreamout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VariableBuffer::MvUpRightColStore => "mv up right column store",
            VariableBuffer::IntraPredUpRightColStore => "intra prediction up right column store",
            VariableBuffer::IntraPredLeftReconColStore => {
                "intra prediction left reconstruction column store"
            }
            VariableBuffer::CabacStreamout => "cabac streamout",
        }
    }
}

/// Picture properties the size of the variable buffers depends on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferSizeParams {
    pub resolution: Resolution,
    /// log2 of the largest coding block size.
    pub ctb_log2_size: u8,
    pub bit_depth: u8,
    pub chroma: ChromaFormat,
    /// Size of the largest compressed frame, in bytes.
    pub max_frame_size: usize,
}

/// Codec-specific sizing of the variable buffers.
pub trait BufferSizer {
    /// Returns the size `buffer` needs for a picture of `params`, or `None` if the codec does not
    /// use it.
    fn buffer_size(&self, buffer: VariableBuffer, params: &BufferSizeParams)
        -> Result<Option<usize>>;

    /// Whether the slice state streamout buffer is needed.
    fn uses_slice_state_streamout(&self) -> bool;
}

/// Returns the buffer sizer for `codec`.
pub fn buffer_sizer_for(codec: Codec) -> Box<dyn BufferSizer> {
    match codec {
        Codec::Hevc => Box::new(HevcBufferSizer),
        Codec::Vp9 => Box::new(Vp9BufferSizer),
    }
}

/// Size of the CABAC streamout for a picture of `width` x `height` blocks of 16x16 pixels.
fn cabac_streamout_size(width: usize, height: usize, params: &BufferSizeParams) -> Result<usize> {
    let per_block = if params.chroma == ChromaFormat::Yuv420 && params.bit_depth == 8 {
        4 * CACHELINE_SIZE
    } else {
        6 * CACHELINE_SIZE
    };

    width
        .checked_mul(height)
        .and_then(|blocks| blocks.checked_mul(per_block + 1))
        .zip(params.max_frame_size.checked_mul(3))
        .and_then(|(blocks, slices)| blocks.checked_add(slices))
        .and_then(|size| size.checked_next_multiple_of(CACHELINE_SIZE))
        .ok_or_else(|| {
            ScalabilityError::InvalidParameter(format!(
                "CABAC streamout size of {}x{} blocks with {} byte frames overflows",
                width, height, params.max_frame_size
            ))
        })
}

pub struct HevcBufferSizer;

impl HevcBufferSizer {
    /// Cachelines per 16 pixel rows of the intra prediction column stores, indexed by
    /// `[bit depth > 8][ctb_log2_size - 4]`.
    const INTRA_PRED_420: [[usize; 3]; 2] = [[1, 1, 2], [1, 2, 4]];
    const INTRA_PRED_444: [[usize; 3]; 2] = [[1, 2, 3], [2, 3, 6]];
}

impl BufferSizer for HevcBufferSizer {
    fn buffer_size(
        &self,
        buffer: VariableBuffer,
        params: &BufferSizeParams,
    ) -> Result<Option<usize>> {
        if !(4..=6).contains(&params.ctb_log2_size) {
            return Err(ScalabilityError::InvalidParameter(format!(
                "unsupported HEVC CTB size 1 << {}",
                params.ctb_log2_size
            )));
        }

        let width = params.resolution.width.div_ceil(16) as usize;
        let height = params.resolution.height.div_ceil(16) as usize;
        let ctb_index = usize::from(params.ctb_log2_size - 4);
        let high_bit_depth = usize::from(params.bit_depth > 8);

        let size = match buffer {
            VariableBuffer::MvUpRightColStore => {
                let multiplier = if params.ctb_log2_size == 6 { 2 } else { 1 };
                multiplier * CACHELINE_SIZE * height
            }
            VariableBuffer::IntraPredUpRightColStore
            | VariableBuffer::IntraPredLeftReconColStore => {
                let table = match params.chroma {
                    ChromaFormat::Yuv422 | ChromaFormat::Yuv444 => Self::INTRA_PRED_444,
                    ChromaFormat::Monochrome | ChromaFormat::Yuv420 => Self::INTRA_PRED_420,
                };
                table[high_bit_depth][ctb_index] * CACHELINE_SIZE * height
            }
            VariableBuffer::CabacStreamout => cabac_streamout_size(width, height, params)?,
        };

        Ok(Some(size))
    }

    fn uses_slice_state_streamout(&self) -> bool {
        true
    }
}

pub struct Vp9BufferSizer;

impl BufferSizer for Vp9BufferSizer {
    fn buffer_size(
        &self,
        buffer: VariableBuffer,
        params: &BufferSizeParams,
    ) -> Result<Option<usize>> {
        let width_in_sb = params.resolution.width.div_ceil(64) as usize;
        let height_in_sb = params.resolution.height.div_ceil(64) as usize;

        let size = match buffer {
            VariableBuffer::MvUpRightColStore => return Ok(None),
            VariableBuffer::IntraPredUpRightColStore
            | VariableBuffer::IntraPredLeftReconColStore => {
                let multiplier = match (params.chroma, params.bit_depth > 8) {
                    (ChromaFormat::Yuv420, false) => 2,
                    (ChromaFormat::Yuv420, true) => 4,
                    (ChromaFormat::Yuv444, false) => 3,
                    (ChromaFormat::Yuv444, true) => 6,
                    (chroma, _) => {
                        return Err(ScalabilityError::InvalidParameter(format!(
                            "unsupported VP9 chroma format {:?}",
                            chroma
                        )))
                    }
                };
                multiplier * height_in_sb * CACHELINE_SIZE
            }
            VariableBuffer::CabacStreamout => {
                cabac_streamout_size(width_in_sb * 8, height_in_sb * 8, params)?
            }
        };

        Ok(Some(size))
    }

    fn uses_slice_state_streamout(&self) -> bool {
        false
    }
}

/// A buffer and the size it was allocated with.
#[derive(Debug)]
pub struct SizedBuffer<T> {
    pub buffer: T,
    pub size: usize,
}

/// Two slots used in turn, one frame each.
#[derive(Debug)]
pub struct TwoSlotRing<T> {
    slots: [Option<T>; 2],
    current: usize,
}

impl<T> Default for TwoSlotRing<T> {
    fn default() -> Self {
        Self {
            slots: [None, None],
            current: 0,
        }
    }
}

impl<T> TwoSlotRing<T> {
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&T> {
        self.slots[self.current].as_ref()
    }

    pub fn current_mut(&mut self) -> &mut Option<T> {
        &mut self.slots[self.current]
    }

    /// Switches to the other slot.
    pub fn toggle(&mut self) {
        self.current ^= 1;
    }
}

/// Makes sure `slot` holds a buffer of at least `required` bytes.
///
/// The previous buffer is only released once its replacement has been allocated.
fn ensure_size<B: ScalabilityBackend>(
    backend: &mut B,
    slot: &mut Option<SizedBuffer<B::Buffer>>,
    name: &'static str,
    required: usize,
) -> Result<()> {
    if matches!(slot, Some(buffer) if buffer.size >= required) {
        return Ok(());
    }

    debug!(
        "allocating {} bytes for {} (was {:?})",
        required,
        name,
        slot.as_ref().map(|buffer| buffer.size)
    );

    let buffer = backend.allocate_buffer(name, required)?;
    *slot = Some(SizedBuffer {
        buffer,
        size: required,
    });

    Ok(())
}

pub struct ScalabilityResources<B: ScalabilityBackend> {
    sizer: Box<dyn BufferSizer>,

    slice_state_streamout: Option<B::Buffer>,
    be_semaphore: B::Buffer,
    delay_scratch: B::Buffer,
    fe_be_semaphore: B::Buffer,
    fe_be_sync: Option<B::SyncObject>,
    fe_status: B::Buffer,
    completion_semaphore: B::Buffer,
    status_report: B::Buffer,

    mv_up_right: Option<SizedBuffer<B::Buffer>>,
    intra_pred_up_right: Option<SizedBuffer<B::Buffer>>,
    intra_pred_left_recon: Option<SizedBuffer<B::Buffer>>,
    cabac_streamout: TwoSlotRing<SizedBuffer<B::Buffer>>,
}

impl<B: ScalabilityBackend> ScalabilityResources<B> {
    /// Allocates the fixed-size resources of a session decoding `codec`.
    ///
    /// A synchronization object for the front-end to back-end handoff is created if
    /// `fe_separate_submission` is set.
    pub fn new(
        backend: &mut B,
        codec: Codec,
        fe_separate_submission: bool,
        status_layout: &StatusReportLayout,
    ) -> Result<Self> {
        let sizer = buffer_sizer_for(codec);

        let slice_state_streamout = if sizer.uses_slice_state_streamout() {
            Some(backend.allocate_buffer("slice state streamout", SLICE_STATE_STREAMOUT_SIZE)?)
        } else {
            None
        };

        let fe_be_sync = if fe_separate_submission {
            Some(backend.create_sync_object()?)
        } else {
            None
        };

        Ok(Self {
            slice_state_streamout,
            be_semaphore: backend.allocate_buffer("back end start semaphore", SEMAPHORE_SIZE)?,
            delay_scratch: backend.allocate_buffer("delay scratch", SEMAPHORE_SIZE)?,
            fe_be_semaphore: backend.allocate_buffer("front end semaphore", SEMAPHORE_SIZE)?,
            fe_be_sync,
            fe_status: backend.allocate_buffer("front end status", FE_STATUS_SIZE)?,
            completion_semaphore: backend
                .allocate_buffer("completion semaphore", SEMAPHORE_SIZE)?,
            status_report: backend
                .allocate_buffer("status report", status_layout.buffer_size()?)?,
            sizer,
            mv_up_right: None,
            intra_pred_up_right: None,
            intra_pred_left_recon: None,
            cabac_streamout: Default::default(),
        })
    }

    /// Makes sure the variable buffers are large enough for a picture of `params`.
    ///
    /// The CABAC streamout buffer is only needed when a front end runs, i.e. if `with_cabac` is
    /// set.
    pub fn ensure_variable_buffers(
        &mut self,
        backend: &mut B,
        params: &BufferSizeParams,
        with_cabac: bool,
    ) -> Result<()> {
        for kind in VariableBuffer::ALL {
            if kind == VariableBuffer::CabacStreamout && !with_cabac {
                continue;
            }

            let required = match self.sizer.buffer_size(kind, params)? {
                Some(size) => size,
                None => continue,
            };

            let slot = match kind {
                VariableBuffer::MvUpRightColStore => &mut self.mv_up_right,
                VariableBuffer::IntraPredUpRightColStore => &mut self.intra_pred_up_right,
                VariableBuffer::IntraPredLeftReconColStore => &mut self.intra_pred_left_recon,
                VariableBuffer::CabacStreamout => self.cabac_streamout.current_mut(),
            };

            ensure_size(backend, slot, kind.name(), required)?;
        }

        Ok(())
    }

    /// Switches to the other CABAC streamout buffer, so a frame does not overwrite the streamout
    /// the previous frame may still be reading.
    pub fn toggle_cabac_streamout(&mut self) {
        self.cabac_streamout.toggle();
    }

    pub fn cabac_streamout(&self) -> Option<&SizedBuffer<B::Buffer>> {
        self.cabac_streamout.current()
    }

    pub fn cabac_streamout_slot(&self) -> usize {
        self.cabac_streamout.current_index()
    }

    pub fn variable_buffer(&self, kind: VariableBuffer) -> Option<&SizedBuffer<B::Buffer>> {
        match kind {
            VariableBuffer::MvUpRightColStore => self.mv_up_right.as_ref(),
            VariableBuffer::IntraPredUpRightColStore => self.intra_pred_up_right.as_ref(),
            VariableBuffer::IntraPredLeftReconColStore => self.intra_pred_left_recon.as_ref(),
            VariableBuffer::CabacStreamout => self.cabac_streamout(),
        }
    }

    /// Memory holding the shared counter `counter`.
    pub fn counter(&self, counter: CounterId) -> &B::Buffer {
        match counter {
            CounterId::BackEndStart => &self.be_semaphore,
            CounterId::FrontEndHandoff => &self.fe_be_semaphore,
            CounterId::Completion => &self.completion_semaphore,
        }
    }

    pub fn slice_state_streamout(&self) -> Option<&B::Buffer> {
        self.slice_state_streamout.as_ref()
    }

    pub fn delay_scratch(&self) -> &B::Buffer {
        &self.delay_scratch
    }

    pub fn fe_be_sync(&self) -> Option<&B::SyncObject> {
        self.fe_be_sync.as_ref()
    }

    /// Front-end status: streamout overflow flag at offset 0.
    pub fn fe_status(&self) -> &B::Buffer {
        &self.fe_status
    }

    pub fn status_report(&self) -> &B::Buffer {
        &self.status_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::Backend;
    use crate::backend::BackendError;

    fn align(value: usize, alignment: usize) -> usize {
        value.div_ceil(alignment) * alignment
    }

    fn params(width: u32, height: u32) -> BufferSizeParams {
        BufferSizeParams {
            resolution: Resolution::from((width, height)),
            ctb_log2_size: 6,
            bit_depth: 8,
            chroma: ChromaFormat::Yuv420,
            max_frame_size: 1 << 20,
        }
    }

    #[test]
    fn hevc_sizes() {
        let params = params(3840, 2160);
        let size = |kind| HevcBufferSizer.buffer_size(kind, &params).unwrap().unwrap();

        // 2160 / 16 = 135 rows of 16 pixels.
        assert_eq!(size(VariableBuffer::MvUpRightColStore), 2 * 64 * 135);
        assert_eq!(size(VariableBuffer::IntraPredUpRightColStore), 2 * 64 * 135);
        assert_eq!(size(VariableBuffer::IntraPredLeftReconColStore), 2 * 64 * 135);
        assert_eq!(
            size(VariableBuffer::CabacStreamout),
            align(240 * 135 * 256 + 240 * 135 + 3 * (1 << 20), 64)
        );

        let ten_bit_444 = BufferSizeParams {
            bit_depth: 10,
            chroma: ChromaFormat::Yuv444,
            ctb_log2_size: 5,
            ..params
        };
        assert_eq!(
            HevcBufferSizer
                .buffer_size(VariableBuffer::IntraPredUpRightColStore, &ten_bit_444)
                .unwrap(),
            Some(3 * 64 * 135)
        );
        assert_eq!(
            HevcBufferSizer
                .buffer_size(VariableBuffer::MvUpRightColStore, &ten_bit_444)
                .unwrap(),
            Some(64 * 135)
        );

        let bad_ctb = BufferSizeParams {
            ctb_log2_size: 3,
            ..params
        };
        assert!(HevcBufferSizer.buffer_size(VariableBuffer::CabacStreamout, &bad_ctb).is_err());
    }

    #[test]
    fn vp9_sizes() {
        let params = params(1920, 1080);

        assert_eq!(
            Vp9BufferSizer.buffer_size(VariableBuffer::MvUpRightColStore, &params).unwrap(),
            None
        );
        // 1080 / 64 = 17 super block rows.
        assert_eq!(
            Vp9BufferSizer
                .buffer_size(VariableBuffer::IntraPredLeftReconColStore, &params)
                .unwrap(),
            Some(2 * 17 * 64)
        );
        assert_eq!(
            Vp9BufferSizer.buffer_size(VariableBuffer::CabacStreamout, &params).unwrap(),
            Some(align(240 * 136 * 256 + 240 * 136 + 3 * (1 << 20), 64))
        );

        let yuv422 = BufferSizeParams {
            chroma: ChromaFormat::Yuv422,
            ..params
        };
        assert!(Vp9BufferSizer
            .buffer_size(VariableBuffer::IntraPredUpRightColStore, &yuv422)
            .is_err());
    }

    #[test]
    fn cabac_streamout_size_overflow() {
        for max_frame_size in [usize::MAX / 3 + 1, usize::MAX / 2, usize::MAX] {
            let params = BufferSizeParams {
                max_frame_size,
                ..params(1920, 1080)
            };
            let sizers: [&dyn BufferSizer; 2] = [&HevcBufferSizer, &Vp9BufferSizer];

            for sizer in sizers {
                assert!(
                    matches!(
                        sizer.buffer_size(VariableBuffer::CabacStreamout, &params),
                        Err(ScalabilityError::InvalidParameter(_))
                    ),
                    "max frame size {}",
                    max_frame_size
                );
                assert!(sizer
                    .buffer_size(VariableBuffer::IntraPredUpRightColStore, &params)
                    .is_ok());
            }
        }

        let mut backend = Backend::new(2);
        let mut resources =
            ScalabilityResources::new(&mut backend, Codec::Hevc, false, &Default::default())
                .unwrap();
        let huge = BufferSizeParams {
            max_frame_size: usize::MAX,
            ..params(3840, 2160)
        };
        assert!(resources.ensure_variable_buffers(&mut backend, &huge, true).is_err());
        assert!(resources.cabac_streamout().is_none());
    }

    #[test]
    fn fixed_resources() {
        let mut backend = Backend::new(3);
        let resources =
            ScalabilityResources::new(&mut backend, Codec::Hevc, true, &Default::default())
                .unwrap();

        assert!(resources.slice_state_streamout().is_some());
        assert!(resources.fe_be_sync().is_some());
        assert!(resources.cabac_streamout().is_none());
        assert_eq!(resources.counter(CounterId::BackEndStart).read_dword(0), Some(0));
        assert!(backend
            .allocations()
            .contains(&("slice state streamout", SLICE_STATE_STREAMOUT_SIZE)));

        let mut backend = Backend::new(2);
        let resources =
            ScalabilityResources::new(&mut backend, Codec::Vp9, false, &Default::default())
                .unwrap();
        assert!(resources.slice_state_streamout().is_none());
        assert!(resources.fe_be_sync().is_none());
    }

    #[test]
    fn reallocation_on_growth_only() {
        let mut backend = Backend::new(2);
        let mut resources =
            ScalabilityResources::new(&mut backend, Codec::Hevc, false, &Default::default())
                .unwrap();
        let fixed = backend.allocations().len();

        resources.ensure_variable_buffers(&mut backend, &params(3840, 2160), true).unwrap();
        assert_eq!(backend.allocations().len(), fixed + 4);
        let cabac_4k = resources.cabac_streamout().unwrap().size;

        // Smaller picture: everything is kept.
        resources.ensure_variable_buffers(&mut backend, &params(1920, 1080), true).unwrap();
        assert_eq!(backend.allocations().len(), fixed + 4);
        assert_eq!(resources.cabac_streamout().unwrap().size, cabac_4k);

        // Larger picture: everything grows.
        resources.ensure_variable_buffers(&mut backend, &params(7680, 4320), true).unwrap();
        assert_eq!(backend.allocations().len(), fixed + 8);
        assert!(resources.cabac_streamout().unwrap().size > cabac_4k);
        for kind in VariableBuffer::ALL {
            assert!(resources.variable_buffer(kind).is_some());
        }
    }

    #[test]
    fn cabac_ring_toggles() {
        let mut backend = Backend::new(3);
        let mut resources =
            ScalabilityResources::new(&mut backend, Codec::Hevc, true, &Default::default())
                .unwrap();

        resources.ensure_variable_buffers(&mut backend, &params(3840, 2160), true).unwrap();
        let first = resources.cabac_streamout().unwrap().buffer.id();
        assert_eq!(resources.cabac_streamout_slot(), 0);

        resources.toggle_cabac_streamout();
        assert_eq!(resources.cabac_streamout_slot(), 1);
        assert!(resources.cabac_streamout().is_none());
        resources.ensure_variable_buffers(&mut backend, &params(3840, 2160), true).unwrap();
        let second = resources.cabac_streamout().unwrap().buffer.id();
        assert_ne!(first, second);

        resources.toggle_cabac_streamout();
        resources.ensure_variable_buffers(&mut backend, &params(3840, 2160), true).unwrap();
        assert_eq!(resources.cabac_streamout().unwrap().buffer.id(), first);
    }

    #[test]
    fn allocation_failure_keeps_previous_buffer() {
        let mut backend = Backend::new(2);
        let mut resources =
            ScalabilityResources::new(&mut backend, Codec::Hevc, false, &Default::default())
                .unwrap();
        resources.ensure_variable_buffers(&mut backend, &params(1920, 1080), true).unwrap();
        let previous = resources.cabac_streamout().unwrap().buffer.id();

        backend.fail_allocation_of = Some(VariableBuffer::CabacStreamout.name());
        let err = resources
            .ensure_variable_buffers(&mut backend, &params(3840, 2160), true)
            .unwrap_err();

        assert!(matches!(
            err,
            ScalabilityError::Backend(BackendError::AllocationFailure { .. })
        ));
        assert_eq!(resources.cabac_streamout().unwrap().buffer.id(), previous);
    }

    #[test]
    fn fixed_allocation_failure_propagates() {
        let mut backend = Backend::new(2);
        backend.fail_allocation_of = Some("completion semaphore");

        assert!(matches!(
            ScalabilityResources::new(&mut backend, Codec::Hevc, false, &Default::default()),
            Err(ScalabilityError::Backend(BackendError::AllocationFailure { .. }))
        ));
    }
}
