// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface to the hardware command layer.
//!
//! A backend provides the memory, command buffers, execution contexts and synchronization
//! objects the scalability code needs, and knows how to encode the handful of synchronization
//! primitives it emits into command buffers. The bit-level encoding of these primitives is the
//! backend's business: this module only names them.
//!
//! All resources are owned values: dropping them releases them.

pub mod dummy;

use thiserror::Error;

/// Error returned by backend methods.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to allocate {size} bytes for {name}")]
    AllocationFailure { name: &'static str, size: usize },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type returned by backend methods.
pub type BackendResult<T> = Result<T, BackendError>;

/// Logical index of a command buffer.
///
/// The primary buffer is the one submitted to the hardware. Secondary buffers hold the command
/// streams of the individual pipes and are chained to the primary at submission time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferIndex {
    Primary,
    Secondary(u8),
}

impl BufferIndex {
    /// Returns the index as understood by command buffer providers that number the primary
    /// buffer 0 and secondary buffer `n` as `n + 1`.
    pub fn plus_one(&self) -> u32 {
        match self {
            BufferIndex::Primary => 0,
            BufferIndex::Secondary(index) => u32::from(*index) + 1,
        }
    }
}

/// Execution contexts used for decoding.
///
/// Contexts differ by the number of parallel logical rings they expose, which must match the
/// number of command streams submitted at once.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContextId {
    /// Single ring video context, also used for legacy decoding.
    Video,
    /// Two rings.
    VideoMultiPipe,
    /// Three rings or more.
    VideoTriplePipe,
    /// Context the front-end phase runs on when it is submitted separately.
    FrontEnd,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomicOp {
    Increment,
    Decrement,
}

/// Hardware registers whose value can be stored into memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HwRegister {
    /// Identifier of the engine executing the command stream.
    CsEngineId,
}

/// A command stream the synchronization primitives can be written into.
///
/// All primitives operating on a buffer address the 32-bit word at the start of it, unless an
/// offset is given.
pub trait CommandStream {
    /// Memory type the primitives operate on.
    type Buffer;

    /// Arms the hang-detection watchdog of the engine.
    fn watchdog_start(&mut self) -> BackendResult<()>;
    /// Disarms the hang-detection watchdog of the engine.
    fn watchdog_stop(&mut self) -> BackendResult<()>;
    /// Atomically increments or decrements the counter in `target`.
    fn atomic(&mut self, target: &Self::Buffer, op: AtomicOp) -> BackendResult<()>;
    /// Stalls the stream until the counter in `target` equals `value`.
    fn wait_until_equal(&mut self, target: &Self::Buffer, value: u32) -> BackendResult<()>;
    /// Writes `value` at `offset` in `target`.
    fn store_dword(
        &mut self,
        target: &Self::Buffer,
        offset: usize,
        value: u32,
    ) -> BackendResult<()>;
    /// Ends the stream early if the word at `offset` in `target` is lower than or equal to
    /// `compare`.
    fn conditional_end(
        &mut self,
        target: &Self::Buffer,
        offset: usize,
        compare: u32,
    ) -> BackendResult<()>;
    /// Stores the value of `register` at `offset` in `target`.
    fn store_register(
        &mut self,
        target: &Self::Buffer,
        offset: usize,
        register: HwRegister,
    ) -> BackendResult<()>;
    /// Writes `u32::MAX` at `offset` in `status` if the size of the data written to the CABAC
    /// streamout buffer is lower than `allocated_size`, `0` otherwise.
    ///
    /// A zero flag thus means the streamout buffer overflowed.
    fn store_streamout_overflow(
        &mut self,
        status: &Self::Buffer,
        offset: usize,
        allocated_size: u32,
    ) -> BackendResult<()>;
}

/// Trait for the hardware command layer the scalability code runs on.
pub trait ScalabilityBackend {
    /// Graphics memory. Dropping it frees the memory.
    type Buffer;
    /// Cross-submission synchronization object. Dropping it destroys the object.
    type SyncObject;
    /// Command buffer obtained with [`ScalabilityBackend::get_command_buffer`].
    type CommandBuffer: CommandStream<Buffer = Self::Buffer>;

    /// Number of video decode engines available.
    fn num_vdbox(&self) -> u8;

    /// Whether secondary command buffers can be used. If not, every stream goes into the
    /// primary buffer.
    fn supports_secondary_buffers(&self) -> bool {
        true
    }

    /// Allocates `size` bytes of zero-filled memory. `name` is used for debugging only.
    fn allocate_buffer(&mut self, name: &'static str, size: usize) -> BackendResult<Self::Buffer>;

    fn create_sync_object(&mut self) -> BackendResult<Self::SyncObject>;

    /// Gets the command buffer at `index`. Commands previously written to it during this frame
    /// are preserved.
    fn get_command_buffer(&mut self, index: BufferIndex) -> BackendResult<Self::CommandBuffer>;

    /// Gives back a command buffer obtained with [`ScalabilityBackend::get_command_buffer`].
    fn return_command_buffer(
        &mut self,
        index: BufferIndex,
        buffer: Self::CommandBuffer,
    ) -> BackendResult<()>;

    /// Creates `context` with `ring_count` parallel logical rings.
    fn create_context(&mut self, context: ContextId, ring_count: u8) -> BackendResult<()>;

    /// Requests completion events for submissions made on `context`.
    fn register_completion_notify(&mut self, context: ContextId) -> BackendResult<()>;

    /// Makes `context` the target of the next submissions.
    fn set_context(&mut self, context: ContextId) -> BackendResult<()>;

    /// Signals `sync` once the work submitted so far on `context` completes.
    fn engine_signal(&mut self, context: ContextId, sync: &Self::SyncObject) -> BackendResult<()>;

    /// Makes further work on `context` wait for `sync` to be signaled.
    fn engine_wait(&mut self, context: ContextId, sync: &Self::SyncObject) -> BackendResult<()>;
}
