// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This file contains a dummy backend that records everything it is asked to do, so the
//! scalability code can be tested in isolation. Command buffers can then be run by the
//! [`executor`] to check how the pipes interact.

pub mod executor;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow::anyhow;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use nix::sys::eventfd::EfdFlags;
use nix::sys::eventfd::EventFd;

use crate::backend::AtomicOp;
use crate::backend::BackendError;
use crate::backend::BackendResult;
use crate::backend::BufferIndex;
use crate::backend::CommandStream;
use crate::backend::ContextId;
use crate::backend::HwRegister;
use crate::backend::ScalabilityBackend;

/// Memory shared between the command streams. Clones refer to the same memory.
#[derive(Clone)]
pub struct Buffer {
    id: u32,
    name: &'static str,
    memory: Rc<RefCell<Vec<u8>>>,
}

impl Buffer {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.memory.borrow().len()
    }

    /// Reads the 32-bit word at `offset`, if it lies within the buffer.
    pub fn read_dword(&self, offset: usize) -> Option<u32> {
        let memory = self.memory.borrow();
        memory
            .get(offset..offset.checked_add(4)?)
            .map(LittleEndian::read_u32)
    }

    /// Writes the 32-bit word at `offset`. Returns `None` if it does not lie within the buffer.
    pub fn write_dword(&self, offset: usize, value: u32) -> Option<()> {
        let mut memory = self.memory.borrow_mut();
        let dword = memory.get_mut(offset..offset.checked_add(4)?)?;
        LittleEndian::write_u32(dword, value);

        Some(())
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// A recorded command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    WatchdogStart,
    WatchdogStop,
    Atomic {
        target: Buffer,
        op: AtomicOp,
    },
    WaitUntilEqual {
        target: Buffer,
        value: u32,
    },
    StoreDword {
        target: Buffer,
        offset: usize,
        value: u32,
    },
    ConditionalEnd {
        target: Buffer,
        offset: usize,
        compare: u32,
    },
    StoreRegister {
        target: Buffer,
        offset: usize,
        register: HwRegister,
    },
    StoreStreamoutOverflow {
        status: Buffer,
        offset: usize,
        allocated_size: u32,
    },
    /// Decoding work, identified by a label.
    Work(String),
}

#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    /// Records decoding work labeled `label`.
    pub fn push_work<S: Into<String>>(&mut self, label: S) {
        self.commands.push(Command::Work(label.into()));
    }
}

impl CommandStream for CommandBuffer {
    type Buffer = Buffer;

    fn watchdog_start(&mut self) -> BackendResult<()> {
        self.commands.push(Command::WatchdogStart);
        Ok(())
    }

    fn watchdog_stop(&mut self) -> BackendResult<()> {
        self.commands.push(Command::WatchdogStop);
        Ok(())
    }

    fn atomic(&mut self, target: &Buffer, op: AtomicOp) -> BackendResult<()> {
        self.commands.push(Command::Atomic {
            target: target.clone(),
            op,
        });
        Ok(())
    }

    fn wait_until_equal(&mut self, target: &Buffer, value: u32) -> BackendResult<()> {
        self.commands.push(Command::WaitUntilEqual {
            target: target.clone(),
            value,
        });
        Ok(())
    }

    fn store_dword(&mut self, target: &Buffer, offset: usize, value: u32) -> BackendResult<()> {
        self.commands.push(Command::StoreDword {
            target: target.clone(),
            offset,
            value,
        });
        Ok(())
    }

    fn conditional_end(&mut self, target: &Buffer, offset: usize, compare: u32) -> BackendResult<()> {
        self.commands.push(Command::ConditionalEnd {
            target: target.clone(),
            offset,
            compare,
        });
        Ok(())
    }

    fn store_register(
        &mut self,
        target: &Buffer,
        offset: usize,
        register: HwRegister,
    ) -> BackendResult<()> {
        self.commands.push(Command::StoreRegister {
            target: target.clone(),
            offset,
            register,
        });
        Ok(())
    }

    fn store_streamout_overflow(
        &mut self,
        status: &Buffer,
        offset: usize,
        allocated_size: u32,
    ) -> BackendResult<()> {
        self.commands.push(Command::StoreStreamoutOverflow {
            status: status.clone(),
            offset,
            allocated_size,
        });
        Ok(())
    }
}

/// Synchronization object backed by an event file descriptor.
pub struct SyncObject {
    id: u32,
    event: EventFd,
}

impl SyncObject {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Debug for SyncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync#{}", self.id)
    }
}

/// Backend calls other than command emission, in the order they were made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ContextCreated { context: ContextId, ring_count: u8 },
    CompletionNotifyRegistered(ContextId),
    ContextSet(ContextId),
    EngineSignal { context: ContextId, sync: u32 },
    EngineWait { context: ContextId, sync: u32 },
}

/// Dummy backend with `num_vdbox` engines.
pub struct Backend {
    num_vdbox: u8,
    secondary_buffers: bool,
    next_id: u32,
    allocations: Vec<(&'static str, usize)>,
    command_buffers: BTreeMap<BufferIndex, CommandBuffer>,
    contexts: Vec<(ContextId, u8)>,
    current_context: Option<ContextId>,
    events: Vec<Event>,
    /// Name of the buffer whose allocation should fail.
    pub fail_allocation_of: Option<&'static str>,
}

impl Backend {
    pub fn new(num_vdbox: u8) -> Self {
        Self {
            num_vdbox,
            secondary_buffers: true,
            next_id: 0,
            allocations: vec![],
            command_buffers: Default::default(),
            contexts: vec![],
            current_context: None,
            events: vec![],
            fail_allocation_of: None,
        }
    }

    /// Makes the backend report that it cannot use secondary command buffers.
    pub fn without_secondary_buffers(mut self) -> Self {
        self.secondary_buffers = false;
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Name and size of every allocation made so far.
    pub fn allocations(&self) -> &[(&'static str, usize)] {
        &self.allocations
    }

    pub fn current_context(&self) -> Option<ContextId> {
        self.current_context
    }

    /// Ring count of `context`, if it has been created.
    pub fn context_ring_count(&self, context: ContextId) -> Option<u8> {
        self.contexts
            .iter()
            .rev()
            .find(|(id, _)| *id == context)
            .map(|(_, ring_count)| *ring_count)
    }

    /// Takes all the command buffers recorded so far, leaving them empty.
    pub fn take_command_buffers(&mut self) -> Vec<(BufferIndex, CommandBuffer)> {
        std::mem::take(&mut self.command_buffers)
            .into_iter()
            .collect()
    }

    /// Takes the command buffers listed in `rings` and concatenates the buffers of each ring
    /// into one stream.
    pub fn take_streams(&mut self, rings: &[Vec<BufferIndex>]) -> Vec<Vec<Command>> {
        rings
            .iter()
            .map(|ring| {
                ring.iter()
                    .filter_map(|index| self.command_buffers.remove(index))
                    .flat_map(CommandBuffer::into_commands)
                    .collect()
            })
            .collect()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl ScalabilityBackend for Backend {
    type Buffer = Buffer;
    type SyncObject = SyncObject;
    type CommandBuffer = CommandBuffer;

    fn num_vdbox(&self) -> u8 {
        self.num_vdbox
    }

    fn supports_secondary_buffers(&self) -> bool {
        self.secondary_buffers
    }

    fn allocate_buffer(&mut self, name: &'static str, size: usize) -> BackendResult<Buffer> {
        if self.fail_allocation_of == Some(name) {
            return Err(BackendError::AllocationFailure { name, size });
        }

        self.allocations.push((name, size));

        Ok(Buffer {
            id: self.next_id(),
            name,
            memory: Rc::new(RefCell::new(vec![0; size])),
        })
    }

    fn create_sync_object(&mut self) -> BackendResult<SyncObject> {
        let event = EventFd::from_flags(EfdFlags::EFD_NONBLOCK)
            .map_err(|e| anyhow!("failed to create sync object: {}", e))?;

        Ok(SyncObject {
            id: self.next_id(),
            event,
        })
    }

    fn get_command_buffer(&mut self, index: BufferIndex) -> BackendResult<CommandBuffer> {
        if index != BufferIndex::Primary && !self.secondary_buffers {
            return Err(anyhow!("secondary command buffers are not supported").into());
        }

        Ok(self.command_buffers.remove(&index).unwrap_or_default())
    }

    fn return_command_buffer(
        &mut self,
        index: BufferIndex,
        buffer: CommandBuffer,
    ) -> BackendResult<()> {
        self.command_buffers.insert(index, buffer);
        Ok(())
    }

    fn create_context(&mut self, context: ContextId, ring_count: u8) -> BackendResult<()> {
        if ring_count == 0 || ring_count > self.num_vdbox {
            return Err(anyhow!("cannot create {:?} with {} rings", context, ring_count).into());
        }

        self.contexts.push((context, ring_count));
        self.events.push(Event::ContextCreated {
            context,
            ring_count,
        });
        Ok(())
    }

    fn register_completion_notify(&mut self, context: ContextId) -> BackendResult<()> {
        self.events.push(Event::CompletionNotifyRegistered(context));
        Ok(())
    }

    fn set_context(&mut self, context: ContextId) -> BackendResult<()> {
        if self.context_ring_count(context).is_none() {
            return Err(anyhow!("{:?} has not been created", context).into());
        }

        self.current_context = Some(context);
        self.events.push(Event::ContextSet(context));
        Ok(())
    }

    fn engine_signal(&mut self, context: ContextId, sync: &SyncObject) -> BackendResult<()> {
        sync.event
            .write(1)
            .map_err(|e| anyhow!("failed to signal sync object {}: {}", sync.id, e))?;

        self.events.push(Event::EngineSignal {
            context,
            sync: sync.id,
        });
        Ok(())
    }

    fn engine_wait(&mut self, context: ContextId, sync: &SyncObject) -> BackendResult<()> {
        // The event is non-blocking: waiting on an object that was never signaled would hang
        // forever on real hardware, report it instead.
        sync.event
            .read()
            .map_err(|e| anyhow!("sync object {} waited on but not signaled: {}", sync.id, e))?;

        self.events.push(Event::EngineWait {
            context,
            sync: sync.id,
        });
        Ok(())
    }
}
