//! An in-memory `DebugBackend`/`ResourceLayer` double, standing in for a real
//! debuggee the way the public facade's own seam was built for (see
//! `engine::handle::ResourceLayer`'s doc comment). Lets the event pump and
//! breakpoint manager run end-to-end without a Windows debuggee.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use metalbones::engine::{
    Continuation, DebugBackend, EngineError, MemoryInfo, MemoryProtect, MemoryState, NtStatus,
    OsHandle, RawDebugEvent, ResourceLayer, ThreadContext,
};

struct Region {
    base: u64,
    size: u64,
    protect: RefCell<MemoryProtect>,
    bytes: RefCell<Vec<u8>>,
    section_name: Option<String>,
}

fn fake_err(call: &'static str) -> EngineError {
    EngineError::Os(NtStatus::new(call, 0))
}

/// A single fake debuggee's address space, handle table, and queued event
/// stream. Regions and contexts use interior mutability so the `ResourceLayer`
/// methods can stay `&self`, matching the real backend's signatures.
#[derive(Default)]
pub struct FakeBackend {
    regions: Vec<Region>,
    contexts: RefCell<HashMap<OsHandle, ThreadContext>>,
    events: RefCell<VecDeque<RawDebugEvent>>,
    pub spawned: RefCell<Vec<String>>,
    pub attached: RefCell<Vec<u32>>,
    pub continuations: RefCell<Vec<(u32, u32, Continuation)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend::default()
    }

    pub fn add_region(&mut self, base: u64, size: u64, protect: MemoryProtect, section_name: Option<&str>) {
        self.regions.push(Region {
            base,
            size,
            protect: RefCell::new(protect),
            bytes: RefCell::new(vec![0u8; size as usize]),
            section_name: section_name.map(str::to_owned),
        });
    }

    pub fn seed_context(&self, thread: OsHandle, context: ThreadContext) {
        self.contexts.borrow_mut().insert(thread, context);
    }

    pub fn push_event(&mut self, event: RawDebugEvent) {
        self.events.borrow_mut().push_back(event);
    }

    fn region_at(&self, addr: u64) -> Option<&Region> {
        self.regions.iter().find(|r| addr >= r.base && addr < r.base + r.size)
    }
}

impl ResourceLayer for FakeBackend {
    fn read_memory(&self, _process: OsHandle, addr: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        let region = self.region_at(addr).ok_or_else(|| fake_err("ReadProcessMemory"))?;
        let bytes = region.bytes.borrow();
        let start = (addr - region.base) as usize;
        let end = (start + len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn write_memory(&self, _process: OsHandle, addr: u64, data: &[u8]) -> Result<(), EngineError> {
        let region = self.region_at(addr).ok_or_else(|| fake_err("WriteProcessMemory"))?;
        let mut bytes = region.bytes.borrow_mut();
        let start = (addr - region.base) as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn query_memory(&self, _process: OsHandle, addr: u64) -> Result<MemoryInfo, EngineError> {
        let region = self.region_at(addr).ok_or_else(|| fake_err("VirtualQueryEx"))?;
        Ok(MemoryInfo {
            base: region.base,
            size: region.size,
            state: MemoryState::Commit,
            protect: *region.protect.borrow(),
        })
    }

    fn protect_memory(
        &self,
        _process: OsHandle,
        addr: u64,
        _len: usize,
        new: MemoryProtect,
    ) -> Result<MemoryProtect, EngineError> {
        let region = self.region_at(addr).ok_or_else(|| fake_err("VirtualProtectEx"))?;
        let old = *region.protect.borrow();
        *region.protect.borrow_mut() = new;
        Ok(old)
    }

    fn query_section_name(&self, _process: OsHandle, addr: u64) -> Result<String, EngineError> {
        let region = self.region_at(addr).ok_or_else(|| fake_err("GetMappedFileNameW"))?;
        region.section_name.clone().ok_or_else(|| fake_err("GetMappedFileNameW"))
    }

    fn terminate(&self, _process: OsHandle, _exit_code: u32) -> Result<(), EngineError> {
        Ok(())
    }

    fn get_context(&self, thread: OsHandle) -> Result<ThreadContext, EngineError> {
        self.contexts.borrow().get(&thread).copied().ok_or_else(|| fake_err("GetThreadContext"))
    }

    fn set_context(&self, thread: OsHandle, context: &ThreadContext) -> Result<(), EngineError> {
        self.contexts.borrow_mut().insert(thread, *context);
        Ok(())
    }

    fn suspend_thread(&self, _thread: OsHandle) -> Result<u32, EngineError> {
        Ok(0)
    }

    fn resume_thread(&self, _thread: OsHandle) -> Result<u32, EngineError> {
        Ok(0)
    }

    fn close_handle(&self, _handle: OsHandle) {}
}

impl DebugBackend for FakeBackend {
    fn spawn(&mut self, command_line: &str) -> Result<(), EngineError> {
        self.spawned.borrow_mut().push(command_line.to_string());
        Ok(())
    }

    fn attach(&mut self, pid: u32) -> Result<(), EngineError> {
        self.attached.borrow_mut().push(pid);
        Ok(())
    }

    fn wait_event(&mut self, _timeout_ms: u32) -> Result<Option<RawDebugEvent>, EngineError> {
        Ok(self.events.borrow_mut().pop_front())
    }

    fn continue_event(&mut self, pid: u32, tid: u32, status: Continuation) -> Result<(), EngineError> {
        self.continuations.borrow_mut().push((pid, tid, status));
        Ok(())
    }
}
