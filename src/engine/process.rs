//! Process (C8, §3): the debuggee's identity plus the threads/modules/
//! breakpoints it owns. Created on `ProcessCreate`, destroyed after the
//! `on_process_exit` hook returns (§5 Shared resources).

use std::collections::BTreeMap;

use super::breakpoint::Breakpoint;
use super::error::EngineError;
use super::handle::{MemoryInfo, MemoryProtect, OsHandle, ResourceLayer};
use super::module::{Location, Module};
use super::thread::Thread;

pub struct Process {
    pub pid: u32,
    pub handle: OsHandle,
    pub base_address: u64,
    /// Key into `modules`; equals `base_address` between the image's
    /// `ModuleLoad` and its `ModuleUnload` (§3 invariant).
    pub image: Option<u64>,
    /// Key into `threads`; the first thread created, remains valid until
    /// that thread exits (§3 invariant).
    pub initial_thread: Option<u32>,
    pub exit_status: Option<u32>,

    pub threads: BTreeMap<u32, Thread>,
    pub modules: BTreeMap<u64, Module>,
    pub breakpoints: BTreeMap<u64, Breakpoint>,
}

impl Process {
    pub fn new(pid: u32, handle: OsHandle, base_address: u64) -> Self {
        Process {
            pid,
            handle,
            base_address,
            image: None,
            initial_thread: None,
            exit_status: None,
            threads: BTreeMap::new(),
            modules: BTreeMap::new(),
            breakpoints: BTreeMap::new(),
        }
    }

    pub fn read_memory(&self, resource: &dyn ResourceLayer, addr: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        resource.read_memory(self.handle, addr, len)
    }

    pub fn write_memory(&self, resource: &dyn ResourceLayer, addr: u64, bytes: &[u8]) -> Result<(), EngineError> {
        resource.write_memory(self.handle, addr, bytes)
    }

    pub fn query_memory(&self, resource: &dyn ResourceLayer, addr: u64) -> Result<MemoryInfo, EngineError> {
        resource.query_memory(self.handle, addr)
    }

    pub fn protect_memory(
        &self,
        resource: &dyn ResourceLayer,
        addr: u64,
        len: usize,
        new: MemoryProtect,
    ) -> Result<MemoryProtect, EngineError> {
        resource.protect_memory(self.handle, addr, len, new)
    }

    pub fn query_section_name(&self, resource: &dyn ResourceLayer, addr: u64) -> Result<String, EngineError> {
        resource.query_section_name(self.handle, addr)
    }

    pub fn terminate(&self, resource: &dyn ResourceLayer, exit_code: u32) -> Result<(), EngineError> {
        resource.terminate(self.handle, exit_code)
    }

    /// The module containing `addr`, if any, found by walking each known
    /// module's mapped range (resolved lazily through `Module::mapped_size`).
    pub fn get_module_from_va(&self, resource: &dyn ResourceLayer, addr: u64) -> Option<&Module> {
        self.modules.values().find(|m| {
            let size = m.mapped_size(resource, self.handle).unwrap_or(0);
            addr >= m.base_address && addr < m.base_address + size
        })
    }

    /// `module!+rva` when `addr` falls inside a known module, a bare RVA
    /// (relative to nothing, i.e. the raw address) otherwise (§3 [SUPPLEMENT]).
    pub fn get_location_from_va(&self, resource: &dyn ResourceLayer, addr: u64) -> Location {
        match self.get_module_from_va(resource, addr) {
            Some(m) => Location {
                module_name: m.path(resource, self.handle).ok(),
                rva: (addr - m.base_address) as u32,
            },
            None => Location { module_name: None, rva: addr as u32 },
        }
    }

    /// Returns the breakpoint tracked at `addr`, creating an unarmed one on
    /// first request -- repeated calls return the same object (§4.6).
    pub fn get_breakpoint(&mut self, addr: u64) -> &mut Breakpoint {
        self.breakpoints
            .entry(addr)
            .or_insert_with(|| Breakpoint::new(self.pid, addr))
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("base_address", &format_args!("{:#010x}", self.base_address))
            .field("exit_status", &self.exit_status)
            .field("threads", &self.threads.len())
            .field("modules", &self.modules.len())
            .field("breakpoints", &self.breakpoints.len())
            .finish()
    }
}
