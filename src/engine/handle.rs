//! Handle/Resource Layer (C7): OS handle ownership and the VM read/write/
//! query/protect/context primitives every other engine component is built
//! on. Kept as a trait (`ResourceLayer`) so the real Windows backend and a
//! fake in-memory one (used by tests, see `tests/event_pump.rs`) can sit
//! behind the same seam -- the same "swap the backend behind a trait" shape
//! the teacher uses for its own `Coprocessor`/`Memory` traits.

use bitflags::bitflags;

use super::error::EngineError;

/// An opaque OS handle. On Windows this is a raw `HANDLE` smuggled through
/// as a `usize`; elsewhere it's just an opaque identifier a fake backend
/// hands out. Non-owning: the handle is closed by whichever `ResourceLayer`
/// call created it, driven by the owning model object's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OsHandle(pub usize);

impl OsHandle {
    pub const NULL: OsHandle = OsHandle(0);
}

bitflags! {
    /// Page protection flags, carried from `dbg.py`'s `Process` constants
    /// (`PAGE_NOACCESS`, `PAGE_READWRITE`, ...) as a bitflags type so
    /// `protect_memory`/`query_memory` callers can test bits instead of
    /// matching on raw Win32 protection constants.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MemoryProtect: u32 {
        const NOACCESS          = 0x0000_0001;
        const READONLY          = 0x0000_0002;
        const READWRITE         = 0x0000_0004;
        const WRITECOPY         = 0x0000_0008;
        const EXECUTE           = 0x0000_0010;
        const EXECUTE_READ      = 0x0000_0020;
        const EXECUTE_READWRITE = 0x0000_0040;
        const EXECUTE_WRITECOPY = 0x0000_0080;
        const GUARD             = 0x0000_0100;
        const NOCACHE           = 0x0000_0200;
        const WRITECOMBINE      = 0x0000_0400;
    }
}

/// Mirrors the Win32 `MEMORY_BASIC_INFORMATION.State` field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryState {
    Commit,
    Reserve,
    Free,
}

/// Result of `query_memory`: the region's allocation base, size, commit
/// state and current protection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub base: u64,
    pub size: u64,
    pub state: MemoryState,
    pub protect: MemoryProtect,
}

bitflags! {
    /// Named EFLAGS bits (§ GLOSSARY: TF). Only the bits the engine or its
    /// tests ever inspect are named; the rest pass through untouched.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const CF = 1 << 0;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const TF = 1 << 8;
        const IF = 1 << 9;
        const DF = 1 << 10;
        const OF = 1 << 11;
    }
}

/// Register state for one thread (§6 Thread API: `context`). Covers the
/// general-purpose registers, EFLAGS, segment selectors, and debug
/// registers; `Rd`/`Cd`/`Dd` decoder operands address the same register
/// space this struct models.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ThreadContext {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags_raw: u32,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub dr0: u32,
    pub dr1: u32,
    pub dr2: u32,
    pub dr3: u32,
    pub dr6: u32,
    pub dr7: u32,
}

impl ThreadContext {
    pub fn eflags(&self) -> EFlags {
        EFlags::from_bits_truncate(self.eflags_raw)
    }

    pub fn set_eflags(&mut self, flags: EFlags) {
        self.eflags_raw = flags.bits();
    }

    pub fn trap_flag(&self) -> bool {
        self.eflags().contains(EFlags::TF)
    }

    pub fn set_trap_flag(&mut self, enabled: bool) {
        let mut flags = self.eflags();
        flags.set(EFlags::TF, enabled);
        self.set_eflags(flags);
    }
}

/// The VM and handle primitives of §4.5. Each method maps to a single OS
/// call; failures surface as `EngineError::Os(NtStatus)` and never abort
/// event delivery.
pub trait ResourceLayer {
    fn read_memory(&self, process: OsHandle, addr: u64, len: usize) -> Result<Vec<u8>, EngineError>;
    fn write_memory(&self, process: OsHandle, addr: u64, bytes: &[u8]) -> Result<(), EngineError>;
    fn query_memory(&self, process: OsHandle, addr: u64) -> Result<MemoryInfo, EngineError>;
    fn protect_memory(
        &self,
        process: OsHandle,
        addr: u64,
        len: usize,
        new: MemoryProtect,
    ) -> Result<MemoryProtect, EngineError>;
    fn query_section_name(&self, process: OsHandle, addr: u64) -> Result<String, EngineError>;
    fn terminate(&self, process: OsHandle, exit_code: u32) -> Result<(), EngineError>;

    fn get_context(&self, thread: OsHandle) -> Result<ThreadContext, EngineError>;
    fn set_context(&self, thread: OsHandle, context: &ThreadContext) -> Result<(), EngineError>;
    fn suspend_thread(&self, thread: OsHandle) -> Result<u32, EngineError>;
    fn resume_thread(&self, thread: OsHandle) -> Result<u32, EngineError>;

    fn close_handle(&self, handle: OsHandle);
}
