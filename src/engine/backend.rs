//! The kernel-facing half of C7/C10: spawning/attaching a debuggee and
//! pulling its raw debug-event stream, kept behind a trait for the same
//! reason `ResourceLayer` is -- the real Windows implementation and a fake
//! one used by tests share this seam.

use super::error::EngineError;
use super::handle::{OsHandle, ResourceLayer};

/// A raw exception as delivered by the kernel, before the event pump
/// classifies it into Breakpoint/SingleStep/Exception (§4.7 step 2-3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    pub code: u32,
    pub address: u64,
    pub flags: u32,
    /// Exception-specific parameters; for access violations (code
    /// `0xC0000005`), `parameters[0]` is 0=read/1=write/8=execute (DEP) and
    /// `parameters[1]` is the faulting address.
    pub parameters: Vec<u64>,
}

pub const EXCEPTION_BREAKPOINT: u32 = 0x8000_0003;
pub const EXCEPTION_SINGLE_STEP: u32 = 0x8000_0004;
pub const EXCEPTION_ACCESS_VIOLATION: u32 = 0xC000_0005;

/// One of the nine kinds the kernel can report (§4.7), still unclassified
/// between Exception/Breakpoint/SingleStep -- that split is the event
/// pump's job, not the backend's, since it only needs the exception code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    ProcessCreate {
        process_handle: OsHandle,
        thread_handle: OsHandle,
        image_base: u64,
        start_address: u64,
        teb_address: u64,
    },
    ProcessExit {
        exit_code: u32,
    },
    ThreadCreate {
        thread_handle: OsHandle,
        start_address: u64,
        teb_address: u64,
    },
    ThreadExit {
        exit_code: u32,
    },
    ModuleLoad {
        base_address: u64,
    },
    ModuleUnload {
        base_address: u64,
    },
    Exception {
        record: ExceptionRecord,
        first_chance: bool,
    },
}

/// One state-change, tagged with the process/thread it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDebugEvent {
    pub pid: u32,
    pub tid: u32,
    pub kind: RawEventKind,
}

/// Continuation codes returned to the kernel (§6).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    ExceptionNotHandled,
}

impl Continuation {
    /// `DBG_CONTINUE` / `DBG_EXCEPTION_NOT_HANDLED` as the kernel spells them.
    pub fn as_code(self) -> u32 {
        match self {
            Continuation::Continue => 0x0001_0002,
            Continuation::ExceptionNotHandled => 0x8000_0001,
        }
    }
}

/// The kernel-session half of the Handle/Resource Layer: spawning/attaching
/// and consuming `DbgUiWaitStateChange`/`DbgUiContinue` (or equivalent).
pub trait DebugBackend: ResourceLayer {
    /// Starts `command_line` suspended, under a debug session. The kernel
    /// reports the resulting `ProcessCreate` through the next `wait_event`,
    /// exactly as it would for a process the debugger merely attached to.
    fn spawn(&mut self, command_line: &str) -> Result<(), EngineError>;

    /// Attaches to an already-running process by pid.
    fn attach(&mut self, pid: u32) -> Result<(), EngineError>;

    /// Blocks up to `timeout_ms`. `Ok(None)` means the wait timed out with
    /// no event; `Ok(Some(_))` is one state-change to dispatch.
    fn wait_event(&mut self, timeout_ms: u32) -> Result<Option<RawDebugEvent>, EngineError>;

    /// Resumes the debuggee after the event named by `(pid, tid)`, with the
    /// continuation code the user hook (or its default) produced.
    fn continue_event(&mut self, pid: u32, tid: u32, status: Continuation) -> Result<(), EngineError>;
}
