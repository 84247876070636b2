//! The debugger engine (C7-C11): handle/resource primitives, the process/
//! thread/module model, the breakpoint manager, the event pump, and the
//! facade that aggregates them. See `decoder` for the instruction side
//! (C1-C6).

pub mod backend;
pub mod breakpoint;
pub mod debugger;
pub mod error;
pub mod event;
pub mod event_pump;
pub mod handle;
pub mod hooks;
pub mod module;
pub mod process;
pub mod sampler;
pub mod thread;

#[cfg(windows)]
pub mod windows_backend;

pub use backend::{Continuation, DebugBackend, ExceptionRecord, RawDebugEvent, RawEventKind};
pub use breakpoint::{Breakpoint, HwBreakpoint, HwBreakpointKind};
pub use debugger::Debugger;
pub use error::{EngineError, NtStatus};
pub use event::{AccessViolation, AccessViolationKind, ExceptionInfo};
pub use handle::{EFlags, MemoryInfo, MemoryProtect, MemoryState, OsHandle, ResourceLayer, ThreadContext};
pub use hooks::DebuggerHooks;
pub use module::{Location, Module};
pub use process::Process;
pub use sampler::{ActivitySampler, ProcessTimeSource};
pub use thread::Thread;
