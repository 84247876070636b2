//! Breakpoint Manager (C9, §4.6): per-process software breakpoints armed by
//! byte-patching through the `ResourceLayer`, plus the declared-only
//! hardware breakpoint interface (§9: `HwBreakpoint::Io` is exposed but
//! rejected by `arm`, and arming is otherwise "not actually implemented").

use tracing::{debug, warn};

use super::error::EngineError;
use super::handle::{MemoryProtect, OsHandle, ResourceLayer};
use super::module::ProcessRef;

const INT3: u8 = 0xCC;

/// A software breakpoint, unique per `(process, address)` (§3). Armed iff
/// `saved_byte.is_some()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub process: ProcessRef,
    pub address: u64,
    saved_byte: Option<u8>,
    pub auto_rearm: bool,
}

impl Breakpoint {
    pub fn new(process: ProcessRef, address: u64) -> Self {
        Breakpoint {
            process,
            address,
            saved_byte: None,
            auto_rearm: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.saved_byte.is_some()
    }

    /// Lifts protection to RW, saves the original byte, writes `0xCC`,
    /// restores protection, then verifies the readback (§4.6, §5 breakpoint
    /// consistency: two concurrent arms of the same address are forbidden --
    /// enforced by the `is_armed` precondition, since only one arm can ever
    /// be in flight on this single-threaded event-pump model).
    pub fn arm(&mut self, resource: &dyn ResourceLayer, process_handle: OsHandle) -> Result<(), EngineError> {
        if self.is_armed() {
            return Err(EngineError::InvalidOperation);
        }

        let old_protect = resource.protect_memory(process_handle, self.address, 1, MemoryProtect::READWRITE)?;
        let original = resource.read_memory(process_handle, self.address, 1)?;
        let original_byte = *original.first().ok_or(EngineError::BreakpointArmFailed { readback: None })?;

        resource.write_memory(process_handle, self.address, &[INT3])?;
        resource.protect_memory(process_handle, self.address, 1, old_protect)?;

        let readback = resource.read_memory(process_handle, self.address, 1)?;
        match readback.first() {
            Some(&INT3) => {
                self.saved_byte = Some(original_byte);
                debug!(address = format_args!("{:#010x}", self.address), "breakpoint armed");
                Ok(())
            }
            other => {
                warn!(address = format_args!("{:#010x}", self.address), "breakpoint arm readback mismatch");
                Err(EngineError::BreakpointArmFailed { readback: other.copied() })
            }
        }
    }

    /// Lifts protection, restores the saved byte, restores protection, and
    /// clears `saved_byte`.
    pub fn disarm(&mut self, resource: &dyn ResourceLayer, process_handle: OsHandle) -> Result<(), EngineError> {
        let saved = self.saved_byte.ok_or(EngineError::InvalidOperation)?;

        let old_protect = resource.protect_memory(process_handle, self.address, 1, MemoryProtect::READWRITE)?;
        resource.write_memory(process_handle, self.address, &[saved])?;
        resource.protect_memory(process_handle, self.address, 1, old_protect)?;

        self.saved_byte = None;
        debug!(address = format_args!("{:#010x}", self.address), "breakpoint disarmed");
        Ok(())
    }
}

/// Kind of access a hardware breakpoint traps on (§3). `Io` is declared but
/// not actually implemented upstream; `arm` rejects it outright.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HwBreakpointKind {
    Execute,
    Write,
    ReadWrite,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwBreakpoint {
    pub process: ProcessRef,
    pub address: u64,
    pub kind: HwBreakpointKind,
}

impl HwBreakpoint {
    pub fn new(process: ProcessRef, address: u64, kind: HwBreakpointKind) -> Self {
        HwBreakpoint { process, address, kind }
    }

    /// Declared interface only (§4.6/§9): `HwBreakpoint` maps onto DR0-DR3
    /// and triggers via single-step, but arming them was never completed
    /// upstream, for any kind -- `Io` is additionally documented as not
    /// actually implemented, so it gets the same answer for a different
    /// reason.
    pub fn arm(&self) -> Result<(), EngineError> {
        Err(EngineError::InvalidOperation)
    }
}
