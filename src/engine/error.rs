//! Error taxonomy (§7): decoder errors live in `decoder::state::DecodeError`;
//! this module covers everything the engine (C7-C11) can fail with.

/// A raw NT status / `GetLastError` code paired with the call that produced
/// it, so log messages can name the failing primitive (mirrors how
/// `CpuException` variants in the teacher's `core::cpu` carry the faulting
/// address instead of a bare code).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NtStatus {
    pub code: u32,
    pub call: &'static str,
}

impl NtStatus {
    pub fn new(call: &'static str, code: u32) -> Self {
        NtStatus { code, call }
    }
}

impl std::fmt::Display for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed with status 0x{:08X}", self.call, self.code)
    }
}

/// Engine-wide error type (§7). VM errors surface from the specific VM call
/// and never abort event delivery; breakpoint errors surface from arm/disarm;
/// none of these unwind the event pump itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A single OS call failed; see `NtStatus` for the code and call name.
    Os(NtStatus),
    /// Arming an already-armed breakpoint, or disarming a disarmed one.
    InvalidOperation,
    /// Arm succeeded in writing `0xCC` but the readback didn't match.
    BreakpointArmFailed { readback: Option<u8> },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Os(status) => write!(f, "{status}"),
            EngineError::InvalidOperation => write!(f, "invalid operation for current breakpoint state"),
            EngineError::BreakpointArmFailed { readback } => match readback {
                Some(b) => write!(f, "breakpoint arm readback mismatch: got 0x{b:02X}, expected 0xCC"),
                None => write!(f, "breakpoint arm readback failed: could not re-read memory"),
            },
        }
    }
}

impl std::error::Error for EngineError {}

impl From<NtStatus> for EngineError {
    fn from(status: NtStatus) -> Self {
        EngineError::Os(status)
    }
}
