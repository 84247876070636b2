//! Event classification types shared between the pump and the hook trait.

use super::backend::ExceptionRecord;

/// An access-violation's expanded classification (§4.7): read/write/DEP,
/// plus the faulting address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessViolationKind {
    Read,
    Write,
    Dep,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessViolation {
    pub kind: AccessViolationKind,
    pub target_address: u64,
}

/// What `on_exception` receives: the raw record, plus its access-violation
/// classification when applicable. Everything else passes through unclassified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub record: ExceptionRecord,
    pub access_violation: Option<AccessViolation>,
}

impl ExceptionInfo {
    pub fn classify(record: ExceptionRecord) -> Self {
        let access_violation = if record.code == super::backend::EXCEPTION_ACCESS_VIOLATION {
            let kind = match record.parameters.first() {
                Some(0) => AccessViolationKind::Read,
                Some(1) => AccessViolationKind::Write,
                Some(8) => AccessViolationKind::Dep,
                _ => AccessViolationKind::Read,
            };
            let target_address = record.parameters.get(1).copied().unwrap_or(0);
            Some(AccessViolation { kind, target_address })
        } else {
            None
        };
        ExceptionInfo { record, access_violation }
    }
}
