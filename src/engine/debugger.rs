//! Debugger Facade (C11, §6): aggregates the Handle/Resource Layer, the
//! process/thread/module model, and the Event Pump behind the public API a
//! library consumer embeds directly.

use std::collections::BTreeMap;

use super::backend::DebugBackend;
use super::error::EngineError;
use super::event_pump::EventPump;
use super::hooks::DebuggerHooks;
use super::process::Process;

/// Owns one debug session: the OS-facing backend plus the model it drives.
/// Generic over the backend so the real Windows implementation and a fake
/// test backend are interchangeable without dynamic dispatch on the hot
/// `wait_event` path.
pub struct Debugger<B: DebugBackend> {
    backend: B,
    /// Read-only view per §6; mutated only from inside `wait_event`.
    pub processes: BTreeMap<u32, Process>,
}

impl<B: DebugBackend> Debugger<B> {
    pub fn new(backend: B) -> Self {
        Debugger { backend, processes: BTreeMap::new() }
    }

    pub fn spawn(&mut self, command_line: &str) -> Result<(), EngineError> {
        self.backend.spawn(command_line)
    }

    pub fn attach(&mut self, pid: u32) -> Result<(), EngineError> {
        self.backend.attach(pid)
    }

    /// Blocks for up to `timeout_ms`, dispatching at most one event to
    /// `hooks`. Returns `false` on timeout without calling any hook (§5).
    pub fn wait_event(&mut self, timeout_ms: u32, hooks: &mut dyn DebuggerHooks) -> Result<bool, EngineError> {
        EventPump::wait_event(&mut self.processes, &mut self.backend, hooks, timeout_ms)
    }

    /// Direct access to the backend for VM/context operations that need a
    /// process or thread handle the caller already has (e.g. from a hook).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
