//! Thread (C8, §3): one debuggee thread, owning its OS handle and exposing
//! the Thread API of §6 (context get/set, suspend/resume, single-step arm).

use super::error::EngineError;
use super::handle::{OsHandle, ResourceLayer, ThreadContext};
use super::module::ProcessRef;

pub struct Thread {
    pub tid: u32,
    pub handle: OsHandle,
    pub process: ProcessRef,
    pub start_address: u64,
    pub is_initial: bool,
    pub exit_status: Option<u32>,
    pub teb_address: u64,
    /// The address of a breakpoint this thread disarmed (via a prior
    /// `Breakpoint` event) with `auto_rearm` set, waiting for the next
    /// `SingleStep` on this same thread to rearm (§9, `auto_rearm`
    /// resolution).
    pub pending_rearm: Option<u64>,
}

impl Thread {
    pub fn new(
        tid: u32,
        handle: OsHandle,
        process: ProcessRef,
        start_address: u64,
        is_initial: bool,
        teb_address: u64,
    ) -> Self {
        Thread {
            tid,
            handle,
            process,
            start_address,
            is_initial,
            exit_status: None,
            teb_address,
            pending_rearm: None,
        }
    }

    pub fn context(&self, resource: &dyn ResourceLayer) -> Result<ThreadContext, EngineError> {
        resource.get_context(self.handle)
    }

    pub fn set_context(&self, resource: &dyn ResourceLayer, context: &ThreadContext) -> Result<(), EngineError> {
        resource.set_context(self.handle, context)
    }

    pub fn suspend(&self, resource: &dyn ResourceLayer) -> Result<u32, EngineError> {
        resource.suspend_thread(self.handle)
    }

    pub fn resume(&self, resource: &dyn ResourceLayer) -> Result<u32, EngineError> {
        resource.resume_thread(self.handle)
    }

    /// Sets TF in the thread's saved EFLAGS so the next instruction raises a
    /// single-step exception (§4.5).
    pub fn enable_single_step(&self, resource: &dyn ResourceLayer) -> Result<(), EngineError> {
        let mut ctx = self.context(resource)?;
        ctx.set_trap_flag(true);
        self.set_context(resource, &ctx)
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("process", &self.process)
            .field("start_address", &format_args!("{:#010x}", self.start_address))
            .field("is_initial", &self.is_initial)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}
