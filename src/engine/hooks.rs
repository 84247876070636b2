//! Overridable event hooks (§6, §9 Design Notes): a trait with default
//! no-op methods rather than a callback/virtual-dispatch hierarchy -- the
//! pre/post process-create fan-out stays an explicit sequence in the pump,
//! never a subclass-visible structure.

use super::backend::Continuation;
use super::breakpoint::Breakpoint;
use super::event::ExceptionInfo;
use super::handle::ThreadContext;

/// User-overridable reactions to debuggee state-changes. Every method has a
/// default no-op implementation except `on_exception`, which defaults to
/// `DBG_EXCEPTION_NOT_HANDLED` (§4.7).
pub trait DebuggerHooks {
    fn on_process_create_begin(&mut self, pid: u32) {
        let _ = pid;
    }
    fn on_process_create_end(&mut self, pid: u32) {
        let _ = pid;
    }
    fn on_process_exit(&mut self, pid: u32, exit_code: u32) {
        let _ = (pid, exit_code);
    }
    fn on_thread_create(&mut self, pid: u32, tid: u32) {
        let _ = (pid, tid);
    }
    fn on_thread_exit(&mut self, pid: u32, tid: u32, exit_code: u32) {
        let _ = (pid, tid, exit_code);
    }
    fn on_module_load(&mut self, pid: u32, base_address: u64) {
        let _ = (pid, base_address);
    }
    fn on_module_unload(&mut self, pid: u32, base_address: u64) {
        let _ = (pid, base_address);
    }
    fn on_breakpoint(&mut self, pid: u32, tid: u32, context: &ThreadContext, bp: Option<&Breakpoint>) {
        let _ = (pid, tid, context, bp);
    }
    fn on_single_step(&mut self, pid: u32, tid: u32) {
        let _ = (pid, tid);
    }
    fn on_exception(&mut self, pid: u32, tid: u32, info: &ExceptionInfo, first_chance: bool) -> Continuation {
        let _ = (pid, tid, info, first_chance);
        Continuation::ExceptionNotHandled
    }
    /// [SUPPLEMENT] §6 process-sampling contract: fired by `ActivitySampler`
    /// after `idle_sample_count` consecutive idle samples for `pid`.
    fn on_process_idle(&mut self, pid: u32) {
        let _ = pid;
    }
}
