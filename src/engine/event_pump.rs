//! Event Pump (C10, §4.7): waits for a kernel state-change, classifies it,
//! updates the process/thread/module model, fires the matching hook, and
//! returns a continuation code to the kernel. Single-threaded and
//! cooperative -- only `wait_event` blocks (§5).

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use super::backend::{Continuation, DebugBackend, RawEventKind, EXCEPTION_BREAKPOINT, EXCEPTION_SINGLE_STEP};
use super::error::EngineError;
use super::event::ExceptionInfo;
use super::hooks::DebuggerHooks;
use super::module::Module;
use super::process::Process;
use super::thread::Thread;

pub struct EventPump;

impl EventPump {
    /// Blocks for up to `timeout_ms`. Returns `Ok(true)` if an event was
    /// dispatched, `Ok(false)` on timeout (no hook runs). Event-pump
    /// internal inconsistencies (an event naming a process or thread the
    /// model doesn't know about) are fatal, per §7.
    pub fn wait_event<B: DebugBackend>(
        processes: &mut BTreeMap<u32, Process>,
        backend: &mut B,
        hooks: &mut dyn DebuggerHooks,
        timeout_ms: u32,
    ) -> Result<bool, EngineError> {
        let event = match backend.wait_event(timeout_ms)? {
            Some(event) => event,
            None => return Ok(false),
        };

        let pid = event.pid;
        let tid = event.tid;
        let continuation = Self::dispatch(processes, backend, hooks, pid, tid, event.kind)?;
        backend.continue_event(pid, tid, continuation)?;
        Ok(true)
    }

    fn dispatch<B: DebugBackend>(
        processes: &mut BTreeMap<u32, Process>,
        backend: &mut B,
        hooks: &mut dyn DebuggerHooks,
        pid: u32,
        tid: u32,
        kind: RawEventKind,
    ) -> Result<Continuation, EngineError> {
        match kind {
            RawEventKind::ProcessCreate {
                process_handle,
                thread_handle,
                image_base,
                start_address,
                teb_address,
            } => {
                info!(pid, "process create");
                hooks.on_process_create_begin(pid);

                let mut process = Process::new(pid, process_handle, image_base);
                process.modules.insert(image_base, Module::new(image_base, pid));
                process.image = Some(image_base);

                let initial_thread = Thread::new(tid, thread_handle, pid, start_address, true, teb_address);
                process.initial_thread = Some(tid);
                process.threads.insert(tid, initial_thread);

                processes.insert(pid, process);

                hooks.on_module_load(pid, image_base);
                hooks.on_thread_create(pid, tid);
                hooks.on_process_create_end(pid);
                Ok(Continuation::Continue)
            }

            RawEventKind::ProcessExit { exit_code } => {
                info!(pid, exit_code, "process exit");
                if let Some(process) = processes.get_mut(&pid) {
                    process.exit_status = Some(exit_code);
                }
                hooks.on_process_exit(pid, exit_code);
                // §9: the process is removed before any module-unload would
                // fire -- no synthetic module-unloads at process termination.
                processes.remove(&pid);
                Ok(Continuation::Continue)
            }

            RawEventKind::ThreadCreate { thread_handle, start_address, teb_address } => {
                debug!(pid, tid, "thread create");
                match processes.get_mut(&pid) {
                    Some(process) => {
                        process.threads.insert(
                            tid,
                            Thread::new(tid, thread_handle, pid, start_address, false, teb_address),
                        );
                    }
                    None => {
                        error!(pid, "thread create for unknown process");
                        return Err(fatal("ThreadCreate for unknown process"));
                    }
                }
                hooks.on_thread_create(pid, tid);
                Ok(Continuation::Continue)
            }

            RawEventKind::ThreadExit { exit_code } => {
                debug!(pid, tid, exit_code, "thread exit");
                if let Some(process) = processes.get_mut(&pid) {
                    if let Some(thread) = process.threads.get_mut(&tid) {
                        thread.exit_status = Some(exit_code);
                    }
                }
                hooks.on_thread_exit(pid, tid, exit_code);
                if let Some(process) = processes.get_mut(&pid) {
                    process.threads.remove(&tid);
                }
                Ok(Continuation::Continue)
            }

            RawEventKind::ModuleLoad { base_address } => {
                debug!(pid, base_address = format_args!("{base_address:#010x}"), "module load");
                if let Some(process) = processes.get_mut(&pid) {
                    process.modules.insert(base_address, Module::new(base_address, pid));
                }
                hooks.on_module_load(pid, base_address);
                Ok(Continuation::Continue)
            }

            RawEventKind::ModuleUnload { base_address } => {
                debug!(pid, base_address = format_args!("{base_address:#010x}"), "module unload");
                hooks.on_module_unload(pid, base_address);
                if let Some(process) = processes.get_mut(&pid) {
                    process.modules.remove(&base_address);
                }
                Ok(Continuation::Continue)
            }

            RawEventKind::Exception { record, first_chance } => {
                if record.code == EXCEPTION_BREAKPOINT {
                    Self::handle_breakpoint(processes, backend, hooks, pid, tid)
                } else if record.code == EXCEPTION_SINGLE_STEP {
                    Self::handle_single_step(processes, backend, hooks, pid, tid)
                } else {
                    let info = ExceptionInfo::classify(record);
                    if info.access_violation.is_some() {
                        warn!(pid, tid, "access violation");
                    }
                    Ok(hooks.on_exception(pid, tid, &info, first_chance))
                }
            }
        }
    }

    /// §4.6/§4.7: decrement EIP, look up `(process, eip)`, disarm if found,
    /// write the context back, then always call `on_breakpoint`.
    fn handle_breakpoint<B: DebugBackend>(
        processes: &mut BTreeMap<u32, Process>,
        backend: &mut B,
        hooks: &mut dyn DebuggerHooks,
        pid: u32,
        tid: u32,
    ) -> Result<Continuation, EngineError> {
        let process = processes.get_mut(&pid).ok_or_else(|| fatal("Breakpoint for unknown process"))?;
        let thread_handle = process
            .threads
            .get(&tid)
            .ok_or_else(|| fatal("Breakpoint for unknown thread"))?
            .handle;

        let mut ctx = backend.get_context(thread_handle)?;
        ctx.eip = ctx.eip.wrapping_sub(1);
        let bp_addr = ctx.eip as u64;

        let auto_rearm = match process.breakpoints.get_mut(&bp_addr) {
            Some(bp) if bp.is_armed() => {
                bp.disarm(&*backend, process.handle)?;
                bp.auto_rearm
            }
            _ => false,
        };
        if auto_rearm {
            if let Some(thread) = process.threads.get_mut(&tid) {
                thread.pending_rearm = Some(bp_addr);
            }
        }

        backend.set_context(thread_handle, &ctx)?;

        let bp_ref = process.breakpoints.get(&bp_addr);
        hooks.on_breakpoint(pid, tid, &ctx, bp_ref);
        Ok(Continuation::Continue)
    }

    /// §4.7: call `on_single_step`; also services the `auto_rearm` deferred
    /// slot (§9) -- if this thread disarmed an auto-rearming breakpoint on
    /// its last `Breakpoint` event, arm it back now.
    fn handle_single_step<B: DebugBackend>(
        processes: &mut BTreeMap<u32, Process>,
        backend: &mut B,
        hooks: &mut dyn DebuggerHooks,
        pid: u32,
        tid: u32,
    ) -> Result<Continuation, EngineError> {
        let process = processes.get_mut(&pid).ok_or_else(|| fatal("SingleStep for unknown process"))?;

        let pending = process.threads.get_mut(&tid).and_then(|t| t.pending_rearm.take());
        if let Some(addr) = pending {
            let process_handle = process.handle;
            if let Some(bp) = process.breakpoints.get_mut(&addr) {
                if bp.auto_rearm {
                    bp.arm(&*backend, process_handle)?;
                }
            }
        }

        hooks.on_single_step(pid, tid);
        Ok(Continuation::Continue)
    }
}

fn fatal(what: &'static str) -> EngineError {
    error!("event pump inconsistency: {what}");
    EngineError::Os(super::error::NtStatus::new(what, 0))
}
