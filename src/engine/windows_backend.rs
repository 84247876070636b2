//! The real `DebugBackend`/`ResourceLayer` implementation against the
//! Win32 debug API (`CreateProcessW`, `WaitForDebugEvent`,
//! `ContinueDebugEvent`, `ReadProcessMemory`, ...). Everything here is a
//! thin, one-call-per-method wrapper; the interesting logic (classification,
//! model updates, breakpoint bookkeeping) lives above this layer.

#![cfg(windows)]

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use widestring::U16CString;
use winapi::shared::minwindef::{DWORD, FALSE, MAX_PATH};
use winapi::shared::ntdef::HANDLE;
use winapi::um::debugapi::{ContinueDebugEvent, DebugActiveProcess, WaitForDebugEvent};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, VirtualProtectEx, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::{
    CreateProcessW, GetThreadContext, OpenThread, ResumeThread, SetThreadContext, SuspendThread,
    PROCESS_INFORMATION, STARTUPINFOW,
};
use winapi::um::psapi::GetMappedFileNameW;
use winapi::um::winbase::{DEBUG_ONLY_THIS_PROCESS, DEBUG_PROCESS};
use winapi::um::winnt::{CONTEXT, MEMORY_BASIC_INFORMATION, THREAD_ALL_ACCESS};

use super::backend::{Continuation, DebugBackend, ExceptionRecord, RawDebugEvent, RawEventKind};
use super::error::{EngineError, NtStatus};
use super::handle::{MemoryInfo, MemoryProtect, MemoryState, OsHandle, ResourceLayer, ThreadContext};

fn os_err(call: &'static str) -> EngineError {
    EngineError::Os(NtStatus::new(call, unsafe { GetLastError() }))
}

fn to_handle(h: HANDLE) -> OsHandle {
    OsHandle(h as usize)
}

fn from_handle(h: OsHandle) -> HANDLE {
    h.0 as HANDLE
}

/// Tracks the process/thread handles the kernel hands back with each debug
/// event, since `ContinueDebugEvent` is addressed by `(pid, tid)` rather
/// than by handle.
pub struct WindowsBackend {
    process_handles: HashMap<u32, OsHandle>,
    thread_handles: HashMap<(u32, u32), OsHandle>,
    last_event: Option<(u32, u32)>,
}

impl WindowsBackend {
    pub fn new() -> Self {
        WindowsBackend {
            process_handles: HashMap::new(),
            thread_handles: HashMap::new(),
            last_event: None,
        }
    }

    fn process_handle(&self, pid: u32) -> Result<OsHandle, EngineError> {
        self.process_handles
            .get(&pid)
            .copied()
            .ok_or_else(|| os_err("process handle lookup"))
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLayer for WindowsBackend {
    fn read_memory(&self, process: OsHandle, addr: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        let mut buf = vec![0u8; len];
        let mut read = 0usize;
        let ok = unsafe {
            ReadProcessMemory(
                from_handle(process),
                addr as *const _,
                buf.as_mut_ptr() as *mut _,
                len,
                &mut read,
            )
        };
        if ok == 0 {
            return Err(os_err("ReadProcessMemory"));
        }
        buf.truncate(read);
        Ok(buf)
    }

    fn write_memory(&self, process: OsHandle, addr: u64, bytes: &[u8]) -> Result<(), EngineError> {
        let mut written = 0usize;
        let ok = unsafe {
            WriteProcessMemory(
                from_handle(process),
                addr as *mut _,
                bytes.as_ptr() as *const _,
                bytes.len(),
                &mut written,
            )
        };
        if ok == 0 || written != bytes.len() {
            return Err(os_err("WriteProcessMemory"));
        }
        Ok(())
    }

    fn query_memory(&self, process: OsHandle, addr: u64) -> Result<MemoryInfo, EngineError> {
        let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
        let size = unsafe {
            VirtualQueryEx(
                from_handle(process),
                addr as *const _,
                &mut mbi,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if size == 0 {
            return Err(os_err("VirtualQueryEx"));
        }
        let state = match mbi.State {
            0x1000 => MemoryState::Commit,
            0x2000 => MemoryState::Reserve,
            0x10000 => MemoryState::Free,
            _ => MemoryState::Free,
        };
        Ok(MemoryInfo {
            base: mbi.BaseAddress as u64,
            size: mbi.RegionSize as u64,
            state,
            protect: MemoryProtect::from_bits_truncate(mbi.Protect),
        })
    }

    fn protect_memory(
        &self,
        process: OsHandle,
        addr: u64,
        len: usize,
        new: MemoryProtect,
    ) -> Result<MemoryProtect, EngineError> {
        let mut old: DWORD = 0;
        let ok = unsafe {
            VirtualProtectEx(from_handle(process), addr as *mut _, len, new.bits(), &mut old)
        };
        if ok == 0 {
            return Err(os_err("VirtualProtectEx"));
        }
        Ok(MemoryProtect::from_bits_truncate(old))
    }

    fn query_section_name(&self, process: OsHandle, addr: u64) -> Result<String, EngineError> {
        let mut buf = [0u16; MAX_PATH];
        let len = unsafe {
            GetMappedFileNameW(
                from_handle(process),
                addr as *mut _,
                buf.as_mut_ptr(),
                buf.len() as DWORD,
            )
        };
        if len == 0 {
            return Err(os_err("GetMappedFileNameW"));
        }
        Ok(U16CString::from_vec_truncate(&buf[..len as usize]).to_string_lossy())
    }

    fn terminate(&self, process: OsHandle, exit_code: u32) -> Result<(), EngineError> {
        let ok = unsafe { winapi::um::processthreadsapi::TerminateProcess(from_handle(process), exit_code) };
        if ok == 0 {
            return Err(os_err("TerminateProcess"));
        }
        Ok(())
    }

    fn get_context(&self, thread: OsHandle) -> Result<ThreadContext, EngineError> {
        let mut ctx: CONTEXT = unsafe { std::mem::zeroed() };
        ctx.ContextFlags = 0x0001_0000 | 0x1 | 0x2 | 0x4 | 0x10; // CONTEXT_FULL | CONTEXT_DEBUG_REGISTERS
        let ok = unsafe { GetThreadContext(from_handle(thread), &mut ctx) };
        if ok == 0 {
            return Err(os_err("GetThreadContext"));
        }
        Ok(ThreadContext {
            eax: ctx.Eax,
            ebx: ctx.Ebx,
            ecx: ctx.Ecx,
            edx: ctx.Edx,
            esi: ctx.Esi,
            edi: ctx.Edi,
            ebp: ctx.Ebp,
            esp: ctx.Esp,
            eip: ctx.Eip,
            eflags_raw: ctx.EFlags,
            cs: ctx.SegCs as u16,
            ss: ctx.SegSs as u16,
            ds: ctx.SegDs as u16,
            es: ctx.SegEs as u16,
            fs: ctx.SegFs as u16,
            gs: ctx.SegGs as u16,
            dr0: ctx.Dr0,
            dr1: ctx.Dr1,
            dr2: ctx.Dr2,
            dr3: ctx.Dr3,
            dr6: ctx.Dr6,
            dr7: ctx.Dr7,
        })
    }

    fn set_context(&self, thread: OsHandle, context: &ThreadContext) -> Result<(), EngineError> {
        let mut ctx: CONTEXT = unsafe { std::mem::zeroed() };
        ctx.ContextFlags = 0x0001_0000 | 0x1 | 0x2 | 0x4 | 0x10;
        ctx.Eax = context.eax;
        ctx.Ebx = context.ebx;
        ctx.Ecx = context.ecx;
        ctx.Edx = context.edx;
        ctx.Esi = context.esi;
        ctx.Edi = context.edi;
        ctx.Ebp = context.ebp;
        ctx.Esp = context.esp;
        ctx.Eip = context.eip;
        ctx.EFlags = context.eflags_raw;
        ctx.SegCs = context.cs as u32;
        ctx.SegSs = context.ss as u32;
        ctx.SegDs = context.ds as u32;
        ctx.SegEs = context.es as u32;
        ctx.SegFs = context.fs as u32;
        ctx.SegGs = context.gs as u32;
        ctx.Dr0 = context.dr0;
        ctx.Dr1 = context.dr1;
        ctx.Dr2 = context.dr2;
        ctx.Dr3 = context.dr3;
        ctx.Dr6 = context.dr6;
        ctx.Dr7 = context.dr7;
        let ok = unsafe { SetThreadContext(from_handle(thread), &ctx) };
        if ok == 0 {
            return Err(os_err("SetThreadContext"));
        }
        Ok(())
    }

    fn suspend_thread(&self, thread: OsHandle) -> Result<u32, EngineError> {
        let prev = unsafe { SuspendThread(from_handle(thread)) };
        if prev == DWORD::MAX {
            return Err(os_err("SuspendThread"));
        }
        Ok(prev)
    }

    fn resume_thread(&self, thread: OsHandle) -> Result<u32, EngineError> {
        let prev = unsafe { ResumeThread(from_handle(thread)) };
        if prev == DWORD::MAX {
            return Err(os_err("ResumeThread"));
        }
        Ok(prev)
    }

    fn close_handle(&self, handle: OsHandle) {
        if handle != OsHandle::NULL {
            unsafe {
                CloseHandle(from_handle(handle));
            }
        }
    }
}

impl DebugBackend for WindowsBackend {
    fn spawn(&mut self, command_line: &str) -> Result<(), EngineError> {
        let mut wide: Vec<u16> = OsStr::new(command_line).encode_wide().chain(std::iter::once(0)).collect();
        let mut si: STARTUPINFOW = unsafe { std::mem::zeroed() };
        si.cb = std::mem::size_of::<STARTUPINFOW>() as DWORD;
        let mut pi: PROCESS_INFORMATION = unsafe { std::mem::zeroed() };

        let ok = unsafe {
            CreateProcessW(
                ptr::null(),
                wide.as_mut_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
                FALSE,
                DEBUG_PROCESS | DEBUG_ONLY_THIS_PROCESS,
                ptr::null_mut(),
                ptr::null(),
                &mut si,
                &mut pi,
            )
        };
        if ok == 0 {
            return Err(os_err("CreateProcessW"));
        }
        // The kernel reports ProcessCreate (with the handles we just got
        // back) through the first `wait_event`; nothing further to do here.
        unsafe {
            CloseHandle(pi.hProcess);
            CloseHandle(pi.hThread);
        }
        Ok(())
    }

    fn attach(&mut self, pid: u32) -> Result<(), EngineError> {
        let ok = unsafe { DebugActiveProcess(pid) };
        if ok == 0 {
            return Err(os_err("DebugActiveProcess"));
        }
        Ok(())
    }

    fn wait_event(&mut self, timeout_ms: u32) -> Result<Option<RawDebugEvent>, EngineError> {
        let mut de: winapi::um::minwinbase::DEBUG_EVENT = unsafe { std::mem::zeroed() };
        let ok = unsafe { WaitForDebugEvent(&mut de, timeout_ms) };
        if ok == 0 {
            let err = unsafe { GetLastError() };
            if err == winapi::shared::winerror::ERROR_SEM_TIMEOUT {
                return Ok(None);
            }
            return Err(EngineError::Os(NtStatus::new("WaitForDebugEvent", err)));
        }

        let pid = de.dwProcessId;
        let tid = de.dwThreadId;
        self.last_event = Some((pid, tid));

        use winapi::um::minwinbase::*;
        let kind = match de.dwDebugEventCode {
            CREATE_PROCESS_DEBUG_EVENT => {
                let info = unsafe { de.u.CreateProcessInfo() };
                let proc_handle = to_handle(info.hProcess);
                let thread_handle = to_handle(info.hThread);
                self.process_handles.insert(pid, proc_handle);
                self.thread_handles.insert((pid, tid), thread_handle);
                RawEventKind::ProcessCreate {
                    process_handle: proc_handle,
                    thread_handle,
                    image_base: info.lpBaseOfImage as u64,
                    start_address: info.lpStartAddress.map_or(0, |f| f as u64),
                    teb_address: info.lpThreadLocalBase as u64,
                }
            }
            EXIT_PROCESS_DEBUG_EVENT => {
                let info = unsafe { de.u.ExitProcess() };
                RawEventKind::ProcessExit { exit_code: info.dwExitCode }
            }
            CREATE_THREAD_DEBUG_EVENT => {
                let info = unsafe { de.u.CreateThread() };
                let thread_handle = to_handle(info.hThread);
                self.thread_handles.insert((pid, tid), thread_handle);
                RawEventKind::ThreadCreate {
                    thread_handle,
                    start_address: info.lpStartAddress.map_or(0, |f| f as u64),
                    teb_address: info.lpThreadLocalBase as u64,
                }
            }
            EXIT_THREAD_DEBUG_EVENT => {
                let info = unsafe { de.u.ExitThread() };
                RawEventKind::ThreadExit { exit_code: info.dwExitCode }
            }
            LOAD_DLL_DEBUG_EVENT => {
                let info = unsafe { de.u.LoadDll() };
                RawEventKind::ModuleLoad { base_address: info.lpBaseOfDll as u64 }
            }
            UNLOAD_DLL_DEBUG_EVENT => {
                let info = unsafe { de.u.UnloadDll() };
                RawEventKind::ModuleUnload { base_address: info.lpBaseOfDll as u64 }
            }
            EXCEPTION_DEBUG_EVENT => {
                let info = unsafe { de.u.Exception() };
                let rec = &info.ExceptionRecord;
                RawEventKind::Exception {
                    record: ExceptionRecord {
                        code: rec.ExceptionCode as u32,
                        address: rec.ExceptionAddress as u64,
                        flags: rec.ExceptionFlags,
                        parameters: rec.ExceptionInformation[..rec.NumberParameters as usize]
                            .iter()
                            .map(|p| *p as u64)
                            .collect(),
                    },
                    first_chance: info.dwFirstChance != 0,
                }
            }
            other => {
                return Err(EngineError::Os(NtStatus::new("WaitForDebugEvent", other)));
            }
        };

        Ok(Some(RawDebugEvent { pid, tid, kind }))
    }

    fn continue_event(&mut self, pid: u32, tid: u32, status: Continuation) -> Result<(), EngineError> {
        let ok = unsafe { ContinueDebugEvent(pid, tid, status.as_code()) };
        if ok == 0 {
            return Err(os_err("ContinueDebugEvent"));
        }
        Ok(())
    }
}

/// Opens a thread handle suitable for context get/set and suspend/resume,
/// used once a `ThreadExit`/model teardown needs a fresh handle beyond the
/// one handed out at `ThreadCreate` time.
pub fn open_thread(tid: u32) -> Result<OsHandle, EngineError> {
    let h = unsafe { OpenThread(THREAD_ALL_ACCESS, FALSE, tid) };
    if h.is_null() {
        return Err(os_err("OpenThread"));
    }
    Ok(to_handle(h))
}
