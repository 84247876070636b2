//! Breakpoint arm/disarm bit-exactness (scenario 6) and the `auto_rearm`
//! resolution documented in §9: on the next SingleStep for the same thread,
//! an auto-rearming breakpoint that was disarmed by the last Breakpoint
//! event on that thread gets armed again.

mod common;

use common::FakeBackend;
use metalbones::engine::backend::{EXCEPTION_BREAKPOINT, EXCEPTION_SINGLE_STEP};
use metalbones::engine::{
    Debugger, DebuggerHooks, ExceptionRecord, MemoryProtect, OsHandle, Process, RawDebugEvent,
    RawEventKind, ResourceLayer, Thread, ThreadContext,
};

const INT3: u8 = 0xCC;
const PID: u32 = 5100;
const TID: u32 = 5101;
const PROCESS_HANDLE: OsHandle = OsHandle(1);
const THREAD_HANDLE: OsHandle = OsHandle(2);
const BP_ADDR: u64 = 0x0040_1010;

struct NoopHooks;
impl DebuggerHooks for NoopHooks {}

#[test]
fn arm_writes_int3_and_disarm_restores_original_byte_and_protection() {
    let mut backend = FakeBackend::new();
    backend.add_region(0x0040_0000, 0x2000, MemoryProtect::EXECUTE_READWRITE, None);
    ResourceLayer::write_memory(&backend, PROCESS_HANDLE, BP_ADDR, &[0x90]).unwrap();

    let mut process = Process::new(PID, PROCESS_HANDLE, 0x0040_0000);
    let bp = process.get_breakpoint(BP_ADDR);

    bp.arm(&backend, process.handle).unwrap();
    assert!(bp.is_armed());
    assert_eq!(ResourceLayer::read_memory(&backend, PROCESS_HANDLE, BP_ADDR, 1).unwrap(), vec![INT3]);
    assert_eq!(
        ResourceLayer::query_memory(&backend, PROCESS_HANDLE, BP_ADDR).unwrap().protect,
        MemoryProtect::EXECUTE_READWRITE
    );

    bp.disarm(&backend, process.handle).unwrap();
    assert!(!bp.is_armed());
    assert_eq!(ResourceLayer::read_memory(&backend, PROCESS_HANDLE, BP_ADDR, 1).unwrap(), vec![0x90]);
    assert_eq!(
        ResourceLayer::query_memory(&backend, PROCESS_HANDLE, BP_ADDR).unwrap().protect,
        MemoryProtect::EXECUTE_READWRITE
    );
}

#[test]
fn arm_disarm_is_idempotent_across_several_addresses_and_original_bytes() {
    let mut backend = FakeBackend::new();
    backend.add_region(0x0050_0000, 0x4000, MemoryProtect::EXECUTE_READ, None);

    for (i, &original) in [0x90u8, 0x55, 0xE8, 0x00, 0xFF].iter().enumerate() {
        let addr = 0x0050_0000 + (i as u64) * 0x100;
        ResourceLayer::write_memory(&backend, PROCESS_HANDLE, addr, &[original]).unwrap();

        let mut process = Process::new(PID, PROCESS_HANDLE, 0x0050_0000);
        let bp = process.get_breakpoint(addr);

        bp.arm(&backend, process.handle).unwrap();
        assert_eq!(ResourceLayer::read_memory(&backend, PROCESS_HANDLE, addr, 1).unwrap(), vec![INT3]);

        bp.disarm(&backend, process.handle).unwrap();
        assert_eq!(ResourceLayer::read_memory(&backend, PROCESS_HANDLE, addr, 1).unwrap(), vec![original]);
        assert_eq!(
            ResourceLayer::query_memory(&backend, PROCESS_HANDLE, addr).unwrap().protect,
            MemoryProtect::EXECUTE_READ
        );
    }
}

#[test]
fn disarming_an_unarmed_breakpoint_is_rejected() {
    let backend = FakeBackend::new();
    let mut process = Process::new(PID, PROCESS_HANDLE, 0x0040_0000);
    let bp = process.get_breakpoint(BP_ADDR);
    assert!(bp.disarm(&backend, process.handle).is_err());
}

fn breakpoint_exception_event() -> RawDebugEvent {
    RawDebugEvent {
        pid: PID,
        tid: TID,
        kind: RawEventKind::Exception {
            record: ExceptionRecord { code: EXCEPTION_BREAKPOINT, address: BP_ADDR, flags: 0, parameters: vec![] },
            first_chance: true,
        },
    }
}

fn single_step_exception_event() -> RawDebugEvent {
    RawDebugEvent {
        pid: PID,
        tid: TID,
        kind: RawEventKind::Exception {
            record: ExceptionRecord { code: EXCEPTION_SINGLE_STEP, address: BP_ADDR, flags: 0, parameters: vec![] },
            first_chance: true,
        },
    }
}

#[test]
fn breakpoint_exception_decrements_eip_and_disarms_the_tracked_breakpoint() {
    let mut backend = FakeBackend::new();
    backend.add_region(0x0040_0000, 0x2000, MemoryProtect::EXECUTE_READWRITE, None);
    ResourceLayer::write_memory(&backend, PROCESS_HANDLE, BP_ADDR, &[0x90]).unwrap();
    backend.seed_context(THREAD_HANDLE, ThreadContext { eip: (BP_ADDR + 1) as u32, ..Default::default() });

    let mut process = Process::new(PID, PROCESS_HANDLE, 0x0040_0000);
    process.threads.insert(TID, Thread::new(TID, THREAD_HANDLE, PID, 0x0040_1000, true, 0));
    process.get_breakpoint(BP_ADDR).arm(&backend, PROCESS_HANDLE).unwrap();

    backend.push_event(breakpoint_exception_event());

    let mut debugger = Debugger::new(backend);
    debugger.processes.insert(PID, process);
    let mut hooks = NoopHooks;

    assert!(debugger.wait_event(0, &mut hooks).unwrap());

    let ctx = debugger.backend().get_context(THREAD_HANDLE).unwrap();
    assert_eq!(ctx.eip, BP_ADDR as u32, "eip should be rewound past the INT3 byte");
    assert!(!debugger.processes[&PID].breakpoints[&BP_ADDR].is_armed());
    assert_eq!(
        ResourceLayer::read_memory(debugger.backend(), PROCESS_HANDLE, BP_ADDR, 1).unwrap(),
        vec![0x90],
        "original byte should be restored on disarm"
    );
}

#[test]
fn auto_rearm_breakpoint_is_armed_again_on_the_next_single_step_for_that_thread() {
    let mut backend = FakeBackend::new();
    backend.add_region(0x0040_0000, 0x2000, MemoryProtect::EXECUTE_READWRITE, None);
    ResourceLayer::write_memory(&backend, PROCESS_HANDLE, BP_ADDR, &[0x90]).unwrap();
    backend.seed_context(THREAD_HANDLE, ThreadContext { eip: (BP_ADDR + 1) as u32, ..Default::default() });

    let mut process = Process::new(PID, PROCESS_HANDLE, 0x0040_0000);
    process.threads.insert(TID, Thread::new(TID, THREAD_HANDLE, PID, 0x0040_1000, true, 0));
    {
        let bp = process.get_breakpoint(BP_ADDR);
        bp.arm(&backend, PROCESS_HANDLE).unwrap();
        bp.auto_rearm = true;
    }

    backend.push_event(breakpoint_exception_event());
    backend.push_event(single_step_exception_event());

    let mut debugger = Debugger::new(backend);
    debugger.processes.insert(PID, process);
    let mut hooks = NoopHooks;

    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(!debugger.processes[&PID].breakpoints[&BP_ADDR].is_armed());
    assert_eq!(debugger.processes[&PID].threads[&TID].pending_rearm, Some(BP_ADDR));

    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(debugger.processes[&PID].breakpoints[&BP_ADDR].is_armed(), "auto_rearm should re-arm on the next single step");
    assert!(debugger.processes[&PID].threads[&TID].pending_rearm.is_none());
    assert_eq!(
        ResourceLayer::read_memory(debugger.backend(), PROCESS_HANDLE, BP_ADDR, 1).unwrap(),
        vec![INT3]
    );
}
