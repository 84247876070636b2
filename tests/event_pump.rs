//! End-to-end event-pump scenarios against the in-memory fake backend:
//! the ProcessCreate/ProcessExit hook-ordering scenario and the event
//! invariants from the testable-properties list.

mod common;

use common::FakeBackend;
use metalbones::engine::{Debugger, DebuggerHooks, OsHandle, RawDebugEvent, RawEventKind};

const PID: u32 = 4100;
const TID: u32 = 4101;
const IMAGE_BASE: u64 = 0x0040_0000;

#[derive(Default)]
struct RecordingHooks {
    order: Vec<&'static str>,
}

impl DebuggerHooks for RecordingHooks {
    fn on_process_create_begin(&mut self, _pid: u32) {
        self.order.push("begin");
    }
    fn on_process_create_end(&mut self, _pid: u32) {
        self.order.push("end");
    }
    fn on_process_exit(&mut self, _pid: u32, _exit_code: u32) {
        self.order.push("process_exit");
    }
    fn on_thread_create(&mut self, _pid: u32, _tid: u32) {
        self.order.push("thread_create");
    }
    fn on_thread_exit(&mut self, _pid: u32, _tid: u32, _exit_code: u32) {
        self.order.push("thread_exit");
    }
    fn on_module_load(&mut self, _pid: u32, _base_address: u64) {
        self.order.push("module_load");
    }
    fn on_module_unload(&mut self, _pid: u32, _base_address: u64) {
        self.order.push("module_unload");
    }
}

fn process_create_event() -> RawDebugEvent {
    RawDebugEvent {
        pid: PID,
        tid: TID,
        kind: RawEventKind::ProcessCreate {
            process_handle: OsHandle(1),
            thread_handle: OsHandle(2),
            image_base: IMAGE_BASE,
            start_address: IMAGE_BASE + 0x1000,
            teb_address: 0x7ffd_e000,
        },
    }
}

#[test]
fn process_create_populates_model_and_fires_hooks_in_order() {
    let mut backend = FakeBackend::new();
    backend.push_event(process_create_event());

    let mut debugger = Debugger::new(backend);
    let mut hooks = RecordingHooks::default();

    assert!(debugger.wait_event(0, &mut hooks).unwrap());

    let process = debugger.processes.get(&PID).expect("process create should populate the registry");
    assert_eq!(process.image, Some(IMAGE_BASE));
    let initial_tid = process.initial_thread.expect("initial thread should be tracked");
    assert_eq!(initial_tid, TID);
    assert!(process.threads[&TID].is_initial);

    assert_eq!(hooks.order, vec!["begin", "module_load", "thread_create", "end"]);
}

#[test]
fn process_create_then_exit_matches_scenario_5_ordering_and_empties_registry() {
    let mut backend = FakeBackend::new();
    backend.push_event(process_create_event());
    backend.push_event(RawDebugEvent { pid: PID, tid: TID, kind: RawEventKind::ProcessExit { exit_code: 0 } });

    let mut debugger = Debugger::new(backend);
    let mut hooks = RecordingHooks::default();

    assert!(debugger.wait_event(0, &mut hooks).unwrap());
    assert!(debugger.wait_event(0, &mut hooks).unwrap());

    // §9: no synthetic thread-exit/module-unload at process termination --
    // the process is simply dropped from the registry after on_process_exit.
    assert_eq!(hooks.order, vec!["begin", "module_load", "thread_create", "end", "process_exit"]);
    assert!(!debugger.processes.contains_key(&PID), "process must not be reachable after on_process_exit");
}

#[test]
fn thread_exit_removes_thread_from_its_parent_process() {
    const TID2: u32 = 4102;

    let mut backend = FakeBackend::new();
    backend.push_event(process_create_event());
    backend.push_event(RawDebugEvent {
        pid: PID,
        tid: TID2,
        kind: RawEventKind::ThreadCreate { thread_handle: OsHandle(3), start_address: 0x401500, teb_address: 0 },
    });
    backend.push_event(RawDebugEvent { pid: PID, tid: TID2, kind: RawEventKind::ThreadExit { exit_code: 0 } });

    let mut debugger = Debugger::new(backend);
    let mut hooks = RecordingHooks::default();

    debugger.wait_event(0, &mut hooks).unwrap();
    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(debugger.processes[&PID].threads.contains_key(&TID2));

    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(
        !debugger.processes[&PID].threads.contains_key(&TID2),
        "thread must not be reachable from its process after on_thread_exit"
    );
}

#[test]
fn module_unload_removes_module_from_its_parent_process() {
    const DLL_BASE: u64 = 0x1000_0000;

    let mut backend = FakeBackend::new();
    backend.push_event(process_create_event());
    backend.push_event(RawDebugEvent { pid: PID, tid: TID, kind: RawEventKind::ModuleLoad { base_address: DLL_BASE } });
    backend.push_event(RawDebugEvent { pid: PID, tid: TID, kind: RawEventKind::ModuleUnload { base_address: DLL_BASE } });

    let mut debugger = Debugger::new(backend);
    let mut hooks = RecordingHooks::default();

    debugger.wait_event(0, &mut hooks).unwrap();
    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(debugger.processes[&PID].modules.contains_key(&DLL_BASE));

    debugger.wait_event(0, &mut hooks).unwrap();
    assert!(!debugger.processes[&PID].modules.contains_key(&DLL_BASE));
}

#[test]
fn wait_event_on_empty_queue_times_out_without_dispatching() {
    let backend = FakeBackend::new();
    let mut debugger = Debugger::new(backend);
    let mut hooks = RecordingHooks::default();

    assert!(!debugger.wait_event(0, &mut hooks).unwrap());
    assert!(hooks.order.is_empty());
}
