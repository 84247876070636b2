use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use metalbones::config::Config;
use metalbones::engine::{AccessViolationKind, Breakpoint, Continuation, DebuggerHooks, ExceptionInfo, ThreadContext};
use metalbones::log::Logger;

#[derive(Parser)]
#[command(name = "metalbones", about = "A 32-bit Windows debugger engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Timeout passed to `wait_event` on each iteration of the demo loop.
    #[arg(long, global = true)]
    timeout_ms: Option<u32>,

    /// `tracing-subscriber` `EnvFilter` directive, e.g. `debug` or `metalbones=trace`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Starts `command_line` under a new debug session.
    Spawn { command_line: String },
    /// Attaches to an already-running process by pid.
    Attach { pid: u32 },
}

/// Dumps every event to `tracing`, the way the teacher's `main.rs` just
/// wires its components together and lets `Logger` do the reporting.
struct LoggingHooks;

impl DebuggerHooks for LoggingHooks {
    fn on_process_create_begin(&mut self, pid: u32) {
        info!(pid, "process create begin");
    }

    fn on_process_create_end(&mut self, pid: u32) {
        info!(pid, "process create end");
    }

    fn on_process_exit(&mut self, pid: u32, exit_code: u32) {
        info!(pid, exit_code, "process exit");
    }

    fn on_thread_create(&mut self, pid: u32, tid: u32) {
        info!(pid, tid, "thread create");
    }

    fn on_thread_exit(&mut self, pid: u32, tid: u32, exit_code: u32) {
        info!(pid, tid, exit_code, "thread exit");
    }

    fn on_module_load(&mut self, pid: u32, base_address: u64) {
        info!(pid, base_address = format_args!("{base_address:#010x}"), "module load");
    }

    fn on_module_unload(&mut self, pid: u32, base_address: u64) {
        info!(pid, base_address = format_args!("{base_address:#010x}"), "module unload");
    }

    fn on_breakpoint(&mut self, pid: u32, tid: u32, context: &ThreadContext, bp: Option<&Breakpoint>) {
        info!(
            pid,
            tid,
            eip = format_args!("{:#010x}", context.eip),
            tracked = bp.is_some(),
            "breakpoint"
        );
    }

    fn on_single_step(&mut self, pid: u32, tid: u32) {
        info!(pid, tid, "single step");
    }

    fn on_exception(&mut self, pid: u32, tid: u32, info: &ExceptionInfo, first_chance: bool) -> Continuation {
        match &info.access_violation {
            Some(av) => {
                let kind = match av.kind {
                    AccessViolationKind::Read => "read",
                    AccessViolationKind::Write => "write",
                    AccessViolationKind::Dep => "dep",
                };
                warn!(
                    pid,
                    tid,
                    kind,
                    target = format_args!("{:#010x}", av.target_address),
                    first_chance,
                    "access violation"
                );
            }
            None => {
                warn!(pid, tid, code = format_args!("{:#010x}", info.record.code), first_chance, "exception");
            }
        }
        Continuation::ExceptionNotHandled
    }

    fn on_process_idle(&mut self, pid: u32) {
        info!(pid, "process idle");
    }
}

#[cfg(windows)]
fn run(cli: Cli, config: Config) {
    use metalbones::engine::windows_backend::WindowsBackend;
    use metalbones::engine::Debugger;

    let mut debugger = Debugger::new(WindowsBackend::new());
    let spawn_or_attach = match &cli.command {
        Command::Spawn { command_line } => debugger.spawn(command_line),
        Command::Attach { pid } => debugger.attach(*pid),
    };
    if let Err(e) = spawn_or_attach {
        error!("{e}");
        std::process::exit(1);
    }

    let timeout_ms = cli.timeout_ms.unwrap_or(config.default_wait_timeout_ms);
    let mut hooks = LoggingHooks;
    loop {
        match debugger.wait_event(timeout_ms, &mut hooks) {
            Ok(true) => {
                if debugger.processes.is_empty() {
                    info!("all debuggee processes exited, stopping");
                    break;
                }
            }
            Ok(false) => continue,
            Err(e) => {
                error!("{e}");
                break;
            }
        }
    }
}

#[cfg(not(windows))]
fn run(_cli: Cli, _config: Config) {
    error!(
        "metalbones targets the Windows NT debug API (DbgUiWaitStateChange/DbgUiContinue); \
         no backend is available on this platform"
    );
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    let _logger = Logger::new(&cli.log_level);
    let config = Config::default();

    info!("metalbones starting");
    run(cli, config);
}
