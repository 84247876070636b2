//! Process-activity sampler (§6, §SPEC_FULL [SUPPLEMENT]): the contract the
//! core exposes to the excluded activity-sampler orchestrator. Takes one
//! `(kernel_time, user_time)` sample per tracked pid on `update()`, and
//! fires `on_process_idle(pid)` once after `idle_sample_count` consecutive
//! samples show a combined delta below `idle_threshold_ticks`.

use std::collections::HashMap;

use crate::config::Config;

struct Tracked {
    last_kernel_user_ticks: Option<u64>,
    idle_streak: u32,
}

/// A process-time source the sampler polls once per `update()`, kept
/// abstract so tests can supply canned sequences instead of calling the
/// real `GetProcessTimes`-equivalent through the `ResourceLayer`.
pub trait ProcessTimeSource {
    /// Combined kernel+user time for `pid`, in 100ns ticks (matching
    /// `FILETIME`'s units), or `None` if the pid is no longer queryable.
    fn process_time_ticks(&self, pid: u32) -> Option<u64>;
}

pub struct ActivitySampler {
    tracked: HashMap<u32, Tracked>,
    idle_sample_count: u32,
    idle_threshold_ticks: u64,
}

impl ActivitySampler {
    pub fn new(config: &Config) -> Self {
        ActivitySampler {
            tracked: HashMap::new(),
            idle_sample_count: config.idle_sample_count,
            idle_threshold_ticks: config.idle_threshold_ticks,
        }
    }

    /// Registers `pid` for sampling; subsequent `update()` calls poll it.
    pub fn track_process(&mut self, pid: u32) {
        self.tracked.entry(pid).or_insert(Tracked { last_kernel_user_ticks: None, idle_streak: 0 });
    }

    pub fn untrack_process(&mut self, pid: u32) {
        self.tracked.remove(&pid);
    }

    /// Takes one sample per tracked pid and returns the pids that just
    /// crossed the idle threshold this call (i.e. whose `idle_streak` just
    /// reached `idle_sample_count`). Re-arms rather than latching: once
    /// fired, the streak resets so another streak can fire again later if
    /// activity resumes and stops again.
    pub fn update(&mut self, source: &dyn ProcessTimeSource) -> Vec<u32> {
        let mut newly_idle = Vec::new();
        for (&pid, state) in self.tracked.iter_mut() {
            let current = match source.process_time_ticks(pid) {
                Some(ticks) => ticks,
                None => continue,
            };
            let delta = state.last_kernel_user_ticks.map(|prev| current.saturating_sub(prev));
            state.last_kernel_user_ticks = Some(current);

            let is_idle_sample = match delta {
                Some(d) => d < self.idle_threshold_ticks,
                None => false, // first sample establishes a baseline only
            };

            if is_idle_sample {
                state.idle_streak += 1;
                if state.idle_streak == self.idle_sample_count {
                    newly_idle.push(pid);
                    state.idle_streak = 0;
                }
            } else {
                state.idle_streak = 0;
            }
        }
        newly_idle
    }
}
