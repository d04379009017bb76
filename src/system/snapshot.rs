use std::collections::{BTreeMap, BTreeSet};

use super::cpu::CpuTable;
use super::filter::FilterSet;
use super::perf_counter::CounterRegistry;
use super::process::{Process, ProcessTable};

/// Frozen copy of the live model for the window `[window_start, window_end)`.
///
/// Counter values are cumulative since the start of the run; per-window
/// deltas are left to whoever consumes consecutive snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub window_start: u64,
    pub window_end: u64,
    pub processes: ProcessTable,
    pub cpus: CpuTable,
    pub counters: CounterRegistry,
    /// Hit counts per probe event name.
    pub probe_hits: BTreeMap<String, u64>,
    visible: BTreeSet<u32>,
}

impl Snapshot {
    pub fn duration_ns(&self) -> u64 {
        self.window_end.saturating_sub(self.window_start)
    }

    pub fn is_visible(&self, tid: u32) -> bool {
        self.visible.contains(&tid)
    }

    /// Records accepted by the display filter at build time, by tid.
    pub fn displayed(&self) -> impl Iterator<Item = &Process> {
        self.visible
            .iter()
            .filter_map(|tid| self.processes.find(*tid))
    }

    pub fn displayed_count(&self) -> usize {
        self.visible.len()
    }
}

/// Borrowed view of the live model that can be frozen into a [`Snapshot`].
pub struct SnapshotBuilder<'a> {
    pub processes: &'a ProcessTable,
    pub cpus: &'a CpuTable,
    pub counters: &'a CounterRegistry,
    pub probe_hits: &'a BTreeMap<String, u64>,
    pub filter: &'a FilterSet,
}

impl SnapshotBuilder<'_> {
    /// Deep-copy the model. Returns `None` if the process table cannot be
    /// reserved; the remaining copies allocate infallibly.
    pub fn build(&self, window_start: u64, window_end: u64) -> Option<Snapshot> {
        let processes = self.processes.try_clone()?;
        let visible = processes
            .iter()
            .filter(|p| self.filter.accepts(p.tid, p.pid, p.hostname.as_deref()))
            .map(|p| p.tid)
            .collect();
        Some(Snapshot {
            window_start,
            window_end,
            processes,
            cpus: self.cpus.clone(),
            counters: self.counters.clone(),
            probe_hits: self.probe_hits.clone(),
            visible,
        })
    }
}
