use std::collections::BTreeMap;

use super::cpu::Cpu;
use super::process::Process;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerfCounter {
    pub name: String,
    pub count: u64,
    pub visible: bool,
    pub sort: bool,
}

impl PerfCounter {
    fn new(name: &str, sort: bool) -> Self {
        PerfCounter {
            name: name.to_string(),
            count: 0,
            visible: true,
            sort,
        }
    }
}

/// Every counter name seen in the trace. The first name registered is the
/// default sort key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterRegistry {
    counters: BTreeMap<String, PerfCounter>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str) -> &PerfCounter {
        let first = self.counters.is_empty();
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| PerfCounter::new(name, first))
    }

    pub fn get(&self, name: &str) -> Option<&PerfCounter> {
        self.counters.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerfCounter> {
        self.counters.values()
    }

    pub fn visible(&self) -> impl Iterator<Item = &PerfCounter> {
        self.counters.values().filter(|c| c.visible)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.counters
            .values()
            .find(|c| c.sort)
            .map(|c| c.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

fn counter_entry<'a>(
    table: &'a mut BTreeMap<String, PerfCounter>,
    name: &str,
    sort: bool,
) -> &'a mut PerfCounter {
    table
        .entry(name.to_string())
        .or_insert_with(|| PerfCounter::new(name, sort))
}

/// Attribute a raw per-CPU counter sample to the process running on `cpu`.
///
/// Only increases over the last value seen on the CPU are charged; equal or
/// lower samples (duplicates, reordering, wraparound) charge nothing.
/// Returns the delta charged to `process`.
pub fn observe(
    registry: &mut CounterRegistry,
    cpu: &mut Cpu,
    process: &mut Process,
    name: &str,
    raw_value: u64,
) -> u64 {
    let sort = registry.register(name).sort;
    let cpu_counter = counter_entry(&mut cpu.perf, name, sort);
    if raw_value <= cpu_counter.count {
        return 0;
    }
    let delta = raw_value - cpu_counter.count;
    cpu_counter.count = raw_value;

    let proc_counter = counter_entry(&mut process.perf, name, sort);
    proc_counter.count = proc_counter.count.saturating_add(delta);
    delta
}
