use std::collections::BTreeMap;

use super::perf_counter::PerfCounter;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cpu {
    pub id: u64,
    /// Thread currently scheduled here, by tid.
    pub current: Option<u32>,
    /// Timestamp at which `current` was switched in.
    pub task_start: Option<u64>,
    /// Last raw value seen for each counter on this CPU.
    pub perf: BTreeMap<String, PerfCounter>,
}

impl Cpu {
    pub fn new(id: u64) -> Self {
        Cpu {
            id,
            current: None,
            task_start: None,
            perf: BTreeMap::new(),
        }
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.perf.get(name).map(|c| c.count).unwrap_or(0)
    }

    /// Record a context switch at `timestamp`. Returns the on-CPU time of the
    /// outgoing task when it is the one this CPU had switched in.
    pub fn switch_to(&mut self, prev: u32, next: u32, timestamp: u64) -> Option<u64> {
        let elapsed = match (self.current, self.task_start) {
            (Some(current), Some(start)) if current == prev => {
                Some(timestamp.saturating_sub(start))
            }
            _ => None,
        };
        self.current = Some(next);
        self.task_start = Some(timestamp);
        elapsed
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuTable {
    cpus: BTreeMap<u64, Cpu>,
}

impl CpuTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&Cpu> {
        self.cpus.get(&id)
    }

    pub fn get_or_create(&mut self, id: u64) -> &mut Cpu {
        self.cpus.entry(id).or_insert_with(|| Cpu::new(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cpu> {
        self.cpus.values()
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// Forget `tid` wherever it is the running task.
    pub fn clear_task(&mut self, tid: u32) {
        for cpu in self.cpus.values_mut() {
            if cpu.current == Some(tid) {
                cpu.current = None;
                cpu.task_start = None;
            }
        }
    }
}
