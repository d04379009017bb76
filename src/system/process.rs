use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::files::{OpenFile, PendingSyscall};
use super::perf_counter::PerfCounter;

/// One thread record. A "process" is the record whose tid equals its pid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process {
    pub tid: u32,
    pub pid: u32,
    pub ppid: u32,
    /// Namespace-relative ids; `None` when the trace does not carry them.
    pub vtid: Option<u32>,
    pub vpid: Option<u32>,
    pub vppid: Option<u32>,
    pub comm: String,
    pub hostname: Option<String>,
    pub birth: u64,
    /// Process-level owner of this thread, by tid. Never set on an owner.
    pub parent: Option<u32>,
    /// Threads owned by this process-level record, by tid.
    pub threads: BTreeSet<u32>,
    pub perf: BTreeMap<String, PerfCounter>,
    /// Accumulated on-CPU time in nanoseconds.
    pub cpu_ns: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// fd table; only populated on process-level records.
    pub files: BTreeMap<i64, OpenFile>,
    pub(crate) pending: Option<PendingSyscall>,
}

impl Process {
    pub fn new(tid: u32, comm: &str, birth: u64, hostname: Option<&str>) -> Self {
        Process {
            tid,
            pid: tid,
            ppid: 0,
            vtid: None,
            vpid: None,
            vppid: None,
            comm: comm.to_string(),
            hostname: hostname.map(str::to_string),
            birth,
            parent: None,
            threads: BTreeSet::new(),
            perf: BTreeMap::new(),
            cpu_ns: 0,
            read_bytes: 0,
            write_bytes: 0,
            files: BTreeMap::new(),
            pending: None,
        }
    }

    pub fn is_thread(&self) -> bool {
        self.pid != self.tid
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.perf.get(name).map(|c| c.count).unwrap_or(0)
    }
}

/// Mutable context fields carried by an event for one thread.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessUpdate<'a> {
    pub pid: u32,
    pub tid: u32,
    pub ppid: u32,
    pub vpid: Option<u32>,
    pub vtid: Option<u32>,
    pub vppid: Option<u32>,
    pub comm: &'a str,
    pub hostname: Option<&'a str>,
}

/// All thread records, keyed by tid. Thread/process links are tids resolved
/// through this table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessTable {
    processes: HashMap<u32, Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn find(&self, tid: u32) -> Option<&Process> {
        self.processes.get(&tid)
    }

    pub fn find_mut(&mut self, tid: u32) -> Option<&mut Process> {
        self.processes.get_mut(&tid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Insert a fresh record. Returns `None` without touching the table if
    /// `tid` is already present or the table cannot grow.
    pub fn create(
        &mut self,
        tid: u32,
        comm: &str,
        timestamp: u64,
        hostname: Option<&str>,
    ) -> Option<&mut Process> {
        if self.processes.contains_key(&tid) || self.processes.try_reserve(1).is_err() {
            return None;
        }
        Some(
            self.processes
                .entry(tid)
                .or_insert_with(|| Process::new(tid, comm, timestamp, hostname)),
        )
    }

    /// Look up `tid`, creating it on first sight.
    pub fn find_or_create(
        &mut self,
        tid: u32,
        comm: &str,
        timestamp: u64,
        hostname: Option<&str>,
    ) -> Option<&mut Process> {
        if self.processes.contains_key(&tid) {
            return self.processes.get_mut(&tid);
        }
        self.create(tid, comm, timestamp, hostname)
    }

    /// Overwrite the mutable fields of `tid` in place.
    pub fn update(&mut self, tid: u32, fields: &ProcessUpdate<'_>) -> bool {
        let Some(proc) = self.processes.get_mut(&tid) else {
            return false;
        };
        debug_assert_eq!(proc.tid, fields.tid, "record keyed by a different tid");
        proc.pid = fields.pid;
        proc.ppid = fields.ppid;
        proc.vpid = fields.vpid;
        proc.vtid = fields.vtid;
        proc.vppid = fields.vppid;
        if proc.comm != fields.comm {
            proc.comm = fields.comm.to_string();
        }
        if let Some(host) = fields.hostname
            && proc.hostname.as_deref() != Some(host)
        {
            proc.hostname = Some(host.to_string());
        }
        true
    }

    /// Attach thread `child` to its process-level owner `pid`, creating the
    /// owner if unseen. No-op when the child is itself the owner.
    pub fn link_parent(&mut self, pid: u32, child: u32, timestamp: u64) {
        if pid == child {
            return;
        }
        let Some((comm, hostname)) = self
            .processes
            .get(&child)
            .map(|c| (c.comm.clone(), c.hostname.clone()))
        else {
            return;
        };

        if !self.processes.contains_key(&pid) {
            match self.create(pid, &comm, timestamp, hostname.as_deref()) {
                Some(owner) => owner.pid = pid,
                None => return,
            }
        }

        // A thread can only hang off one owner.
        let previous = self.processes.get(&child).and_then(|c| c.parent);
        if let Some(old) = previous
            && old != pid
            && let Some(old_owner) = self.processes.get_mut(&old)
        {
            old_owner.threads.remove(&child);
        }

        if let Some(owner) = self.processes.get_mut(&pid) {
            owner.threads.insert(child);
        }
        if let Some(thread) = self.processes.get_mut(&child) {
            thread.parent = Some(pid);
        }
    }

    /// Drop `tid`, unlink it from its owner and orphan the threads it owned.
    pub fn remove(&mut self, tid: u32) -> Option<Process> {
        let removed = self.processes.remove(&tid)?;
        if let Some(owner) = removed.parent.and_then(|p| self.processes.get_mut(&p)) {
            owner.threads.remove(&tid);
        }
        for thread in &removed.threads {
            if let Some(t) = self.processes.get_mut(thread)
                && t.parent == Some(tid)
            {
                t.parent = None;
            }
        }
        Some(removed)
    }

    /// The record owning the fd table for `tid`: its process-level owner
    /// when known, else the thread itself.
    pub fn owner_of(&self, tid: u32) -> Option<u32> {
        let proc = self.processes.get(&tid)?;
        if self.processes.contains_key(&proc.pid) {
            Some(proc.pid)
        } else {
            Some(tid)
        }
    }

    /// Deep copy whose table reservation can fail. The records themselves
    /// are cloned with ordinary allocation.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        let mut processes = HashMap::new();
        processes.try_reserve(self.processes.len()).ok()?;
        for (tid, proc) in &self.processes {
            processes.insert(*tid, proc.clone());
        }
        Some(Self { processes })
    }
}
