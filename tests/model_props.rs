use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use tracetop::aggregator::Aggregator;
use tracetop::probe::ProbeSet;
use tracetop::system::filter::FilterSet;
use tracetop::system::process::ProcessTable;
use tracetop::trace::Event;

#[derive(Clone, Debug)]
enum Op {
    Create(u32),
    Link { pid: u32, child: u32 },
    Remove(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..16).prop_map(Op::Create),
        (0u32..16, 0u32..16).prop_map(|(pid, child)| Op::Link { pid, child }),
        (0u32..16).prop_map(Op::Remove),
    ]
}

fn apply(table: &mut ProcessTable, ops: &[Op]) {
    for (ts, op) in ops.iter().enumerate() {
        match *op {
            Op::Create(tid) => {
                table.find_or_create(tid, "p", ts as u64, None);
            }
            Op::Link { pid, child } => table.link_parent(pid, child, ts as u64),
            Op::Remove(tid) => {
                table.remove(tid);
            }
        }
    }
}

/// Lifecycle events as the kernel reports them.
#[derive(Clone, Debug)]
enum Lifecycle {
    Fork { parent: u32, child: u32, thread: bool },
    Free(u32),
}

const REAPER: u32 = 100;

fn lifecycle() -> impl Strategy<Value = Lifecycle> {
    prop_oneof![
        (1u32..12, 1u32..12, any::<bool>())
            .prop_map(|(parent, child, thread)| Lifecycle::Fork { parent, child, thread }),
        (1u32..12).prop_map(Lifecycle::Free),
    ]
}

fn emitted_by(name: &str, ts: u64, tid: u32) -> Event {
    Event::new(name, ts)
        .on_cpu(0)
        .with_ctx_int("pid", i64::from(tid))
        .with_ctx_int("tid", i64::from(tid))
        .with_ctx_int("ppid", 0)
        .with_ctx_str("procname", format!("task-{tid}"))
}

/// Table consistency: each listed thread exists and points back at the one
/// owner listing it.
fn check_links(table: &ProcessTable) -> Result<(), TestCaseError> {
    let mut owners: HashMap<u32, u32> = HashMap::new();
    for proc in table.iter() {
        prop_assert_eq!(table.find(proc.tid).map(|p| p.tid), Some(proc.tid));
        for &thread in &proc.threads {
            let previous = owners.insert(thread, proc.tid);
            prop_assert!(previous.is_none(), "tid {} listed under two owners", thread);
            let linked = table.find(thread);
            prop_assert!(linked.is_some(), "owner {} lists missing tid {}", proc.tid, thread);
            prop_assert_eq!(linked.and_then(|t| t.parent), Some(proc.tid));
        }
    }
    for proc in table.iter() {
        if let Some(parent) = proc.parent {
            prop_assert_eq!(owners.get(&proc.tid), Some(&parent));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn thread_links_stay_consistent(ops in prop::collection::vec(op(), 0..200)) {
        let mut table = ProcessTable::new();
        apply(&mut table, &ops);
        check_links(&table)?;
    }

    #[test]
    fn dispatched_forks_and_frees_keep_the_table_linked(
        events in prop::collection::vec(lifecycle(), 0..150)
    ) {
        let mut agg = Aggregator::new(FilterSet::Disabled, ProbeSet::default(), Duration::from_secs(1));
        let mut last_seen: HashMap<u32, usize> = HashMap::new();
        let mut freed: HashMap<u32, usize> = HashMap::new();

        for (i, lifecycle) in events.iter().enumerate() {
            let ts = i as u64 * 10;
            let event = match *lifecycle {
                Lifecycle::Fork { parent, child, thread } => {
                    let child_pid = if thread { parent } else { child };
                    for tid in [parent, child, child_pid] {
                        last_seen.insert(tid, i);
                    }
                    emitted_by("sched_process_fork", ts, parent)
                        .with_int("parent_pid", i64::from(parent))
                        .with_int("child_pid", i64::from(child_pid))
                        .with_int("child_tid", i64::from(child))
                        .with_str("child_comm", format!("task-{child}"))
                }
                Lifecycle::Free(tid) => {
                    freed.insert(tid, i);
                    emitted_by("sched_process_free", ts, REAPER).with_int("tid", i64::from(tid))
                }
            };
            prop_assert!(agg.dispatch(&event).is_ok());
            check_links(agg.processes())?;
        }

        prop_assert!(agg.processes().find(REAPER).is_some());
        for (&tid, &at) in &freed {
            if last_seen.get(&tid).is_none_or(|&seen| seen < at) {
                prop_assert!(agg.processes().find(tid).is_none(), "tid {} outlived its free", tid);
            }
        }
    }

    #[test]
    fn remove_forgets_the_tid(ops in prop::collection::vec(op(), 0..100), victim in 0u32..16) {
        let mut table = ProcessTable::new();
        apply(&mut table, &ops);
        let before = table.len();
        let existed = table.find(victim).is_some();

        table.remove(victim);

        prop_assert!(table.find(victim).is_none());
        prop_assert_eq!(table.len(), before - usize::from(existed));
        prop_assert!(table.iter().all(|p| !p.threads.contains(&victim) && p.parent != Some(victim)));
    }
}
