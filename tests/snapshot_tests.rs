use std::time::Duration;

use insta::assert_snapshot;
use tracetop::aggregator::Aggregator;
use tracetop::probe::ProbeSet;
use tracetop::system::filter::FilterSet;
use tracetop::system::snapshot::Snapshot;
use tracetop::trace::Event;

fn ctx(name: &str, ts: u64, pid: i64, tid: i64, ppid: i64, comm: &str) -> Event {
    Event::new(name, ts)
        .on_cpu(0)
        .with_ctx_int("pid", pid)
        .with_ctx_int("tid", tid)
        .with_ctx_int("ppid", ppid)
        .with_ctx_str("procname", comm)
}

/// Enumerated by the session daemon, which is the event's context.
fn statedump(ts: u64, tid: i64, pid: i64, ppid: i64, name: &str) -> Event {
    ctx("lttng_statedump_process_state", ts, 500, 500, 1, "lttng-sessiond")
        .with_int("tid", tid)
        .with_int("pid", pid)
        .with_int("ppid", ppid)
        .with_str("name", name)
}

fn switch(ts: u64, from: (i64, i64, i64, &str), next_tid: i64, next_comm: &str) -> Event {
    let (pid, tid, ppid, comm) = from;
    ctx("sched_switch", ts, pid, tid, ppid, comm)
        .with_int("prev_tid", tid)
        .with_str("prev_comm", comm)
        .with_int("next_tid", next_tid)
        .with_str("next_comm", next_comm)
}

fn model() -> Aggregator {
    let mut agg = Aggregator::new(FilterSet::Disabled, ProbeSet::default(), Duration::from_secs(1));
    let events = vec![
        statedump(10, 1, 1, 0, "init"),
        statedump(20, 10, 10, 1, "sshd"),
        statedump(30, 11, 10, 1, "sshd"),
        switch(100, (0, 0, 0, "swapper"), 10, "sshd"),
        switch(400, (10, 10, 1, "sshd"), 11, "sshd"),
        ctx("sys_open", 450, 10, 11, 1, "sshd").with_str("filename", "/var/log/auth.log"),
        ctx("exit_syscall", 460, 10, 11, 1, "sshd").with_int("ret", 4),
        ctx("sys_write", 470, 10, 11, 1, "sshd")
            .with_int("fd", 4)
            .with_int("count", 100),
        ctx("exit_syscall", 480, 10, 11, 1, "sshd").with_int("ret", 100),
    ];
    let stats = agg.ingest(events, || false);
    assert_eq!(stats.rejected, 0);
    agg
}

fn normalized(snapshot: &Snapshot) -> String {
    let mut processes: Vec<_> = snapshot.processes.iter().collect();
    processes.sort_by_key(|p| p.tid);
    let mut rows: Vec<String> = processes
        .iter()
        .map(|p| {
            format!(
                "{} pid={} ppid={} comm={} parent={} threads={:?} cpu_ns={} rw={}/{} files={:?}",
                p.tid,
                p.pid,
                p.ppid,
                p.comm,
                p.parent.map_or("-".to_string(), |t| t.to_string()),
                p.threads.iter().collect::<Vec<_>>(),
                p.cpu_ns,
                p.read_bytes,
                p.write_bytes,
                p.files.keys().collect::<Vec<_>>(),
            )
        })
        .collect();
    for cpu in snapshot.cpus.iter() {
        rows.push(format!("cpu{} current={:?}", cpu.id, cpu.current));
    }
    rows.join("\n")
}

#[test]
fn deterministic_snapshot_from_statedump_and_syscalls() {
    let agg = model();
    let snapshot = agg.snapshot(0, 1_000).unwrap();

    assert_snapshot!(normalized(&snapshot), @r"
    0 pid=0 ppid=0 comm=swapper parent=- threads=[] cpu_ns=0 rw=0/0 files=[]
    1 pid=1 ppid=0 comm=init parent=- threads=[] cpu_ns=0 rw=0/0 files=[]
    10 pid=10 ppid=1 comm=sshd parent=- threads=[11] cpu_ns=300 rw=0/0 files=[4]
    11 pid=10 ppid=1 comm=sshd parent=10 threads=[] cpu_ns=0 rw=0/100 files=[]
    500 pid=500 ppid=1 comm=lttng-sessiond parent=- threads=[] cpu_ns=0 rw=0/0 files=[]
    cpu0 current=Some(11)
    ");
}

#[test]
fn snapshot_survives_later_mutation() {
    let mut agg = model();
    let before = agg.snapshot(0, 1_000).unwrap();
    let frozen = normalized(&before);

    let events = vec![
        ctx("sched_process_free", 500, 1, 1, 0, "init").with_int("tid", 11),
        switch(600, (0, 0, 0, "swapper"), 1, "init"),
        ctx("sys_close", 700, 10, 10, 1, "sshd").with_int("fd", 4),
        ctx("exit_syscall", 710, 10, 10, 1, "sshd").with_int("ret", 0),
    ];
    agg.ingest(events, || false);

    assert!(agg.processes().find(11).is_none());
    assert!(agg.processes().find(10).unwrap().files.is_empty());
    assert_eq!(normalized(&before), frozen);
    assert_eq!(before.processes.find(10).unwrap().threads.len(), 1);
}
