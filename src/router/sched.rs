use tracing::debug;

use crate::aggregator::Aggregator;
use crate::error::EventError;
use crate::system::process::ProcessUpdate;
use crate::trace::Event;

pub(super) fn sched_switch(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let cpu_id = event.cpu()?;
    let prev_comm = event.str("prev_comm")?;
    let prev_tid = event.id("prev_tid")?;
    let next_comm = event.str("next_comm")?;
    let next_tid = event.id("next_tid")?;
    let hostname = event.context().opt_str("hostname")?;
    let timestamp = event.timestamp;

    agg.processes
        .find_or_create(prev_tid, &prev_comm, timestamp, hostname.as_deref());
    agg.processes
        .find_or_create(next_tid, &next_comm, timestamp, hostname.as_deref());

    let elapsed = agg
        .cpus
        .get_or_create(cpu_id)
        .switch_to(prev_tid, next_tid, timestamp);
    if let Some(ns) = elapsed
        && let Some(prev) = agg.processes.find_mut(prev_tid)
    {
        prev.cpu_ns = prev.cpu_ns.saturating_add(ns);
    }
    Ok(())
}

pub(super) fn process_fork(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let parent_pid = event.id("parent_pid")?;
    let child_comm = event.str("child_comm")?;
    let child_tid = event.id("child_tid")?;
    let child_pid = event.id("child_pid")?;
    let hostname = event.context().opt_str("hostname")?;
    let timestamp = event.timestamp;

    let Some(child) =
        agg.processes
            .find_or_create(child_tid, &child_comm, timestamp, hostname.as_deref())
    else {
        debug!(child_tid, "process table full, fork skipped");
        return Ok(());
    };
    child.pid = child_pid;
    child.ppid = parent_pid;
    if child.comm != child_comm {
        child.comm = child_comm;
    }
    agg.processes.link_parent(child_pid, child_tid, timestamp);

    if agg.filter.on_fork(parent_pid, child_tid) {
        debug!(parent_pid, child_tid, "following forked child");
    }
    Ok(())
}

pub(super) fn process_free(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let tid = event.id("tid")?;
    if agg.processes.remove(tid).is_some() {
        agg.cpus.clear_task(tid);
    }
    Ok(())
}

pub(super) fn statedump_process_state(
    agg: &mut Aggregator,
    event: &Event,
) -> Result<(), EventError> {
    let tid = event.id("tid")?;
    let pid = event.id("pid")?;
    let ppid = event.id("ppid")?;
    let name = event.str("name")?;
    let hostname = event.context().opt_str("hostname")?;
    let update = ProcessUpdate {
        pid,
        tid,
        ppid,
        vpid: event.opt_id("vpid")?,
        vtid: event.opt_id("vtid")?,
        vppid: event.opt_id("vppid")?,
        comm: &name,
        hostname: hostname.as_deref(),
    };
    let timestamp = event.timestamp;

    if agg
        .processes
        .find_or_create(tid, &name, timestamp, update.hostname)
        .is_none()
    {
        return Ok(());
    }
    agg.processes.update(tid, &update);
    agg.processes.link_parent(pid, tid, timestamp);
    Ok(())
}
