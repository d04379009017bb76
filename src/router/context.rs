use tracing::debug;

use crate::aggregator::Aggregator;
use crate::error::EventError;
use crate::system::perf_counter;
use crate::system::process::ProcessUpdate;
use crate::trace::Event;

/// Context fields every event carries for the thread that emitted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Context {
    pub pid: u32,
    pub tid: u32,
    pub ppid: u32,
    pub vpid: Option<u32>,
    pub vtid: Option<u32>,
    pub vppid: Option<u32>,
    pub comm: String,
    pub hostname: Option<String>,
}

impl Context {
    pub fn from_event(event: &Event) -> Result<Self, EventError> {
        let ctx = event.context();
        Ok(Context {
            pid: ctx.id("pid")?,
            tid: ctx.id("tid")?,
            ppid: ctx.id("ppid")?,
            vpid: ctx.opt_id("vpid")?,
            vtid: ctx.opt_id("vtid")?,
            vppid: ctx.opt_id("vppid")?,
            comm: ctx.str("procname")?,
            hostname: ctx.opt_str("hostname")?,
        })
    }

    fn as_update(&self) -> ProcessUpdate<'_> {
        ProcessUpdate {
            pid: self.pid,
            tid: self.tid,
            ppid: self.ppid,
            vpid: self.vpid,
            vtid: self.vtid,
            vppid: self.vppid,
            comm: &self.comm,
            hostname: self.hostname.as_deref(),
        }
    }
}

/// Keep the emitting thread's record current: create it on first sight,
/// refresh its ids, link it under its process and charge its perf samples.
pub(super) fn fix_process_table(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let ctx = Context::from_event(event)?;
    let timestamp = event.timestamp;

    if agg
        .processes
        .find_or_create(ctx.tid, &ctx.comm, timestamp, ctx.hostname.as_deref())
        .is_none()
    {
        debug!(tid = ctx.tid, "process table full, event context skipped");
        return Ok(());
    }
    agg.processes.update(ctx.tid, &ctx.as_update());
    agg.processes.link_parent(ctx.pid, ctx.tid, timestamp);

    charge_perf_samples(agg, event, ctx.tid);
    Ok(())
}

fn charge_perf_samples(agg: &mut Aggregator, event: &Event, tid: u32) {
    let Some(cpu_id) = event.cpu_id else {
        return;
    };
    let Some(process) = agg.processes.find_mut(tid) else {
        return;
    };
    let cpu = agg.cpus.get_or_create(cpu_id);
    for (name, raw) in event.perf_samples() {
        perf_counter::observe(&mut agg.counters, cpu, process, name, raw);
    }
}
