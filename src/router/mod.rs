//! Event name to handler mapping.
//!
//! Global handlers run on every event, then the handlers bound to the event
//! name, then the probe counter when the name belongs to a configured probe.
//! The first failing handler ends dispatch for that event.

mod context;
mod sched;
mod syscall;
mod textdump;

use crate::aggregator::{Aggregator, Output};
use crate::error::EventError;
use crate::trace::Event;

pub use textdump::{TextDump, format_event};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    FixProcessTable,
    CheckWindow,
    TextDump,
    SchedSwitch,
    SchedProcessFork,
    SchedProcessFree,
    StatedumpProcessState,
    StatedumpFileDescriptor,
    SysOpen,
    SysRead,
    SysWrite,
    SysClose,
    ExitSyscall,
    ProbeHit,
}

/// Event names with dedicated handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    SchedSwitch,
    SchedProcessFork,
    SchedProcessFree,
    StatedumpProcessState,
    StatedumpFileDescriptor,
    SysOpen,
    SysRead,
    SysWrite,
    SysClose,
    ExitSyscall,
    Other,
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "sched_switch" => EventKind::SchedSwitch,
            "sched_process_fork" => EventKind::SchedProcessFork,
            "sched_process_free" => EventKind::SchedProcessFree,
            "lttng_statedump_process_state" => EventKind::StatedumpProcessState,
            "lttng_statedump_file_descriptor" => EventKind::StatedumpFileDescriptor,
            "sys_open" => EventKind::SysOpen,
            "sys_read" => EventKind::SysRead,
            "sys_write" => EventKind::SysWrite,
            "sys_close" => EventKind::SysClose,
            "exit_syscall" => EventKind::ExitSyscall,
            _ => EventKind::Other,
        }
    }

    pub fn handlers(self) -> &'static [Handler] {
        match self {
            EventKind::SchedSwitch => &[Handler::SchedSwitch],
            EventKind::SchedProcessFork => &[Handler::SchedProcessFork],
            EventKind::SchedProcessFree => &[Handler::SchedProcessFree],
            EventKind::StatedumpProcessState => &[Handler::StatedumpProcessState],
            EventKind::StatedumpFileDescriptor => &[Handler::StatedumpFileDescriptor],
            EventKind::SysOpen => &[Handler::SysOpen],
            EventKind::SysRead => &[Handler::SysRead],
            EventKind::SysWrite => &[Handler::SysWrite],
            EventKind::SysClose => &[Handler::SysClose],
            EventKind::ExitSyscall => &[Handler::ExitSyscall],
            EventKind::Other => &[],
        }
    }
}

/// Handlers run on every event. The window check goes first so a snapshot
/// closed by an event does not include that event.
fn global_handlers(agg: &Aggregator) -> &'static [Handler] {
    match agg.output {
        Output::Snapshots(_) => &[Handler::CheckWindow, Handler::FixProcessTable],
        Output::Text(_) => &[Handler::TextDump, Handler::FixProcessTable],
        Output::Detached => &[Handler::FixProcessTable],
    }
}

pub(crate) fn dispatch(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    for handler in global_handlers(agg) {
        run(*handler, agg, event)?;
    }
    for handler in EventKind::from_name(&event.name).handlers() {
        run(*handler, agg, event)?;
    }
    if agg.probes.get(&event.name).is_some() {
        run(Handler::ProbeHit, agg, event)?;
    }
    Ok(())
}

fn run(handler: Handler, agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    match handler {
        Handler::FixProcessTable => context::fix_process_table(agg, event),
        Handler::CheckWindow => {
            if let Some((start, end)) = agg.window.advance(event.timestamp) {
                agg.publish(start, end);
            }
            Ok(())
        }
        Handler::TextDump => textdump::print_event(agg, event),
        Handler::SchedSwitch => sched::sched_switch(agg, event),
        Handler::SchedProcessFork => sched::process_fork(agg, event),
        Handler::SchedProcessFree => sched::process_free(agg, event),
        Handler::StatedumpProcessState => sched::statedump_process_state(agg, event),
        Handler::StatedumpFileDescriptor => syscall::statedump_file_descriptor(agg, event),
        Handler::SysOpen => syscall::sys_open(agg, event),
        Handler::SysRead => syscall::sys_read(agg, event),
        Handler::SysWrite => syscall::sys_write(agg, event),
        Handler::SysClose => syscall::sys_close(agg, event),
        Handler::ExitSyscall => syscall::exit_syscall(agg, event),
        Handler::ProbeHit => {
            agg.probes.record_hit(&event.name);
            Ok(())
        }
    }
}
