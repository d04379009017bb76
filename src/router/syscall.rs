use crate::aggregator::Aggregator;
use crate::error::EventError;
use crate::system::files::{OpenFile, PendingSyscall, SyscallOutcome};
use crate::trace::Event;

fn set_pending(agg: &mut Aggregator, event: &Event, pending: PendingSyscall) -> Result<(), EventError> {
    let tid = event.context().id("tid")?;
    if let Some(thread) = agg.processes.find_mut(tid) {
        thread.pending = Some(pending);
    }
    Ok(())
}

pub(super) fn sys_open(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let filename = event.str("filename")?;
    set_pending(agg, event, PendingSyscall::Open { filename })
}

pub(super) fn sys_read(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let fd = event.int("fd")?;
    set_pending(agg, event, PendingSyscall::Read { fd })
}

pub(super) fn sys_write(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let fd = event.int("fd")?;
    set_pending(agg, event, PendingSyscall::Write { fd })
}

pub(super) fn sys_close(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let fd = event.int("fd")?;
    set_pending(agg, event, PendingSyscall::Close { fd })
}

pub(super) fn exit_syscall(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    let tid = event.context().id("tid")?;
    let ret = event.int("ret")?;
    let Some(pending) = agg.processes.find_mut(tid).and_then(|t| t.pending.take()) else {
        return Ok(());
    };
    let outcome = pending.complete(ret);

    // Byte totals go on the thread, the fd table on its process.
    if let Some(thread) = agg.processes.find_mut(tid) {
        match outcome {
            SyscallOutcome::Read { bytes, .. } => {
                thread.read_bytes = thread.read_bytes.saturating_add(bytes)
            }
            SyscallOutcome::Wrote { bytes, .. } => {
                thread.write_bytes = thread.write_bytes.saturating_add(bytes)
            }
            _ => {}
        }
    }

    let Some(owner) = agg
        .processes
        .owner_of(tid)
        .and_then(|owner| agg.processes.find_mut(owner))
    else {
        return Ok(());
    };
    match outcome {
        SyscallOutcome::Opened { fd, filename } => {
            owner.files.insert(fd, OpenFile::new(fd, filename));
        }
        SyscallOutcome::Read { fd, bytes } => {
            if let Some(file) = owner.files.get_mut(&fd) {
                file.read_bytes = file.read_bytes.saturating_add(bytes);
            }
        }
        SyscallOutcome::Wrote { fd, bytes } => {
            if let Some(file) = owner.files.get_mut(&fd) {
                file.write_bytes = file.write_bytes.saturating_add(bytes);
            }
        }
        SyscallOutcome::Closed { fd } => {
            owner.files.remove(&fd);
        }
        SyscallOutcome::Failed => {}
    }
    Ok(())
}

pub(super) fn statedump_file_descriptor(
    agg: &mut Aggregator,
    event: &Event,
) -> Result<(), EventError> {
    let pid = event.id("pid")?;
    let fd = event.int("fd")?;
    let filename = event.str("filename")?;
    if let Some(owner) = agg.processes.find_mut(pid) {
        owner.files.insert(fd, OpenFile::new(fd, filename));
    }
    Ok(())
}
