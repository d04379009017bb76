//! Open-file and syscall bookkeeping.
//!
//! Syscall entry events only record what was asked; the matching
//! `exit_syscall` return value decides what actually happened.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFile {
    pub fd: i64,
    pub name: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl OpenFile {
    pub fn new(fd: i64, name: impl Into<String>) -> Self {
        OpenFile {
            fd,
            name: name.into(),
            read_bytes: 0,
            write_bytes: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingSyscall {
    Open { filename: String },
    Read { fd: i64 },
    Write { fd: i64 },
    Close { fd: i64 },
}

/// What a completed syscall changed, for the caller to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyscallOutcome {
    Opened { fd: i64, filename: String },
    Read { fd: i64, bytes: u64 },
    Wrote { fd: i64, bytes: u64 },
    Closed { fd: i64 },
    Failed,
}

impl PendingSyscall {
    pub fn complete(self, ret: i64) -> SyscallOutcome {
        match self {
            PendingSyscall::Open { filename } if ret >= 0 => {
                SyscallOutcome::Opened { fd: ret, filename }
            }
            PendingSyscall::Read { fd } if ret > 0 => SyscallOutcome::Read {
                fd,
                bytes: ret.unsigned_abs(),
            },
            PendingSyscall::Write { fd } if ret > 0 => SyscallOutcome::Wrote {
                fd,
                bytes: ret.unsigned_abs(),
            },
            PendingSyscall::Close { fd } if ret == 0 => SyscallOutcome::Closed { fd },
            _ => SyscallOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_succeeds_on_non_negative_fd() {
        let pending = PendingSyscall::Open {
            filename: "/etc/hosts".into(),
        };
        assert_eq!(
            pending.complete(3),
            SyscallOutcome::Opened {
                fd: 3,
                filename: "/etc/hosts".into()
            }
        );
    }

    #[test]
    fn errors_and_empty_reads_change_nothing() {
        assert_eq!(
            PendingSyscall::Open {
                filename: "x".into()
            }
            .complete(-2),
            SyscallOutcome::Failed
        );
        assert_eq!(PendingSyscall::Read { fd: 3 }.complete(0), SyscallOutcome::Failed);
        assert_eq!(PendingSyscall::Close { fd: 3 }.complete(-9), SyscallOutcome::Failed);
        assert_eq!(
            PendingSyscall::Write { fd: 1 }.complete(12),
            SyscallOutcome::Wrote { fd: 1, bytes: 12 }
        );
    }
}
