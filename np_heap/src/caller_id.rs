use core::fmt;

/// Identity of the process (or thread of control) that issued a request.
///
/// The transport layer decides what this is, e.g. a pid. The heap only uses it
/// for log prefixes and to remember who holds an object lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(pub u32);

impl CallerId {
    /// Identity of the current process, as reported by `getpid`.
    pub fn current_process() -> Self {
        CallerId(unsafe { libc::getpid() } as u32)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
