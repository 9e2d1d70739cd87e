//! Top-level supervision for the long-running actor roles named in §5
//! (tick/engine×3 scheduler, stream, lifecycle, checkpoint). Generalizes
//! a single-loop watchdog into one that tracks several named roles.
//!
//! Policy: restart a crashed actor once; a second crash within the same
//! tracking window escalates to [`crate::error::invariant`]'s abort path,
//! matching §7's "abort process with a diagnostic" for invariant failures.
//! An ordinary actor panic is not itself an invariant violation and gets one
//! restart attempt first.

use std::collections::HashMap;

use tracing::{error, warn};

use crate::error::invariant;

#[derive(Debug, Default)]
struct RoleRecord {
    restart_count: u32,
}

/// Tracks restart counts per named role. Not an actor itself: `main` calls
/// [`Supervisor::record_crash`] when it observes a supervised task's
/// `JoinHandle` complete unexpectedly, then decides whether to respawn.
pub struct Supervisor {
    roles: HashMap<String, RoleRecord>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self { roles: HashMap::new() }
    }

    /// Record a crash for `role`. Returns `true` if the caller should
    /// restart the actor, `false` if the role has exhausted its single
    /// restart attempt (in which case this function has already aborted the
    /// process via [`invariant`] and will not return `false` in practice —
    /// the boolean return exists for callers that wish to log before the
    /// abort takes effect).
    pub fn record_crash(&mut self, role: &str) -> bool {
        let record = self.roles.entry(role.to_string()).or_default();
        record.restart_count += 1;

        if record.restart_count == 1 {
            warn!(role, "actor crashed, restarting once");
            true
        } else {
            error!(role, restarts = record.restart_count, "actor crashed again, escalating");
            invariant(false, format!("actor role '{role}' crashed more than once"));
            false
        }
    }

    pub fn reset(&mut self, role: &str) {
        self.roles.remove(role);
    }
}
