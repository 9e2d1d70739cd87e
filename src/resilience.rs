//! Panic hook installation (§7 `InvariantViolation`: "abort process with a
//! diagnostic; never hide"). Keeps panic reporting and diagnosability
//! with the terminal-restore logic dropped — there is no TUI in this
//! process.

use std::sync::atomic::{AtomicBool, Ordering};

static HOOKS_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install `color_eyre`'s panic/error reporting plus a secondary hook that
/// flushes tracing output before the process aborts on an invariant
/// violation. Idempotent: a second call is a no-op.
///
/// # Errors
/// Returns an error if `color_eyre` itself fails to install (e.g. called
/// twice from different crates without going through this guard).
pub fn install_panic_hooks() -> color_eyre::Result<()> {
    if HOOKS_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    color_eyre::install()?;

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(panic = %panic_info, "process panicking, diagnostic follows");
        previous_hook(panic_info);
    }));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        // color_eyre::install() can only truly succeed once per process; we
        // only assert this doesn't panic when called repeatedly within a
        // single test binary.
        let _ = install_panic_hooks();
        let _ = install_panic_hooks();
        assert!(HOOKS_INSTALLED.load(Ordering::SeqCst));
    }
}
