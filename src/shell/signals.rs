use log::debug;
use nix::sys::signal::{signal, SigHandler, Signal};

/// Keyboard signals the interactive shell must survive while a pipeline
/// runs in the foreground.
const INTERACTIVE_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

pub fn ignore_interactive_signals() -> nix::Result<()> {
    for sig in INTERACTIVE_SIGNALS {
        // SAFETY: `SigIgn` installs no handler code.
        unsafe { signal(sig, SigHandler::SigIgn) }?;
    }
    debug!("已忽略 SIGINT/SIGQUIT");
    Ok(())
}

/// Called in a forked child before exec; ignored dispositions survive exec.
pub fn restore_default_signals() {
    for sig in INTERACTIVE_SIGNALS {
        // SAFETY: `SigDfl` installs no handler code.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}
