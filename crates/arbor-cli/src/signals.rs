//! Termination signals and operator interrupts run the same shutdown
//! sequence as `exit`. At the line-editor prompt Ctrl-C never reaches here:
//! raw mode turns it into an interrupted read.

use anyhow::Result;
use arbor_shell::ShutdownCoordinator;
use std::sync::Arc;

#[cfg(unix)]
pub fn install(coordinator: Arc<ShutdownCoordinator>) -> Result<()> {
    use anyhow::anyhow;
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
        .map_err(|e| anyhow!("failed to register termination signals: {e}"))?;
    thread::Builder::new()
        .name("arbor-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::info!(signal, "termination requested");
                coordinator.shutdown(
                    arbor_shell::ShutdownReason::Signal(signal),
                    &mut std::io::stdout(),
                );
                std::process::exit(128 + signal);
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
pub fn install(_coordinator: Arc<ShutdownCoordinator>) -> Result<()> {
    Ok(())
}
