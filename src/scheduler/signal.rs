//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves to the name of the first termination signal
//! received: `SIGINT`, `SIGTERM` or `SIGQUIT` on Unix, `ctrl-c` elsewhere.

/// Waits for a termination signal and returns its name.
///
/// Returns `Err` if a signal listener cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    let mut signals = unix::Listeners::register()?;
    Ok(signals.recv().await)
}

/// Waits for Ctrl-C and returns its name.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

#[cfg(unix)]
mod unix {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// Handlers installed for the three termination signals.
    pub(super) struct Listeners {
        interrupt: Signal,
        terminate: Signal,
        quit: Signal,
    }

    impl Listeners {
        pub(super) fn register() -> std::io::Result<Self> {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
                quit: signal(SignalKind::quit())?,
            })
        }

        pub(super) async fn recv(&mut self) -> &'static str {
            tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
                _ = self.quit.recv() => "SIGQUIT",
            }
        }
    }

}
