//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal and
//! names it. Root and group supervisors turn it into `shutdown(1)`; leaf
//! workers exit with code `1`.
//!
//! | platform | signals                                  |
//! |----------|------------------------------------------|
//! | unix     | `SIGINT`, `SIGTERM`, `SIGHUP`, `SIGQUIT` |
//! | other    | Ctrl-C                                   |
//!
//! Listeners are registered per call, so every supervisor in a process sees
//! the same signal.

/// Waits for a termination signal and returns its name.
///
/// Fails only if the listeners cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for a termination signal and returns its name.
///
/// Fails only if the listener cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
