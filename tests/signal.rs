//! Termination signals reach a supervisor that listens for them.
//!
//! Kept in its own test binary: the signal is sent to the whole process.
#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{drain, of, payload, pool, report, root, Script, ScriptedSpawner};
use legion::{Role, SIGNAL_EXIT_CODE};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn sigterm_shuts_the_pool_down_with_one() {
    // Keeps the default disposition from killing the test process.
    let _guard = signal(SignalKind::terminate()).unwrap();

    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, mut events) = root(pool(2, 2, true), spawner.clone());
    let handle = builder
        .handle_os_signals(true)
        .build()
        .start(payload())
        .unwrap();
    assert_eq!(handle.live_units().await.len(), 2);
    handle.live_units().await;
    sleep(Duration::from_millis(50)).await;

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let code = timeout(Duration::from_secs(5), handle.wait()).await.unwrap();
    assert_eq!(code, 1);
    assert_eq!(spawner.killed(), 2);

    let events = drain(&mut events);
    let killed = of(&events, "end", &Role::Worker);
    assert_eq!(killed.len(), 2);
    assert!(killed
        .iter()
        .all(|ev| report(ev).exit_code == SIGNAL_EXIT_CODE));
    let last = events.last().unwrap();
    assert_eq!((last.kind(), last.role()), ("end", &Role::Root));
    assert_eq!(report(last).exit_code, 1);
}
