mod common;

use std::time::Duration;

use common::{drain, of, payload, pool, report, root, Script, ScriptedSpawner, FIRST_UNIT, ROOT_ID};
use legion::{
    ConfigError, Envelope, ExitReason, Orders, PoolOptions, Role, TaskSource, ERROR_EVENT,
    SIGNAL_EXIT_CODE,
};
use serde_json::Value;
use tokio::time::{sleep, Instant};

#[tokio::test(start_paused = true)]
async fn initial_burst_then_ramp_up_to_max() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let mut options = pool(2, 5, true);
    options.stagger = true;
    options.stagger_interval_ms = 1_000;
    let (builder, _events) = root(options, spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.live_units().await.len(), 2);

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(handle.live_units().await.len(), 5);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(spawner.spawned(), 5);
    assert_eq!(handle.shutdown(0).await, 0);
}

#[tokio::test(start_paused = true)]
async fn initial_above_max_spawns_initial_only() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, _events) = root(pool(4, 2, true), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.live_units().await.len(), 4);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(spawner.spawned(), 4);
    handle.shutdown(0).await;
}

#[tokio::test(start_paused = true)]
async fn staggered_units_are_paced() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let mut options = pool(0, 3, true);
    options.stagger = true;
    options.stagger_interval_ms = 1_000;
    let (builder, _events) = root(options, spawner.clone());

    let t0 = Instant::now();
    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_secs(5)).await;

    let times = spawner.spawn_times();
    assert_eq!(times.len(), 3);
    for (k, at) in times.iter().enumerate() {
        let k = k as u32 + 1;
        assert!(at.duration_since(t0) >= Duration::from_secs(1) * k);
    }
    handle.shutdown(0).await;
}

#[tokio::test(start_paused = true)]
async fn reinforce_replaces_every_exit_once() {
    let spawner = ScriptedSpawner::new(Script::exit(1_000, 0));
    let (builder, mut events) = root(pool(2, 2, true), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_millis(3_500)).await;
    handle.shutdown(0).await;

    let events = drain(&mut events);
    let started = of(&events, "start", &Role::Worker).len();
    let natural = of(&events, "end", &Role::Worker)
        .into_iter()
        .filter(|ev| report(ev).exit_code == 0)
        .count();
    assert!(natural >= 4);
    assert_eq!(started, 2 + natural);
    assert_eq!(spawner.spawned(), started);
}

#[tokio::test(start_paused = true)]
async fn staggered_reinforcement_waits_one_interval() {
    let spawner = ScriptedSpawner::per_unit(|n| match n {
        0 => Script::exit(100, 2),
        _ => Script::Hang,
    });
    let mut options = pool(1, 1, true);
    options.stagger = true;
    options.stagger_interval_ms = 1_000;
    let (builder, mut events) = root(options, spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_millis(1_050)).await;
    assert_eq!(spawner.spawned(), 1);
    assert!(handle.live_units().await.is_empty());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.live_units().await, vec![FIRST_UNIT + 1]);

    let times = spawner.spawn_times();
    let gap = times[1].duration_since(times[0]);
    assert!(gap >= Duration::from_millis(1_100), "replacement after {gap:?}");
    assert!(gap < Duration::from_millis(1_150), "replacement after {gap:?}");

    handle.shutdown(0).await;
    let events = drain(&mut events);
    assert_eq!(report(of(&events, "end", &Role::Worker)[0]).exit_code, 2);
}

#[tokio::test(start_paused = true)]
async fn without_reinforce_shuts_down_when_last_unit_exits() {
    let spawner = ScriptedSpawner::per_unit(|n| match n {
        0 => Script::exit(1_000, 0),
        _ => Script::exit(2_000, 3),
    });
    let (builder, mut events) = root(pool(2, 2, false), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(handle.exit_code(), None);
    assert_eq!(handle.live_units().await, vec![FIRST_UNIT + 1]);

    assert_eq!(handle.wait().await, 3);
    assert_eq!(spawner.spawned(), 2);

    let events = drain(&mut events);
    let last = events.last().unwrap();
    assert_eq!((last.kind(), last.role()), ("end", &Role::Root));
    assert_eq!(report(last).exit_code, 3);
    assert_eq!(report(last).reason, ExitReason::Fired);
}

#[tokio::test(start_paused = true)]
async fn unit_deadline_kills_with_signal_sentinel() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let mut options = pool(0, 1, false);
    options.per_unit_timeout_ms = Some(100);
    let (builder, mut events) = root(options, spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, SIGNAL_EXIT_CODE);
    assert_eq!(spawner.killed(), 1);

    let events = drain(&mut events);
    let ended = of(&events, "end", &Role::Worker);
    assert_eq!(ended.len(), 1);
    let report = report(ended[0]);
    assert_eq!(report.reason, ExitReason::Fired);
    assert_eq!(report.exit_code, SIGNAL_EXIT_CODE);
    assert!((100..200).contains(&report.duration));
}

#[tokio::test(start_paused = true)]
async fn deadline_only_hits_slow_units() {
    let spawner = ScriptedSpawner::per_unit(|n| match n {
        0 => Script::exit(50, 0),
        _ => Script::Hang,
    });
    let mut options = pool(2, 2, false);
    options.per_unit_timeout_ms = Some(100);
    let (builder, mut events) = root(options, spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    handle.wait().await;

    let events = drain(&mut events);
    let codes: Vec<i32> = of(&events, "end", &Role::Worker)
        .into_iter()
        .map(|ev| report(ev).exit_code)
        .collect();
    assert_eq!(codes, vec![0, SIGNAL_EXIT_CODE]);
    assert_eq!(spawner.killed(), 1);
}

#[tokio::test(start_paused = true)]
async fn global_deadline_shuts_down_cleanly() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let mut options = pool(2, 2, true);
    options.global_timeout_ms = Some(500);
    let (builder, mut events) = root(options, spawner.clone());

    let t0 = Instant::now();
    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, 0);
    assert!(t0.elapsed() >= Duration::from_millis(500));

    let events = drain(&mut events);
    let killed = of(&events, "end", &Role::Worker);
    assert_eq!(killed.len(), 2);
    assert!(killed
        .iter()
        .all(|ev| report(ev).exit_code == SIGNAL_EXIT_CODE));
    assert_eq!(report(events.last().unwrap()).exit_code, 0);
    assert_eq!(spawner.killed(), 2);
}

#[tokio::test(start_paused = true)]
async fn century_deadlines_are_armed_without_fault() {
    let century = 100 * 365 * 24 * 60 * 60 * 1_000_u64;
    let spawner = ScriptedSpawner::new(Script::Hang);
    let mut options = pool(1, 3, true);
    options.global_timeout_ms = Some(century);
    options.per_unit_timeout_ms = Some(century);
    options.stagger = true;
    options.stagger_interval_ms = century;
    let (builder, mut events) = root(options, spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.exit_code(), None);
    assert_eq!(handle.live_units().await, vec![FIRST_UNIT]);

    assert_eq!(handle.shutdown(4).await, 4);
    let events = drain(&mut events);
    assert!(events.iter().all(|ev| ev.kind() != ERROR_EVENT));
    assert_eq!(report(events.last().unwrap()).exit_code, 4);
}

#[tokio::test(start_paused = true)]
async fn shutdown_twice_is_a_no_op() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, mut events) = root(pool(3, 3, true), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.live_units().await.len(), 3);

    assert_eq!(handle.shutdown(5).await, 5);
    assert_eq!(handle.shutdown(7).await, 5);
    assert_eq!(handle.exit_code(), Some(5));
    assert!(handle.live_units().await.is_empty());

    let events = drain(&mut events);
    assert_eq!(of(&events, "end", &Role::Worker).len(), 3);
    assert_eq!(of(&events, "end", &Role::Root).len(), 1);
    assert_eq!(spawner.killed(), 3);
    assert_eq!(spawner.spawned(), 3);
}

#[tokio::test(start_paused = true)]
async fn start_twice_leaves_first_run_untouched() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, _events) = root(pool(2, 2, true), spawner.clone());

    let mut supervisor = builder.build();
    let handle = supervisor.start(payload()).unwrap();
    assert!(supervisor.is_started());

    let err = supervisor.start(payload()).unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyStarted));
    assert_eq!(handle.live_units().await.len(), 2);
    assert_eq!(spawner.spawned(), 2);
    handle.shutdown(0).await;
}

#[tokio::test(start_paused = true)]
async fn flat_pool_end_to_end() {
    let spawner = ScriptedSpawner::new(Script::exit(10, 0));
    let (builder, mut events) = root(pool(0, 3, false), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, 0);

    let events = drain(&mut events);
    assert_eq!(events.first().unwrap().kind(), "start");
    assert_eq!(events.first().unwrap().role(), &Role::Root);

    let started = of(&events, "start", &Role::Worker);
    assert_eq!(started.len(), 3);
    assert!(started.iter().all(|ev| ev.owner() == Some(ROOT_ID)));

    let ended = of(&events, "end", &Role::Worker);
    assert_eq!(ended.len(), 3);
    for ev in &ended {
        let report = report(ev);
        assert_eq!((report.reason, report.exit_code), (ExitReason::Quit, 0));
    }

    let last = events.last().unwrap();
    assert_eq!((last.kind(), last.role()), ("end", &Role::Root));
    assert_eq!(report(last).exit_code, 0);
    assert_eq!(of(&events, "end", &Role::Root).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_command_carries_task_and_payload() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, _events) = root(pool(1, 1, true), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    sleep(Duration::from_millis(1)).await;

    let inbox = spawner.received(FIRST_UNIT);
    let start = inbox.first().expect("start command");
    assert_eq!(start.kind(), "start");
    assert_eq!((start.id(), start.owner()), (FIRST_UNIT, Some(ROOT_ID)));

    let orders = Orders::from_value(start.data().clone()).unwrap();
    assert_eq!(orders.task, TaskSource::registered("job"));
    assert_eq!(orders.payload, payload());
    assert!(orders.pool.is_none());
    handle.shutdown(0).await;
}

#[tokio::test(start_paused = true)]
async fn empty_pool_without_reinforce_ends_immediately() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, mut events) = root(pool(0, 0, false), spawner.clone());

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, 0);
    assert_eq!(spawner.spawned(), 0);

    let kinds: Vec<String> = drain(&mut events).iter().map(|ev| ev.kind().to_string()).collect();
    assert_eq!(kinds, ["start", "end"]);
}

#[tokio::test(start_paused = true)]
async fn invalid_configuration_spawns_nothing() {
    let spawner = ScriptedSpawner::new(Script::Hang);

    let (builder, _events) = root(
        PoolOptions {
            max_pool_size: Some(-1),
            ..pool(0, 0, true)
        },
        spawner.clone(),
    );
    let err = builder.build().start(payload()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPoolSize { value: Some(-1) }));

    let (builder, _events) = root(
        PoolOptions {
            task: None,
            ..pool(1, 1, true)
        },
        spawner.clone(),
    );
    let err = builder.build().start(payload()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingTask));

    let (builder, _events) = root(
        PoolOptions {
            task: Some(TaskSource::registered("nope")),
            ..pool(1, 1, true)
        },
        spawner.clone(),
    );
    let err = builder.build().start(payload()).unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvableTask { .. }));

    assert_eq!(spawner.spawned(), 0);
}

#[tokio::test(start_paused = true)]
async fn unit_messages_are_relayed_upward() {
    let spawner = ScriptedSpawner::per_unit(|n| Script::Emit {
        kind: "progress",
        role: if n == 0 {
            Role::Worker
        } else {
            Role::Unknown("observer".into())
        },
        after: Duration::from_millis(10),
        code: 0,
    });
    let (builder, mut events) = root(pool(2, 2, false), spawner);

    builder.build().start(payload()).unwrap().wait().await;

    let events = drain(&mut events);
    let progress: Vec<&Envelope> = events.iter().filter(|ev| ev.kind() == "progress").collect();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].id(), FIRST_UNIT);
    assert_eq!(progress[0].owner(), Some(ROOT_ID));
}

#[tokio::test(start_paused = true)]
async fn units_cannot_forge_lifecycle_events() {
    let spawner = ScriptedSpawner::per_unit(|n| Script::Emit {
        kind: if n == 0 { "end" } else { "start" },
        role: Role::Worker,
        after: Duration::from_millis(10),
        code: 0,
    });
    let (builder, mut events) = root(pool(2, 2, false), spawner);

    assert_eq!(builder.build().start(payload()).unwrap().wait().await, 0);

    let events = drain(&mut events);
    for id in [FIRST_UNIT, FIRST_UNIT + 1] {
        let ended: Vec<&Envelope> = of(&events, "end", &Role::Worker)
            .into_iter()
            .filter(|ev| ev.id() == id)
            .collect();
        assert_eq!(ended.len(), 1, "unit {id}");
        assert_eq!(report(ended[0]).reason, ExitReason::Quit);
    }
    assert_eq!(of(&events, "start", &Role::Worker).len(), 2);
    assert!(events.iter().all(|ev| ev.data().get("from").is_none()));
}

#[tokio::test(start_paused = true)]
async fn deliver_routes_by_unit_id() {
    let spawner = ScriptedSpawner::new(Script::Hang);
    let (builder, _events) = root(pool(2, 2, true), spawner.clone());
    let handle = builder.build().start(payload()).unwrap();
    handle.live_units().await;

    let poke = Envelope::control("poke", Role::Worker, FIRST_UNIT + 1, Some(ROOT_ID), Value::Null);
    handle.deliver(poke.clone());
    handle.deliver(Envelope::control("poke", Role::Root, FIRST_UNIT, None, Value::Null));
    handle.live_units().await;
    sleep(Duration::from_millis(10)).await;

    assert_eq!(spawner.received(FIRST_UNIT).len(), 1);
    assert_eq!(spawner.received(FIRST_UNIT + 1).last(), Some(&poke));
    handle.shutdown(0).await;
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_is_a_fault() {
    let spawner = ScriptedSpawner::failing();
    let (builder, mut events) = root(pool(1, 1, true), spawner);

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, 1);

    let events = drain(&mut events);
    let error = events.iter().find(|ev| ev.kind() == ERROR_EVENT).unwrap();
    assert!(error.data()["error"]
        .as_str()
        .unwrap()
        .contains("scripted spawn failure"));
    assert_eq!(report(events.last().unwrap()).exit_code, 1);
}

#[tokio::test(start_paused = true)]
async fn loop_panic_is_contained() {
    let spawner = ScriptedSpawner::panicking();
    let (builder, mut events) = root(pool(1, 1, true), spawner);

    let handle = builder.build().start(payload()).unwrap();
    assert_eq!(handle.wait().await, 1);

    let events = drain(&mut events);
    let error = events.iter().find(|ev| ev.kind() == ERROR_EVENT).unwrap();
    assert_eq!(error.data()["error"], "scripted spawner panic");
    let last = events.last().unwrap();
    assert_eq!((last.kind(), last.role()), ("end", &Role::Root));
    assert_eq!(report(last).exit_code, 1);
}
