//! End-to-end tests wiring the dispatch engines to a minimal store loop:
//! a reducer task folds every published action into the state via
//! `reducer_delegate` and publishes snapshots through a watch channel.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use actionflow::{
    is_status_pending, reducer_delegate, Action, ActionResult, ActionStatus, AppState, BoxError,
    Bus, CallSync, Config, Epic, EpicError, EpicFailure, EpicSet, FanOutEpic, FanOutFn, Payload,
    ServiceEpic, ServiceFn, StateView, SubscriptionEpic, SubscriptionFn, UpdateSink, ERROR,
    SUCCESS,
};

#[derive(Clone, Default)]
struct TestState {
    value: i64,
    status: Vec<ActionStatus>,
}

impl AppState for TestState {
    fn status(&self) -> &[ActionStatus] {
        &self.status
    }
    fn with_status(mut self, status: Vec<ActionStatus>) -> Self {
        self.status = status;
        self
    }
}

/// Delegate reducer merging the `out` field of SUCCESS payloads.
fn merge_out(mut state: TestState, action: &Action<TestState>) -> TestState {
    if let Some(out) = action
        .payload()
        .as_value()
        .and_then(|v| v.get("out"))
        .and_then(|v| v.as_i64())
    {
        state.value = out;
    }
    state
}

/// Spawns the store side: fold actions into state, publish snapshots.
fn spawn_store(bus: &Bus<TestState>, kinds: &[&str]) -> StateView<TestState> {
    let kinds: HashSet<String> = kinds.iter().map(|k| k.to_string()).collect();
    let (tx, rx) = watch::channel(TestState::default());
    let mut actions = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(action) = actions.recv().await {
            let current = tx.borrow().clone();
            let next = reducer_delegate(current, &action, &kinds, &merge_out);
            let _ = tx.send(next);
        }
    });
    StateView::new(rx)
}

/// Collects published actions until the stream stays quiet.
async fn drain(rx: &mut broadcast::Receiver<Action<TestState>>) -> Vec<Action<TestState>> {
    let mut seen = Vec::new();
    while let Ok(Ok(action)) = timeout(Duration::from_millis(250), rx.recv()).await {
        seen.push(action);
    }
    seen
}

fn kinds_of(actions: &[Action<TestState>]) -> Vec<&str> {
    actions.iter().map(|a| a.kind()).collect()
}

#[tokio::test(start_paused = true)]
async fn single_handler_emits_follow_up_success() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &["LOAD"]);
    let mut observed = bus.subscribe();

    let epic = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |action: Action<TestState>, _state: StateView<TestState>| async move {
                sleep(Duration::from_millis(10)).await;
                let doubled = action
                    .payload()
                    .as_value()
                    .and_then(|v| v.get("in"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
                    * 2;
                Ok(Action::follow_up(
                    action,
                    SUCCESS,
                    Payload::Value(json!({ "out": doubled })),
                ))
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view.clone());
    sleep(Duration::from_millis(1)).await;

    let request = Action::new("LOAD", Payload::Value(json!({ "in": 5 })));
    let request_uuid = request.meta().uuid;
    bus.publish(request);

    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["LOAD", SUCCESS]);

    let success = &seen[1];
    assert_eq!(success.payload().as_value(), Some(&json!({ "out": 10 })));
    assert_eq!(success.meta().uuid, request_uuid);
    let related = success.meta().related.as_ref().expect("back-reference");
    assert_eq!(related.kind(), "LOAD");

    let state = view.get();
    assert_eq!(state.value, 10);
    assert_eq!(state.status.len(), 1);
    assert_eq!(state.status[0].action_type, "LOAD");
    assert_eq!(state.status[0].result, ActionResult::Success);
    assert!(!is_status_pending(&state, &["LOAD"]));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_handler_failure_becomes_error_action() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &["LOAD"]);
    let mut observed = bus.subscribe();

    let epic = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |_action: Action<TestState>, _state: StateView<TestState>| async move {
                let err: BoxError = "boom".into();
                Err(err)
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view.clone());
    sleep(Duration::from_millis(1)).await;

    let request = Action::new("LOAD", Payload::Empty);
    let request_uuid = request.meta().uuid;
    bus.publish(request);

    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["LOAD", ERROR]);

    let failure = &seen[1];
    let payload = failure.payload().as_error().expect("error payload");
    assert_eq!(payload.message, "boom");
    assert_eq!(failure.meta().uuid, request_uuid);
    let related = failure.meta().related.as_ref().expect("back-reference");
    assert_eq!(related.kind(), "LOAD");

    let state = view.get();
    assert_eq!(state.status[0].result, ActionResult::Error);
    assert_eq!(state.status[0].data["error"]["err"], json!("boom"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_handler_panic_is_contained() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |action: Action<TestState>, _state: StateView<TestState>| async move {
                if action.kind() == "LOAD" {
                    panic!("service exploded");
                }
                Ok(action)
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    bus.publish(Action::new("LOAD", Payload::Empty));

    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["LOAD", ERROR]);
    let payload = seen[1].payload().as_error().expect("error payload");
    assert_eq!(payload.message, "service exploded");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_dispatches_are_not_serialized() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |action: Action<TestState>, _state: StateView<TestState>| async move {
                sleep(Duration::from_millis(100)).await;
                Ok(Action::follow_up(action, SUCCESS, Payload::Empty))
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    let started = Instant::now();
    bus.publish(Action::new("LOAD", Payload::Empty));
    bus.publish(Action::new("LOAD", Payload::Empty));

    let mut successes = 0;
    while successes < 2 {
        let action = observed.recv().await.expect("stream open");
        if action.kind() == SUCCESS {
            successes += 1;
        }
    }
    // both dispatches slept in parallel, not back to back
    assert!(started.elapsed() < Duration::from_millis(150));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fan_out_emits_in_registration_order() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = FanOutEpic::new("SYNC")
        .with_call(
            "call1",
            FanOutFn::arc(
                |action: Action<TestState>,
                 _state: StateView<TestState>,
                 _calls: CallSync<TestState>| async move {
                    sleep(Duration::from_millis(100)).await;
                    Ok(Action::follow_up(
                        action,
                        "RESP_1",
                        Payload::Value(json!({ "out": 25 })),
                    ))
                },
            ),
        )
        .with_call(
            "call2",
            FanOutFn::arc(
                |action: Action<TestState>,
                 _state: StateView<TestState>,
                 calls: CallSync<TestState>| async move {
                    let dep = calls.result_of("call1")?.await?;
                    let out = dep
                        .payload()
                        .as_value()
                        .and_then(|v| v.get("out"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0)
                        * 2;
                    Ok(Action::follow_up(
                        action,
                        "RESP_2",
                        Payload::Value(json!({ "out": out })),
                    ))
                },
            ),
        )
        .with_call(
            "call3",
            FanOutFn::arc(
                |action: Action<TestState>,
                 _state: StateView<TestState>,
                 _calls: CallSync<TestState>| async move {
                    // finishes first in wall-clock time, emitted last
                    Ok(Action::follow_up(
                        action,
                        "RESP_3",
                        Payload::Value(json!({ "out": 40 })),
                    ))
                },
            ),
        )
        .arc();
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    let request = Action::new("SYNC", Payload::Value(json!({ "in": 5 })));
    let request_uuid = request.meta().uuid;
    bus.publish(request);

    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["SYNC", "RESP_1", "RESP_2", "RESP_3"]);
    assert_eq!(seen[2].payload().as_value(), Some(&json!({ "out": 50 })));
    for resp in &seen[1..] {
        assert_eq!(resp.meta().uuid, request_uuid);
    }

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fan_out_failure_aborts_whole_batch() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = FanOutEpic::new("SYNC")
        .with_call(
            "call1",
            FanOutFn::arc(
                |action: Action<TestState>,
                 _state: StateView<TestState>,
                 _calls: CallSync<TestState>| async move {
                    sleep(Duration::from_millis(50)).await;
                    Ok(Action::follow_up(action, "RESP_1", Payload::Empty))
                },
            ),
        )
        .with_call(
            "call2",
            FanOutFn::arc(
                |action: Action<TestState>,
                 _state: StateView<TestState>,
                 calls: CallSync<TestState>| async move {
                    let _dep = calls.result_of("call1")?.await?;
                    Ok(Action::follow_up(action, "RESP_2", Payload::Empty))
                },
            ),
        )
        .with_call(
            "call3",
            FanOutFn::arc(
                |_action: Action<TestState>,
                 _state: StateView<TestState>,
                 _calls: CallSync<TestState>| async move {
                    // rejects before call1's result would have been emitted
                    let err: BoxError = "sync failed".into();
                    Err(err)
                },
            ),
        )
        .arc();
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    let request = Action::new("SYNC", Payload::Empty);
    bus.publish(request);

    let seen = drain(&mut observed).await;
    // one ERROR for the whole batch; completed sibling results are discarded
    assert_eq!(kinds_of(&seen), ["SYNC", ERROR]);
    let payload = seen[1].payload().as_error().expect("error payload");
    assert!(payload.message.contains("sync failed"), "{}", payload.message);
    let related = seen[1].meta().related.as_ref().expect("back-reference");
    assert_eq!(related.kind(), "SYNC");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn subscription_streams_updates_before_final_result() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = SubscriptionEpic::arc(
        "WATCH",
        SubscriptionFn::arc(
            |action: Action<TestState>,
             _state: StateView<TestState>,
             updates: UpdateSink<TestState>| async move {
                for seq in 0..3 {
                    updates.update(Action::follow_up(
                        action.clone(),
                        "WATCH_UPDATE",
                        Payload::Value(json!({ "seq": seq })),
                    ));
                    sleep(Duration::from_millis(10)).await;
                }
                Ok(Action::follow_up(action, SUCCESS, Payload::Empty))
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    let request = Action::new("WATCH", Payload::Empty);
    let request_uuid = request.meta().uuid;
    bus.publish(request);

    let seen = drain(&mut observed).await;
    assert_eq!(
        kinds_of(&seen),
        ["WATCH", "WATCH_UPDATE", "WATCH_UPDATE", "WATCH_UPDATE", SUCCESS]
    );
    for update in &seen[1..] {
        assert_eq!(update.meta().uuid, request_uuid);
    }

    handle.shutdown().await;
}

/// Epic whose first run panics before subscribing; later runs behave.
struct FlakyEpic {
    runs: AtomicUsize,
    inner: ServiceEpic<TestState>,
}

#[async_trait]
impl Epic<TestState> for FlakyEpic {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(
        &self,
        bus: Bus<TestState>,
        state: StateView<TestState>,
        ctx: CancellationToken,
    ) -> Result<(), EpicError> {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("wired up wrong");
        }
        self.inner.run(bus, state, ctx).await
    }
}

#[tokio::test(start_paused = true)]
async fn epic_set_resubscribes_after_uncaught_failure() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);
    let mut observed = bus.subscribe();

    let epic = Arc::new(FlakyEpic {
        runs: AtomicUsize::new(0),
        inner: ServiceEpic::new(
            "LOAD",
            ServiceFn::arc(
                |action: Action<TestState>, _state: StateView<TestState>| async move {
                    Ok(Action::follow_up(action, SUCCESS, Payload::Empty))
                },
            ),
        ),
    });

    let failures = Arc::new(AtomicUsize::new(0));
    let seen_failures = Arc::clone(&failures);
    let handle = EpicSet::new()
        .with_epic(epic)
        .with_error_handler(move |failure: &EpicFailure, epic_name: &str| {
            assert_eq!(epic_name, "flaky");
            assert!(matches!(failure, EpicFailure::Panicked { .. }));
            seen_failures.fetch_add(1, Ordering::SeqCst);
        })
        .spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;

    // the subscription survived the panic and keeps processing actions
    bus.publish(Action::new("LOAD", Payload::Empty));
    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["LOAD", SUCCESS]);
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_dispatching() {
    let bus: Bus<TestState> = Bus::new(&Config::default());
    let view = spawn_store(&bus, &[]);

    let epic = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |action: Action<TestState>, _state: StateView<TestState>| async move {
                Ok(Action::follow_up(action, SUCCESS, Payload::Empty))
            },
        ),
    );
    let handle = EpicSet::new().with_epic(epic).spawn(bus.clone(), view);
    sleep(Duration::from_millis(1)).await;
    handle.shutdown().await;

    let mut observed = bus.subscribe();
    bus.publish(Action::new("LOAD", Payload::Empty));
    let seen = drain(&mut observed).await;
    assert_eq!(kinds_of(&seen), ["LOAD"]);
}
