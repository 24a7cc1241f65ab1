//! Small end-to-end walkthrough: a store loop, a single-handler epic, a
//! fan-out epic with a dependency between calls, and status tracking.
//!
//! Run with `cargo run --example demo`.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::time::sleep;

use actionflow::{
    is_status_pending, last_status, reducer_delegate, Action, ActionStatus, AppState, Bus,
    CallSync, Config, EpicSet, FanOutEpic, FanOutFn, Payload, ServiceEpic, ServiceFn, StateView,
    SUCCESS,
};

#[derive(Clone, Default)]
struct DemoState {
    total: i64,
    status: Vec<ActionStatus>,
}

impl AppState for DemoState {
    fn status(&self) -> &[ActionStatus] {
        &self.status
    }
    fn with_status(mut self, status: Vec<ActionStatus>) -> Self {
        self.status = status;
        self
    }
}

/// Folds SUCCESS payloads into the running total.
fn reduce(mut state: DemoState, action: &Action<DemoState>) -> DemoState {
    if let Some(out) = action
        .payload()
        .as_value()
        .and_then(|v| v.get("out"))
        .and_then(|v| v.as_i64())
    {
        state.total += out;
    }
    state
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actionflow=debug".into()),
        )
        .init();

    let bus: Bus<DemoState> = Bus::new(&Config::default());

    // Store loop: fold every action into the state, publish snapshots.
    let tracked: HashSet<String> = ["LOAD".to_string(), "SYNC".to_string()].into();
    let (state_tx, state_rx) = watch::channel(DemoState::default());
    let mut store_rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(action) = store_rx.recv().await {
            let current = state_tx.borrow().clone();
            let _ = state_tx.send(reducer_delegate(current, &action, &tracked, &reduce));
        }
    });
    let view = StateView::new(state_rx);

    // Single handler: doubles the input.
    let load = ServiceEpic::arc(
        "LOAD",
        ServiceFn::arc(
            |action: Action<DemoState>, _state: StateView<DemoState>| async move {
                sleep(Duration::from_millis(50)).await;
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

    // Fan-out: "detail" awaits "base" through the call registry; results
    // are emitted in registration order regardless of completion order.
    let sync = FanOutEpic::new("SYNC")
        .with_call(
            "base",
            FanOutFn::arc(
                |action: Action<DemoState>,
                 _state: StateView<DemoState>,
                 _calls: CallSync<DemoState>| async move {
                    sleep(Duration::from_millis(100)).await;
                    Ok(Action::follow_up(
                        action,
                        "BASE_DONE",
                        Payload::Value(json!({ "out": 7 })),
                    ))
                },
            ),
        )
        .with_call(
            "detail",
            FanOutFn::arc(
                |action: Action<DemoState>,
                 _state: StateView<DemoState>,
                 calls: CallSync<DemoState>| async move {
                    let base = calls.result_of("base")?.await?;
                    let out = base
                        .payload()
                        .as_value()
                        .and_then(|v| v.get("out"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0)
                        * 10;
                    Ok(Action::follow_up(
                        action,
                        SUCCESS,
                        Payload::Value(json!({ "out": out })),
                    ))
                },
            ),
        )
        .arc();

    let handle = EpicSet::new()
        .with_epic(load)
        .with_epic(sync)
        .spawn(bus.clone(), view.clone());
    sleep(Duration::from_millis(10)).await;

    bus.publish(Action::new("LOAD", Payload::Value(json!({ "in": 5 }))));
    bus.publish(Action::new("SYNC", Payload::Empty));
    sleep(Duration::from_millis(1)).await;

    let pending = is_status_pending(&view.get(), &["LOAD", "SYNC"]);
    println!("in flight: {pending}");

    sleep(Duration::from_millis(300)).await;

    let state = view.get();
    println!("total: {} (expected 10 + 70)", state.total);
    for status in state.status() {
        println!("status: {} -> {:?}", status.action_type, status.result);
    }
    if let Some(latest) = last_status(&state) {
        println!("latest status entry: {}", latest.action_type);
    }

    handle.shutdown().await;
}
