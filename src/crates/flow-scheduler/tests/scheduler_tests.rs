//! Scheduler behavior with a manual clock and in-memory stores.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use flow_core::{
    DelayConfig, DelayUnit, ExecutionStatus, FlowError, Step, StepConfig, TransformConfig,
    TransformOp, Trigger, TriggerConfig, Workflow,
};
use flow_engine::{InMemoryExecutionStore, InMemoryWorkflowStore, WorkflowRunner};
use flow_scheduler::{
    sign, Clock, InMemoryTriggerStore, ManualClock, TriggerScheduler, WebhookRequest,
};
use llm::{CredentialProviderFactory, InMemoryCredentialStore};

fn transform_workflow(id: &str) -> Workflow {
    Workflow::new(
        id,
        "shout",
        vec![Step {
            id: "shout".to_string(),
            workflow_id: id.to_string(),
            order: 1,
            name: String::new(),
            config: StepConfig::Transform(TransformConfig {
                input: "{{workflow.input.name}}".to_string(),
                operation: TransformOp::Uppercase,
                output: "upper".to_string(),
            }),
            gate: None,
        }],
    )
}

fn delay_workflow(id: &str, millis: u64) -> Workflow {
    Workflow::new(
        id,
        "slow",
        vec![Step {
            id: "wait".to_string(),
            workflow_id: id.to_string(),
            order: 1,
            name: String::new(),
            config: StepConfig::Delay(DelayConfig {
                duration: millis,
                unit: DelayUnit::Milliseconds,
            }),
            gate: None,
        }],
    )
}

fn scheduled_trigger(id: &str, workflow_id: &str, cron: &str) -> Trigger {
    Trigger {
        id: id.to_string(),
        workflow_id: workflow_id.to_string(),
        is_active: true,
        config: TriggerConfig::Scheduled { cron: cron.to_string() },
    }
}

struct World {
    scheduler: TriggerScheduler,
    executions: Arc<InMemoryExecutionStore>,
    triggers: Arc<InMemoryTriggerStore>,
    clock: Arc<ManualClock>,
}

fn world(workflows: Vec<Workflow>) -> World {
    let workflow_store = Arc::new(InMemoryWorkflowStore::new());
    for workflow in workflows {
        workflow_store.insert(workflow);
    }
    let executions = Arc::new(InMemoryExecutionStore::new());
    let factory = Arc::new(CredentialProviderFactory::new(Arc::new(InMemoryCredentialStore::new())));
    let runner = Arc::new(WorkflowRunner::new(workflow_store, executions.clone(), factory));

    let triggers = Arc::new(InMemoryTriggerStore::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
    let scheduler = TriggerScheduler::new(triggers.clone(), runner, clock.clone());

    World { scheduler, executions, triggers, clock }
}

async fn wait_for_executions(store: &InMemoryExecutionStore, count: usize) {
    for _ in 0..200 {
        if store.count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} executions, saw {}", count, store.count());
}

#[tokio::test]
async fn malformed_cron_is_rejected_at_registration() {
    let w = world(vec![transform_workflow("wf")]);

    let err = w
        .scheduler
        .register_trigger(&scheduled_trigger("t1", "wf", "every ten minutes"))
        .unwrap_err();
    assert!(matches!(err, FlowError::Scheduling(_)));

    // Six fields means someone wrote seconds; the contract is 5-field.
    let err = w
        .scheduler
        .register_trigger(&scheduled_trigger("t2", "wf", "0 */10 * * * *"))
        .unwrap_err();
    assert!(matches!(err, FlowError::Scheduling(_)));

    assert_eq!(w.scheduler.scheduled_count(), 0);
}

#[tokio::test]
async fn due_scheduled_trigger_fires_and_records_trigger_id() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(scheduled_trigger("t1", "wf", "*/10 * * * *"));
    w.scheduler.sync().await.unwrap();
    assert_eq!(w.scheduler.scheduled_count(), 1);

    // Not due yet.
    w.clock.advance(ChronoDuration::minutes(5));
    assert_eq!(w.scheduler.fire_due(w.clock.now()).await, 0);

    w.clock.advance(ChronoDuration::minutes(5));
    assert_eq!(w.scheduler.fire_due(w.clock.now()).await, 1);

    wait_for_executions(&w.executions, 1).await;
    let execution = &w.executions.saved()[0];
    assert_eq!(execution.trigger_id.as_deref(), Some("t1"));
    assert_eq!(execution.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn overlapping_fire_is_skipped_not_queued() {
    let w = world(vec![delay_workflow("wf", 300)]);
    w.triggers.insert(scheduled_trigger("t1", "wf", "*/10 * * * *"));
    w.scheduler.sync().await.unwrap();

    w.clock.advance(ChronoDuration::minutes(10));
    assert_eq!(w.scheduler.fire_due(w.clock.now()).await, 1);

    // The first run is still inside its delay when the next fire arrives.
    tokio::time::sleep(Duration::from_millis(50)).await;
    w.clock.advance(ChronoDuration::minutes(10));
    assert_eq!(w.scheduler.fire_due(w.clock.now()).await, 0);
    assert_eq!(w.scheduler.skipped_fires(), 1);

    // Exactly one execution came out of the two fire times.
    wait_for_executions(&w.executions, 1).await;
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(w.executions.count(), 1);

    // Once the run finished, the trigger fires again.
    w.clock.advance(ChronoDuration::minutes(10));
    assert_eq!(w.scheduler.fire_due(w.clock.now()).await, 1);
    wait_for_executions(&w.executions, 2).await;
}

#[tokio::test]
async fn sync_reconciles_against_the_store() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(scheduled_trigger("t1", "wf", "*/10 * * * *"));
    w.triggers.insert(Trigger {
        is_active: false,
        ..scheduled_trigger("t2", "wf", "*/10 * * * *")
    });

    w.scheduler.sync().await.unwrap();
    assert_eq!(w.scheduler.scheduled_count(), 1);

    w.triggers.remove("t1");
    w.scheduler.sync().await.unwrap();
    assert_eq!(w.scheduler.scheduled_count(), 0);
}

#[tokio::test]
async fn verified_webhook_invokes_the_workflow() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(Trigger {
        id: "hook".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Webhook { secret: "s3cret".to_string(), verify_timestamp: false },
    });

    let body = br#"{"name":"ada"}"#;
    let signature = sign("s3cret", body);

    let execution = w
        .scheduler
        .handle_webhook("hook", WebhookRequest { body, signature: &signature, timestamp: None })
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.trigger_id.as_deref(), Some("hook"));
    assert_eq!(execution.step_results[0].output, json!({"upper": "ADA"}));
    assert_eq!(w.executions.count(), 1);
}

#[tokio::test]
async fn tampered_webhook_body_never_runs_the_workflow() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(Trigger {
        id: "hook".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Webhook { secret: "s3cret".to_string(), verify_timestamp: false },
    });

    // Signature computed over a different body than the one sent.
    let signature = sign("s3cret", br#"{"name":"ada"}"#);
    let err = w
        .scheduler
        .handle_webhook(
            "hook",
            WebhookRequest { body: br#"{"name":"eve"}"#, signature: &signature, timestamp: None },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Signature(_)));
    assert_eq!(w.executions.count(), 0);
}

#[tokio::test]
async fn webhook_timestamp_freshness_is_enforced_when_configured() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(Trigger {
        id: "hook".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Webhook { secret: "s3cret".to_string(), verify_timestamp: true },
    });

    let body = br#"{"name":"ada"}"#;
    let signature = sign("s3cret", body);

    let err = w
        .scheduler
        .handle_webhook("hook", WebhookRequest { body, signature: &signature, timestamp: None })
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Signature(_)));

    let stale = w.clock.now() - ChronoDuration::hours(1);
    let err = w
        .scheduler
        .handle_webhook("hook", WebhookRequest { body, signature: &signature, timestamp: Some(stale) })
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Signature(_)));

    let fresh = w.clock.now() - ChronoDuration::minutes(1);
    let execution = w
        .scheduler
        .handle_webhook("hook", WebhookRequest { body, signature: &signature, timestamp: Some(fresh) })
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn event_dispatch_fires_subscribed_triggers() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(Trigger {
        id: "on-created".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Event { event: "prompt.created".to_string() },
    });
    w.scheduler.sync().await.unwrap();

    let executions = w
        .scheduler
        .dispatch_event("prompt.created", json!({"name": "ada"}))
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].trigger_id.as_deref(), Some("on-created"));

    let none = w.scheduler.dispatch_event("prompt.deleted", json!({})).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn manual_api_and_preview_entry_points() {
    let w = world(vec![transform_workflow("wf")]);
    w.triggers.insert(Trigger {
        id: "api-1".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Api,
    });

    let preview = w.scheduler.preview("wf", json!({"name": "ada"})).await.unwrap();
    assert_eq!(preview.status, ExecutionStatus::Completed);
    assert_eq!(w.executions.count(), 0);

    let manual = w.scheduler.fire_manual("wf", json!({"name": "ada"})).await.unwrap();
    assert_eq!(manual.trigger_id, None);
    assert_eq!(w.executions.count(), 1);

    let api = w.scheduler.fire_api("api-1", json!({"name": "ada"})).await.unwrap();
    assert_eq!(api.trigger_id.as_deref(), Some("api-1"));
    assert_eq!(w.executions.count(), 2);

    // A webhook trigger is not a valid API entry point.
    w.triggers.insert(Trigger {
        id: "hook".to_string(),
        workflow_id: "wf".to_string(),
        is_active: true,
        config: TriggerConfig::Webhook { secret: "x".to_string(), verify_timestamp: false },
    });
    let err = w.scheduler.fire_api("hook", json!({})).await.unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));
}

#[tokio::test]
async fn start_and_stop_are_explicit() {
    let w = world(vec![transform_workflow("wf")]);
    w.scheduler.start();
    // Double start is a no-op, not a second driver.
    w.scheduler.start();
    w.scheduler.stop().await;
}
