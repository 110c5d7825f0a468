//! The trigger scheduler: cron timers and run entry points.
//!
//! An explicit instance with a `start()`/`stop()` lifecycle and injected
//! store/clock dependencies; there is no ambient global. One driver task
//! polls the clock; per-trigger in-flight flags guarantee a trigger never
//! overlaps itself, while different triggers stay independent.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flow_core::{FlowError, Result, Trigger, TriggerConfig, WorkflowExecution};
use flow_engine::{RunOptions, WorkflowRunner};

use crate::clock::Clock;
use crate::cron::CronSchedule;
use crate::store::TriggerStore;
use crate::webhook::{verify_freshness, verify_signature, WebhookRequest};

const DEFAULT_TICK: Duration = Duration::from_millis(500);
const DEFAULT_FRESHNESS_WINDOW_MINUTES: i64 = 5;

struct ScheduledEntry {
    trigger: Trigger,
    schedule: CronSchedule,
    next_fire: DateTime<Utc>,
}

struct Inner {
    triggers: Arc<dyn TriggerStore>,
    runner: Arc<WorkflowRunner>,
    clock: Arc<dyn Clock>,
    schedules: DashMap<String, ScheduledEntry>,
    in_flight: DashMap<String, ()>,
    events: DashMap<String, Vec<String>>,
    skipped_fires: AtomicU64,
    shutdown: CancellationToken,
    tick: Duration,
    freshness_window: ChronoDuration,
}

pub struct TriggerScheduler {
    inner: Arc<Inner>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerScheduler {
    pub fn new(
        triggers: Arc<dyn TriggerStore>,
        runner: Arc<WorkflowRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                triggers,
                runner,
                clock,
                schedules: DashMap::new(),
                in_flight: DashMap::new(),
                events: DashMap::new(),
                skipped_fires: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
                tick: DEFAULT_TICK,
                freshness_window: ChronoDuration::minutes(DEFAULT_FRESHNESS_WINDOW_MINUTES),
            }),
            driver: Mutex::new(None),
        }
    }

    /// Driver poll interval. Only meaningful before `start()`.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.tick = tick;
        }
        self
    }

    /// Spawn the single timer-driver task. Idempotent.
    pub fn start(&self) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            warn!("trigger scheduler already started");
            return;
        }

        let inner = self.inner.clone();
        info!(tick_ms = inner.tick.as_millis() as u64, "starting trigger scheduler");
        *driver = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(inner.tick) => {
                        let now = inner.clock.now();
                        inner.fire_due(now).await;
                    }
                }
            }
            debug!("scheduler driver stopped");
        }));
    }

    /// Stop the driver task. In-flight workflow runs finish on their own;
    /// a stopped scheduler stays stopped.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            handle.await.ok();
        }
        info!("trigger scheduler stopped");
    }

    /// Validate and register one trigger. Malformed cron expressions are
    /// rejected here, at configuration time, with a scheduling error.
    pub fn register_trigger(&self, trigger: &Trigger) -> Result<()> {
        self.inner.register(trigger)
    }

    /// Re-read triggers from the store and reconcile timers and the event
    /// registry, so in-memory state never diverges from persisted
    /// configuration. Call after any trigger create/update/delete.
    pub async fn sync(&self) -> Result<()> {
        let active = self.inner.triggers.active_triggers().await?;

        let scheduled_ids: HashSet<&str> = active
            .iter()
            .filter(|t| matches!(t.config, TriggerConfig::Scheduled { .. }))
            .map(|t| t.id.as_str())
            .collect();

        let stale: Vec<String> = self
            .inner
            .schedules
            .iter()
            .filter(|entry| !scheduled_ids.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        for trigger_id in stale {
            info!(trigger_id = %trigger_id, "unregistering removed or deactivated trigger");
            self.inner.schedules.remove(&trigger_id);
        }

        // The event registry is rebuilt from the store's view.
        self.inner.events.clear();

        for trigger in &active {
            if let Err(e) = self.inner.register(trigger) {
                warn!(trigger_id = %trigger.id, error = %e, "skipping trigger with invalid config");
            }
        }

        Ok(())
    }

    /// Fire every schedule due at `now`. Returns the number of runs
    /// launched (skipped overlaps are not counted). The driver calls this
    /// each tick; tests call it directly with a manual clock.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> usize {
        self.inner.fire_due(now).await
    }

    /// Verify an inbound webhook request and, only then, invoke the runner.
    /// Signature or freshness failures must be answered with 401; the
    /// workflow is never invoked for them.
    pub async fn handle_webhook(
        &self,
        trigger_id: &str,
        request: WebhookRequest<'_>,
    ) -> Result<WorkflowExecution> {
        let trigger = self
            .inner
            .triggers
            .trigger(trigger_id)
            .await?
            .ok_or_else(|| FlowError::NotFound(format!("trigger '{}'", trigger_id)))?;

        if !trigger.is_active {
            return Err(FlowError::validation(format!("trigger '{}' is not active", trigger_id)));
        }
        let TriggerConfig::Webhook { secret, verify_timestamp } = &trigger.config else {
            return Err(FlowError::validation(format!(
                "trigger '{}' is not a webhook trigger",
                trigger_id
            )));
        };

        verify_signature(secret, request.body, request.signature)?;
        if *verify_timestamp {
            let timestamp = request
                .timestamp
                .ok_or_else(|| FlowError::Signature("missing timestamp".to_string()))?;
            verify_freshness(self.inner.clock.now(), timestamp, self.inner.freshness_window)?;
        }

        let input = if request.body.is_empty() {
            json!({})
        } else {
            serde_json::from_slice(request.body)
                .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(request.body)}))
        };

        info!(trigger_id = %trigger.id, workflow_id = %trigger.workflow_id, "webhook verified, invoking runner");
        self.inner
            .runner
            .run(&trigger.workflow_id, input, RunOptions::default().with_trigger(&trigger.id))
            .await
    }

    /// Manual entry point: run a workflow directly, no scheduling state.
    pub async fn fire_manual(&self, workflow_id: &str, input: Value) -> Result<WorkflowExecution> {
        self.inner.runner.run(workflow_id, input, RunOptions::default()).await
    }

    /// Manual preview: identical run, never persisted.
    pub async fn preview(&self, workflow_id: &str, input: Value) -> Result<WorkflowExecution> {
        self.inner.runner.run(workflow_id, input, RunOptions::preview()).await
    }

    /// API entry point: run the workflow behind an API trigger.
    pub async fn fire_api(&self, trigger_id: &str, input: Value) -> Result<WorkflowExecution> {
        let trigger = self
            .inner
            .triggers
            .trigger(trigger_id)
            .await?
            .ok_or_else(|| FlowError::NotFound(format!("trigger '{}'", trigger_id)))?;

        if !trigger.is_active {
            return Err(FlowError::validation(format!("trigger '{}' is not active", trigger_id)));
        }
        if !matches!(trigger.config, TriggerConfig::Api) {
            return Err(FlowError::validation(format!(
                "trigger '{}' is not an API trigger",
                trigger_id
            )));
        }

        self.inner
            .runner
            .run(&trigger.workflow_id, input, RunOptions::default().with_trigger(&trigger.id))
            .await
    }

    /// Subscribe a trigger to an event name. `sync()` also rebuilds these
    /// from EVENT triggers in the store.
    pub fn register_event(&self, event: &str, trigger_id: &str) {
        let mut ids = self.inner.events.entry(event.to_string()).or_default();
        if !ids.iter().any(|id| id == trigger_id) {
            ids.push(trigger_id.to_string());
        }
    }

    /// Fire every active EVENT trigger subscribed to `event`. Firing is the
    /// event source's job; this is the dispatch interface it calls.
    pub async fn dispatch_event(&self, event: &str, payload: Value) -> Result<Vec<WorkflowExecution>> {
        let trigger_ids: Vec<String> = self
            .inner
            .events
            .get(event)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        let mut executions = Vec::with_capacity(trigger_ids.len());
        for trigger_id in trigger_ids {
            let Some(trigger) = self.inner.triggers.trigger(&trigger_id).await? else {
                warn!(trigger_id = %trigger_id, event = %event, "subscribed trigger no longer exists");
                continue;
            };
            if !trigger.is_active || !matches!(trigger.config, TriggerConfig::Event { .. }) {
                continue;
            }

            match self
                .inner
                .runner
                .run(&trigger.workflow_id, payload.clone(), RunOptions::default().with_trigger(&trigger.id))
                .await
            {
                Ok(execution) => executions.push(execution),
                Err(e) => error!(trigger_id = %trigger_id, error = %e, "event-triggered run failed"),
            }
        }
        Ok(executions)
    }

    pub fn scheduled_count(&self) -> usize {
        self.inner.schedules.len()
    }

    /// Fires skipped because the same trigger was still running.
    pub fn skipped_fires(&self) -> u64 {
        self.inner.skipped_fires.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn register(&self, trigger: &Trigger) -> Result<()> {
        match &trigger.config {
            TriggerConfig::Scheduled { cron } => {
                let schedule = CronSchedule::parse(cron)?;

                // An unchanged expression keeps its pending fire time so
                // re-syncs don't push schedules into the future.
                if let Some(mut existing) = self.schedules.get_mut(&trigger.id) {
                    if existing.schedule.expression() == schedule.expression() {
                        existing.trigger = trigger.clone();
                        return Ok(());
                    }
                }

                let now = self.clock.now();
                let next_fire = schedule
                    .next_fire(now)
                    .ok_or_else(|| FlowError::Scheduling(format!("cron '{}' never fires", cron)))?;

                info!(trigger_id = %trigger.id, cron = %cron, next_fire = %next_fire, "registered scheduled trigger");
                self.schedules.insert(
                    trigger.id.clone(),
                    ScheduledEntry { trigger: trigger.clone(), schedule, next_fire },
                );
                Ok(())
            }
            TriggerConfig::Event { event } => {
                let mut ids = self.events.entry(event.clone()).or_default();
                if !ids.contains(&trigger.id) {
                    ids.push(trigger.id.clone());
                }
                Ok(())
            }
            // Manual, API, and webhook triggers hold no timer state.
            _ => Ok(()),
        }
    }

    async fn fire_due(self: &Arc<Self>, now: DateTime<Utc>) -> usize {
        let due: Vec<String> = self
            .schedules
            .iter()
            .filter(|entry| entry.value().next_fire <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut launched = 0;
        for trigger_id in due {
            // Advance the fire time first: a skipped or failed fire waits
            // for the next scheduled slot, it is never queued.
            let mut exhausted = false;
            let workflow_id = {
                let Some(mut entry) = self.schedules.get_mut(&trigger_id) else { continue };
                match entry.schedule.next_fire(now) {
                    Some(next) => entry.next_fire = next,
                    None => exhausted = true,
                }
                entry.trigger.workflow_id.clone()
            };
            if exhausted {
                warn!(trigger_id = %trigger_id, "schedule has no future fire times, unregistering");
                self.schedules.remove(&trigger_id);
            }

            if self.in_flight.contains_key(&trigger_id) {
                self.skipped_fires.fetch_add(1, Ordering::SeqCst);
                warn!(trigger_id = %trigger_id, "previous run still active, skipping this fire");
                continue;
            }

            self.in_flight.insert(trigger_id.clone(), ());
            launched += 1;

            let inner = self.clone();
            tokio::spawn(async move {
                let options = RunOptions::default().with_trigger(trigger_id.clone());
                match inner.runner.run(&workflow_id, json!({}), options).await {
                    Ok(execution) => {
                        debug!(trigger_id = %trigger_id, execution_id = %execution.id, status = ?execution.status, "scheduled run finished");
                    }
                    Err(e) => {
                        error!(trigger_id = %trigger_id, error = %e, "scheduled run failed");
                    }
                }
                inner.in_flight.remove(&trigger_id);
            });
        }
        launched
    }
}
