//! Trigger scheduling for promptloom workflows.
//!
//! Owns cron timers for SCHEDULED triggers and the entry points for the
//! other trigger types: verified webhooks, manual and API runs, and the
//! event registry. Enforces per-trigger non-overlap and re-syncs its
//! in-memory timer set against the trigger store on demand.

pub mod clock;
pub mod cron;
pub mod scheduler;
pub mod store;
pub mod webhook;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cron::CronSchedule;
pub use scheduler::TriggerScheduler;
pub use store::{InMemoryTriggerStore, TriggerStore};
pub use webhook::{sign, verify_freshness, verify_signature, WebhookRequest};
