//! Cron expression parsing and next-fire computation.
//!
//! Triggers carry standard 5-field expressions
//! (`minute hour day month weekday`). The `cron` crate wants a seconds
//! field, so a zero-seconds field is prepended after validation.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use flow_core::{FlowError, Result};

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parse a 5-field cron expression. Malformed expressions are a
    /// [`FlowError::Scheduling`], surfaced at trigger-configuration time.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let fields = trimmed.split_whitespace().count();
        if fields != 5 {
            return Err(FlowError::Scheduling(format!(
                "expected 5 cron fields (minute hour day month weekday), got {} in '{}'",
                fields, expression
            )));
        }

        let schedule = cron::Schedule::from_str(&format!("0 {}", trimmed))
            .map_err(|e| FlowError::Scheduling(format!("invalid cron '{}': {}", expression, e)))?;

        Ok(Self { expression: trimmed.to_string(), schedule })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}
