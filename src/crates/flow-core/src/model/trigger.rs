//! Triggers: mechanisms that initiate a workflow run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Manual,
    Scheduled,
    Webhook,
    Api,
    Event,
}

/// Trigger configuration, a closed union keyed by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerConfig {
    Manual,

    Scheduled {
        /// Standard 5-field cron expression (minute hour day month weekday).
        cron: String,
    },

    Webhook {
        /// Shared secret for HMAC-SHA256 signature verification.
        secret: String,

        /// When set, inbound requests must carry a fresh timestamp.
        #[serde(default)]
        verify_timestamp: bool,
    },

    Api,

    Event {
        /// Event name this trigger subscribes to.
        event: String,
    },
}

impl TriggerConfig {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Manual => TriggerType::Manual,
            Self::Scheduled { .. } => TriggerType::Scheduled,
            Self::Webhook { .. } => TriggerType::Webhook,
            Self::Api => TriggerType::Api,
            Self::Event { .. } => TriggerType::Event,
        }
    }
}

/// Created/updated/deleted by the surrounding CRUD layer; consumed read-only
/// by the scheduler, which re-syncs its timer set whenever triggers change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,

    pub workflow_id: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(flatten)]
    pub config: TriggerConfig,
}

impl Trigger {
    pub fn trigger_type(&self) -> TriggerType {
        self.config.trigger_type()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trigger_config_round_trips() {
        let trigger: Trigger = serde_json::from_value(json!({
            "id": "t1",
            "workflow_id": "wf",
            "type": "SCHEDULED",
            "cron": "*/10 * * * *"
        }))
        .unwrap();

        assert_eq!(trigger.trigger_type(), TriggerType::Scheduled);
        assert!(trigger.is_active);

        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(value["type"], "SCHEDULED");
        assert_eq!(value["cron"], "*/10 * * * *");
    }

    #[test]
    fn webhook_trigger_defaults() {
        let trigger: Trigger = serde_json::from_value(json!({
            "id": "t2",
            "workflow_id": "wf",
            "type": "WEBHOOK",
            "secret": "shh"
        }))
        .unwrap();

        match trigger.config {
            TriggerConfig::Webhook { ref secret, verify_timestamp } => {
                assert_eq!(secret, "shh");
                assert!(!verify_timestamp);
            }
            ref other => panic!("unexpected config: {:?}", other),
        }
    }
}
