use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

/// One line of the engine audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,

    /// `collect`, `fill`, `veto`, `submit`, `workflow`, `mutation`, `error`
    pub stage: String,

    pub state: Option<String>,

    pub opid: Option<String>,
    pub action: Option<String>,

    pub count: Option<usize>,
    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn now(stage: &str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            stage: stage.to_string(),
            state: None,
            opid: None,
            action: None,
            count: None,
            detail: None,
        }
    }

    pub fn with_state(mut self, state: &impl Debug) -> Self {
        self.state = Some(format!("{:?}", state));
        self
    }

    pub fn with_opid(mut self, opid: impl ToString) -> Self {
        self.opid = Some(opid.to_string());
        self
    }

    pub fn with_action(mut self, action: impl ToString) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
