use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::EngineError;

/// One scripted step. Closed set: unknown action names never reach the
/// executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillAction {
    FillByOpid { opid: String, value: String },
    ClickOnOpid { opid: String },
    FocusByOpid { opid: String },
}

impl FillAction {
    pub fn fill(opid: &str, value: &str) -> Self {
        FillAction::FillByOpid {
            opid: opid.to_string(),
            value: value.to_string(),
        }
    }

    pub fn click(opid: &str) -> Self {
        FillAction::ClickOnOpid {
            opid: opid.to_string(),
        }
    }

    pub fn focus(opid: &str) -> Self {
        FillAction::FocusByOpid {
            opid: opid.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FillAction::FillByOpid { .. } => "fill_by_opid",
            FillAction::ClickOnOpid { .. } => "click_on_opid",
            FillAction::FocusByOpid { .. } => "focus_by_opid",
        }
    }

    pub fn opid(&self) -> &str {
        match self {
            FillAction::FillByOpid { opid, .. }
            | FillAction::ClickOnOpid { opid }
            | FillAction::FocusByOpid { opid } => opid,
        }
    }

    /// Parses a wire entry `[action, opid, value?]`. Returns `None` (and
    /// logs) for unknown actions and entries without an opid.
    fn from_entry(entry: &[Value]) -> Option<Self> {
        let action = entry.first().and_then(Value::as_str);
        let opid = entry
            .get(1)
            .and_then(Value::as_str)
            .filter(|o| !o.is_empty());
        let value = match entry.get(2) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let (Some(action), Some(opid)) = (action, opid) else {
            warn!(?entry, "skipping fill script entry without action or opid");
            return None;
        };

        match action {
            "fill_by_opid" => Some(FillAction::fill(opid, &value)),
            "click_on_opid" => Some(FillAction::click(opid)),
            "focus_by_opid" => Some(FillAction::focus(opid)),
            other => {
                warn!(action = other, opid, "skipping unknown fill script action");
                None
            }
        }
    }

    fn to_entry(&self) -> Vec<Value> {
        match self {
            FillAction::FillByOpid { opid, value } => vec![
                Value::from(self.name()),
                Value::from(opid.as_str()),
                Value::from(value.as_str()),
            ],
            FillAction::ClickOnOpid { opid } | FillAction::FocusByOpid { opid } => {
                vec![Value::from(self.name()), Value::from(opid.as_str())]
            }
        }
    }
}

/// An action with its position in the received script. Delays are computed
/// from the position, so skipped entries still count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub position: usize,
    pub action: FillAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptProperties {
    /// Overrides the per-action stagger, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_between_operations: Option<u64>,
}

/// Host-generated fill instructions plus submission metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "FillScriptWire", into = "FillScriptWire")]
pub struct FillScript {
    pub steps: Vec<ScriptStep>,
    /// `[formOpid]` for form-anchored submit, `[null]` for formless.
    pub autosubmit: Option<Vec<Option<String>>>,
    pub saved_urls: Option<Vec<String>>,
    pub untrusted_iframe: bool,
    pub properties: ScriptProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillScriptWire {
    #[serde(default)]
    script: Vec<Vec<Value>>,
    #[serde(default)]
    autosubmit: Option<Vec<Option<String>>>,
    #[serde(default)]
    saved_urls: Option<Vec<String>>,
    #[serde(default)]
    untrusted_iframe: bool,
    #[serde(default)]
    properties: ScriptProperties,
}

impl From<FillScriptWire> for FillScript {
    fn from(wire: FillScriptWire) -> Self {
        let steps = wire
            .script
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                FillAction::from_entry(entry).map(|action| ScriptStep { position, action })
            })
            .collect();

        FillScript {
            steps,
            autosubmit: wire.autosubmit,
            saved_urls: wire.saved_urls,
            untrusted_iframe: wire.untrusted_iframe,
            properties: wire.properties,
        }
    }
}

impl From<FillScript> for FillScriptWire {
    fn from(script: FillScript) -> Self {
        FillScriptWire {
            script: script.steps.iter().map(|s| s.action.to_entry()).collect(),
            autosubmit: script.autosubmit,
            saved_urls: script.saved_urls,
            untrusted_iframe: script.untrusted_iframe,
            properties: script.properties,
        }
    }
}

impl FillScript {
    pub fn new(actions: Vec<FillAction>) -> Self {
        FillScript {
            steps: actions
                .into_iter()
                .enumerate()
                .map(|(position, action)| ScriptStep { position, action })
                .collect(),
            ..FillScript::default()
        }
    }

    pub fn with_autosubmit(mut self, form_opid: Option<&str>) -> Self {
        self.autosubmit = Some(vec![form_opid.map(str::to_string)]);
        self
    }

    pub fn with_saved_urls(mut self, urls: &[&str]) -> Self {
        self.saved_urls = Some(urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn with_untrusted_iframe(mut self, untrusted: bool) -> Self {
        self.untrusted_iframe = untrusted;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::JsonParse {
            context: "fill script".into(),
            source: e,
        })
    }

    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read fill script {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = &FillAction> {
        self.steps.iter().map(|s| &s.action)
    }

    /// Opid of the last scripted action, the field auto-submit starts from.
    pub fn last_opid(&self) -> Option<&str> {
        self.steps.last().map(|s| s.action.opid())
    }

    /// Form reference for auto-submit. `Some(None)` means formless.
    pub fn autosubmit_target(&self) -> Option<Option<&str>> {
        self.autosubmit
            .as_ref()
            .and_then(|refs| refs.first())
            .map(|r| r.as_deref())
    }
}
