use serde::{Deserialize, Serialize};

use crate::collect::page_details::PageDetails;
use crate::error::EngineError;
use crate::fill::fill_script::FillScript;

/// Sender name the controller uses when asking the host for a collection.
pub const AUTO_SUBMIT_SENDER: &str = "autoSubmitLogin";

/// Engine → host. One JSON object per message, tagged by `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineMessage {
    BgCollectPageDetails {
        sender: String,
    },
    CollectPageDetailsResponse {
        details: PageDetails,
        page_details_url: String,
    },
    /// Asks the host for the fill script matching these details.
    TriggerAutoSubmitLogin {
        page_details: PageDetails,
        page_details_url: String,
    },
    MultiStepAutoSubmitLoginComplete,
    UpdateIsFieldCurrentlyFilling {
        is_field_currently_filling: bool,
    },
}

impl EngineMessage {
    pub fn command(&self) -> &'static str {
        match self {
            EngineMessage::BgCollectPageDetails { .. } => "bgCollectPageDetails",
            EngineMessage::CollectPageDetailsResponse { .. } => "collectPageDetailsResponse",
            EngineMessage::TriggerAutoSubmitLogin { .. } => "triggerAutoSubmitLogin",
            EngineMessage::MultiStepAutoSubmitLoginComplete => "multiStepAutoSubmitLoginComplete",
            EngineMessage::UpdateIsFieldCurrentlyFilling { .. } => "updateIsFieldCurrentlyFilling",
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::JsonSerialize {
            context: format!("{} message", self.command()),
            source: e,
        })
    }
}

/// Host → engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    CollectPageDetails {
        #[serde(default)]
        sender: Option<String>,
    },
    TriggerAutoSubmitLogin {
        fill_script: FillScript,
        page_details_url: String,
    },
    FillForm {
        fill_script: FillScript,
        page_details_url: String,
    },
    /// The content script's lifetime ended.
    DestroyAutofillScript,
}

impl HostMessage {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::JsonParse {
            context: "host message".into(),
            source: e,
        })
    }

    /// URL the message is addressed to, for messages that carry one.
    pub fn page_details_url(&self) -> Option<&str> {
        match self {
            HostMessage::TriggerAutoSubmitLogin {
                page_details_url, ..
            }
            | HostMessage::FillForm {
                page_details_url, ..
            } => Some(page_details_url),
            _ => None,
        }
    }
}
