use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// Host delivered a fill script for auto-submit without an `autosubmit`
    /// form reference
    MissingAutoSubmitReference,

    /// No submit control, form or ancestor button found after filling
    SubmitTargetNotFound { opid: Option<String> },

    /// CSS selector could not be parsed
    Selector { selector: String, reason: String },

    /// JSON parsing failed (snapshot, fill script, host message)
    JsonParse { context: String, source: serde_json::Error },

    /// JSON serialization failed (page details, outgoing host message)
    JsonSerialize { context: String, source: serde_json::Error },

    /// Host channel reported a protocol failure
    Host(String),

    /// Host transport read/write failed
    HostIo { context: String, source: std::io::Error },

    /// DOM snapshot describes an impossible document
    Snapshot(String),

    /// Configuration or CLI input is unusable
    Config(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingAutoSubmitReference => {
                write!(f, "Fill script has no autosubmit form reference")
            }
            EngineError::SubmitTargetNotFound { opid } => match opid {
                Some(opid) => write!(f, "No submit target found near field {}", opid),
                None => write!(f, "No submit target found"),
            },
            EngineError::Selector { selector, reason } => {
                write!(f, "Invalid selector '{}': {}", selector, reason)
            }
            EngineError::JsonParse { context, source } => {
                write!(f, "JSON parse error ({}): {}", context, source)
            }
            EngineError::JsonSerialize { context, source } => {
                write!(f, "JSON serialize error ({}): {}", context, source)
            }
            EngineError::Host(msg) => {
                write!(f, "Host channel error: {}", msg)
            }
            EngineError::HostIo { context, source } => {
                write!(f, "Host I/O error ({}): {}", context, source)
            }
            EngineError::Snapshot(msg) => {
                write!(f, "Invalid page snapshot: {}", msg)
            }
            EngineError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
        }
    }
}

impl EngineError {
    /// Failures of the host connection itself, as opposed to a bad message.
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::Host(_) | EngineError::HostIo { .. })
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::JsonParse { source, .. } => Some(source),
            EngineError::JsonSerialize { source, .. } => Some(source),
            EngineError::HostIo { source, .. } => Some(source),
            _ => None,
        }
    }
}
