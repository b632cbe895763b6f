use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::collect::collector::{DEFAULT_IGNORE_ATTRIBUTE, DEFAULT_MAX_FIELDS};
use crate::submit::search::{DEFAULT_CHANGE_PASSWORD_KEYWORDS, DEFAULT_LOGIN_KEYWORDS};

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "autofill-engine",
    version,
    about = "Collects, fills and auto-submits login forms on DOM snapshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: autofill-engine.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Accept every confirmation prompt instead of asking on the terminal
    #[arg(long, global = true)]
    pub yes: bool,

    /// Write engine trace events (JSONL) to this file
    #[arg(long, global = true)]
    pub trace_file: Option<String>,

    /// Maximum number of fields kept by a collection pass
    #[arg(long, global = true)]
    pub max_fields: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect page details from a DOM snapshot and print them as JSON
    Collect {
        /// DOM snapshot JSON file
        #[arg(long)]
        page: String,
    },

    /// Apply a fill script to a DOM snapshot and print the resulting values
    Fill {
        /// DOM snapshot JSON file
        #[arg(long)]
        page: String,

        /// Fill script JSON file
        #[arg(long)]
        script: String,
    },

    /// Run the whole auto-submit workflow with an in-process host
    Autosubmit {
        /// DOM snapshot JSON file
        #[arg(long)]
        page: String,

        /// Fill script JSON file the host answers with
        #[arg(long)]
        script: String,
    },

    /// Run the controller against a host over stdin/stdout or HTTP
    Serve {
        /// DOM snapshot JSON file
        #[arg(long)]
        page: String,

        /// Host endpoint; NDJSON over stdin/stdout when absent
        #[arg(long)]
        host_url: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `autofill-engine.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_fields")]
    pub max_fields: usize,

    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,

    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,

    #[serde(default = "default_pre_collect_delay_ms")]
    pub pre_collect_delay_ms: u64,

    #[serde(default = "default_post_fill_delay_ms")]
    pub post_fill_delay_ms: u64,

    #[serde(default = "default_ignore_attribute")]
    pub ignore_attribute: String,

    #[serde(default = "default_login_keywords")]
    pub login_keywords: Vec<String>,

    #[serde(default = "default_change_password_keywords")]
    pub change_password_keywords: Vec<String>,

    pub trace_file: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fields: default_max_fields(),
            action_delay_ms: default_action_delay_ms(),
            animation_ms: default_animation_ms(),
            pre_collect_delay_ms: default_pre_collect_delay_ms(),
            post_fill_delay_ms: default_post_fill_delay_ms(),
            ignore_attribute: default_ignore_attribute(),
            login_keywords: default_login_keywords(),
            change_password_keywords: default_change_password_keywords(),
            trace_file: None,
        }
    }
}

// Serde default helpers
fn default_max_fields() -> usize { DEFAULT_MAX_FIELDS }
fn default_action_delay_ms() -> u64 { 20 }
fn default_animation_ms() -> u64 { 200 }
fn default_pre_collect_delay_ms() -> u64 { 250 }
fn default_post_fill_delay_ms() -> u64 { 400 }
fn default_ignore_attribute() -> String { DEFAULT_IGNORE_ATTRIBUTE.to_string() }
fn default_login_keywords() -> Vec<String> { DEFAULT_LOGIN_KEYWORDS.iter().map(|k| k.to_string()).collect() }
fn default_change_password_keywords() -> Vec<String> {
    DEFAULT_CHANGE_PASSWORD_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("autofill-engine.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Engine settings with CLI flags taking precedence over the file.
pub fn resolve_engine_config(cli: &Cli, config: &AppConfig) -> EngineConfig {
    let mut engine = config.engine.clone();
    if let Some(max_fields) = cli.max_fields {
        engine.max_fields = max_fields;
    }
    if cli.trace_file.is_some() {
        engine.trace_file = cli.trace_file.clone();
    }
    engine
}
