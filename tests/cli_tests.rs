use clap::Parser;
use autofill_engine::cli::commands::load_page;
use autofill_engine::cli::config::{load_config, resolve_engine_config, AppConfig, Cli, Commands};

// ============================================================================
// CLI Argument Parsing Tests
// ============================================================================

#[test]
fn cli_parse_collect() {
    let cli = Cli::parse_from(["autofill-engine", "collect", "--page", "login.json"]);
    match cli.command {
        Commands::Collect { page } => assert_eq!(page, "login.json"),
        _ => panic!("Expected Collect command"),
    }
    assert!(!cli.yes);
    assert!(cli.max_fields.is_none());
}

#[test]
fn cli_parse_fill() {
    let cli = Cli::parse_from([
        "autofill-engine",
        "fill",
        "--page",
        "login.json",
        "--script",
        "script.json",
    ]);
    match cli.command {
        Commands::Fill { page, script } => {
            assert_eq!(page, "login.json");
            assert_eq!(script, "script.json");
        }
        _ => panic!("Expected Fill command"),
    }
}

#[test]
fn cli_parse_autosubmit() {
    let cli = Cli::parse_from([
        "autofill-engine",
        "autosubmit",
        "--page",
        "step.json",
        "--script",
        "script.json",
    ]);
    match cli.command {
        Commands::Autosubmit { page, script } => {
            assert_eq!(page, "step.json");
            assert_eq!(script, "script.json");
        }
        _ => panic!("Expected Autosubmit command"),
    }
}

#[test]
fn cli_parse_serve() {
    let cli = Cli::parse_from(["autofill-engine", "serve", "--page", "login.json"]);
    match cli.command {
        Commands::Serve { page, host_url } => {
            assert_eq!(page, "login.json");
            assert!(host_url.is_none());
        }
        _ => panic!("Expected Serve command"),
    }

    let cli = Cli::parse_from([
        "autofill-engine",
        "serve",
        "--page",
        "login.json",
        "--host-url",
        "http://localhost:8080/autofill",
    ]);
    match cli.command {
        Commands::Serve { host_url, .. } => {
            assert_eq!(host_url, Some("http://localhost:8080/autofill".to_string()))
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn cli_parse_global_flags() {
    let cli = Cli::parse_from([
        "autofill-engine",
        "-vv",
        "--yes",
        "--max-fields",
        "10",
        "--trace-file",
        "trace.jsonl",
        "collect",
        "--page",
        "login.json",
    ]);
    assert_eq!(cli.verbose, 2);
    assert!(cli.yes);
    assert_eq!(cli.max_fields, Some(10));
    assert_eq!(cli.trace_file, Some("trace.jsonl".to_string()));

    // Global flags are accepted after the subcommand too.
    let cli = Cli::parse_from(["autofill-engine", "collect", "--page", "p.json", "-v", "--yes"]);
    assert_eq!(cli.verbose, 1);
    assert!(cli.yes);
}

// ============================================================================
// Config File Tests
// ============================================================================

#[test]
fn config_load_missing_file() {
    let config = load_config(Some("nonexistent_file_that_does_not_exist.yaml"));
    // Should return defaults without error
    assert_eq!(config.engine.max_fields, 50);
    assert_eq!(config.engine.action_delay_ms, 20);
}

#[test]
fn config_default_values() {
    let config = AppConfig::default();
    assert_eq!(config.engine.max_fields, 50);
    assert_eq!(config.engine.action_delay_ms, 20);
    assert_eq!(config.engine.animation_ms, 200);
    assert_eq!(config.engine.pre_collect_delay_ms, 250);
    assert_eq!(config.engine.post_fill_delay_ms, 400);
    assert_eq!(config.engine.ignore_attribute, "data-bwignore");
    assert!(config.engine.login_keywords.contains(&"continue".to_string()));
    assert_eq!(config.engine.change_password_keywords, vec!["change", "save", "update"]);
    assert!(config.engine.trace_file.is_none());
}

#[test]
fn config_yaml_roundtrip() {
    let config = AppConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed.engine.max_fields, config.engine.max_fields);
    assert_eq!(parsed.engine.login_keywords, config.engine.login_keywords);
}

#[test]
fn config_partial_yaml() {
    let yaml = r#"
engine:
  max_fields: 20
  login_keywords: ["anmelden", "weiter"]
"#;
    let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.engine.max_fields, 20);
    assert_eq!(config.engine.login_keywords, vec!["anmelden", "weiter"]);
    // Other engine fields get defaults
    assert_eq!(config.engine.post_fill_delay_ms, 400);
    assert_eq!(config.engine.ignore_attribute, "data-bwignore");
}

#[test]
fn config_malformed_file_falls_back_to_defaults() {
    let dir = std::env::temp_dir().join("autofill_engine_cli_test_malformed");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("autofill-engine.yaml");
    std::fs::write(&path, "engine: [this is not a map").unwrap();

    let config = load_config(path.to_str());
    assert_eq!(config.engine.max_fields, 50);

    std::fs::remove_file(&path).ok();
    std::fs::remove_dir(&dir).ok();
}

// ============================================================================
// Builder / Helper Tests
// ============================================================================

#[test]
fn cli_flags_override_config_file() {
    let cli = Cli::parse_from([
        "autofill-engine",
        "--max-fields",
        "5",
        "--trace-file",
        "cli.jsonl",
        "collect",
        "--page",
        "p.json",
    ]);
    let mut config = AppConfig::default();
    config.engine.max_fields = 30;
    config.engine.trace_file = Some("file.jsonl".to_string());
    config.engine.action_delay_ms = 5;

    let engine = resolve_engine_config(&cli, &config);
    assert_eq!(engine.max_fields, 5);
    assert_eq!(engine.trace_file, Some("cli.jsonl".to_string()));
    assert_eq!(engine.action_delay_ms, 5);

    let bare = Cli::parse_from(["autofill-engine", "collect", "--page", "p.json"]);
    let engine = resolve_engine_config(&bare, &config);
    assert_eq!(engine.max_fields, 30);
    assert_eq!(engine.trace_file, Some("file.jsonl".to_string()));
}

#[test]
fn load_page_from_snapshot_file() {
    let dir = std::env::temp_dir().join("autofill_engine_cli_test_page");
    std::fs::create_dir_all(&dir).unwrap();
    let page_path = dir.join("login.json");

    let snapshot = r#"{
        "url": "https://example.com/login",
        "title": "Sign in",
        "body": [{ "tag": "form", "children": [{ "tag": "input", "attrs": { "type": "password" } }] }]
    }"#;
    std::fs::write(&page_path, snapshot).unwrap();

    let doc = load_page(page_path.to_str().unwrap()).unwrap();
    assert_eq!(doc.title, "Sign in");
    assert_eq!(doc.hostname(), "example.com");

    assert!(load_page(dir.join("missing.json").to_str().unwrap()).is_err());

    // Cleanup
    std::fs::remove_file(&page_path).ok();
    std::fs::remove_dir(&dir).ok();
}
