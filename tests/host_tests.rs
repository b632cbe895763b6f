use std::io::{Cursor, Write};
use std::rc::Rc;

use autofill_engine::build_controller;
use autofill_engine::cli::config::EngineConfig;
use autofill_engine::clock::{Clock, ManualClock};
use autofill_engine::error::EngineError;
use autofill_engine::fill::confirm::AutoConfirm;
use autofill_engine::fill::fill_script::FillAction;
use autofill_engine::host::channel::{HostChannel, HttpHost, NdjsonHost, RecordingHost};
use autofill_engine::host::messages::{EngineMessage, HostMessage, AUTO_SUBMIT_SENDER};
use autofill_engine::submit::controller::AutoSubmitState;
use autofill_engine::trace::logger::TraceLogger;
use serde_json::{json, Value};

mod common;
use crate::common::pages::{by_id, document, login_form, LOGIN_URL};

fn sent_lines(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// Message shapes
// ============================================================================

#[test]
fn engine_messages_are_tagged_by_command() {
    let filling = EngineMessage::UpdateIsFieldCurrentlyFilling {
        is_field_currently_filling: true,
    };
    let value: Value = serde_json::from_str(&filling.to_json().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({ "command": "updateIsFieldCurrentlyFilling", "isFieldCurrentlyFilling": true })
    );

    let step = EngineMessage::MultiStepAutoSubmitLoginComplete;
    let value: Value = serde_json::from_str(&step.to_json().unwrap()).unwrap();
    assert_eq!(value, json!({ "command": "multiStepAutoSubmitLoginComplete" }));

    let collect = EngineMessage::BgCollectPageDetails {
        sender: AUTO_SUBMIT_SENDER.to_string(),
    };
    let value: Value = serde_json::from_str(&collect.to_json().unwrap()).unwrap();
    assert_eq!(value, json!({ "command": "bgCollectPageDetails", "sender": "autoSubmitLogin" }));
    assert_eq!(collect.command(), "bgCollectPageDetails");
}

#[test]
fn host_trigger_message_carries_fill_script() {
    let message = HostMessage::from_json(
        r#"{
            "command": "triggerAutoSubmitLogin",
            "pageDetailsUrl": "https://example.com/login",
            "fillScript": {
                "script": [["fill_by_opid", "__0", "alice"], ["click_on_opid", "__1"]],
                "autosubmit": ["__form__0"]
            }
        }"#,
    )
    .unwrap();

    match &message {
        HostMessage::TriggerAutoSubmitLogin {
            fill_script,
            page_details_url,
        } => {
            assert_eq!(page_details_url, "https://example.com/login");
            assert_eq!(fill_script.steps.len(), 2);
            assert_eq!(fill_script.steps[0].action, FillAction::fill("__0", "alice"));
            assert_eq!(fill_script.autosubmit_target(), Some(Some("__form__0")));
        }
        other => panic!("Expected TriggerAutoSubmitLogin, got {:?}", other),
    }
    assert_eq!(message.page_details_url(), Some("https://example.com/login"));
}

#[test]
fn collect_request_sender_is_optional() {
    let message = HostMessage::from_json(r#"{"command":"collectPageDetails"}"#).unwrap();
    assert_eq!(message, HostMessage::CollectPageDetails { sender: None });
    assert_eq!(message.page_details_url(), None);
}

#[test]
fn unknown_command_is_a_parse_error() {
    match HostMessage::from_json(r#"{"command":"formatTheDisk"}"#) {
        Err(EngineError::JsonParse { context, .. }) => assert_eq!(context, "host message"),
        other => panic!("Expected JsonParse error, got {:?}", other),
    }
}

// ============================================================================
// NDJSON transport
// ============================================================================

#[test]
fn ndjson_reads_messages_and_skips_blank_lines() {
    let input = "{\"command\":\"collectPageDetails\"}\n\n   \n{\"command\":\"destroyAutofillScript\"}\n";
    let mut host = NdjsonHost::new(Cursor::new(input), Vec::new());

    assert_eq!(
        host.next_message().unwrap(),
        Some(HostMessage::CollectPageDetails { sender: None })
    );
    assert_eq!(host.next_message().unwrap(), Some(HostMessage::DestroyAutofillScript));
    assert_eq!(host.next_message().unwrap(), None);
    assert_eq!(host.next_message().unwrap(), None);
}

#[test]
fn ndjson_writes_one_line_per_message() {
    let mut host = NdjsonHost::new(Cursor::new(""), Vec::new());

    host.send(&EngineMessage::BgCollectPageDetails {
        sender: AUTO_SUBMIT_SENDER.to_string(),
    })
    .unwrap();
    host.send(&EngineMessage::MultiStepAutoSubmitLoginComplete)
        .unwrap();

    let (_, written) = host.into_parts();
    let lines = sent_lines(&written);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["command"], "bgCollectPageDetails");
    assert_eq!(lines[1]["command"], "multiStepAutoSubmitLoginComplete");
}

#[test]
fn ndjson_malformed_line_is_reported() {
    let mut host = NdjsonHost::new(Cursor::new("not json\n"), Vec::new());
    assert!(matches!(host.next_message(), Err(EngineError::JsonParse { .. })));
}

#[test]
fn workflow_runs_over_ndjson() {
    let trigger = json!({
        "command": "triggerAutoSubmitLogin",
        "pageDetailsUrl": LOGIN_URL,
        "fillScript": {
            "script": [["fill_by_opid", "__0", "alice"], ["fill_by_opid", "__1", "secret"]],
            "autosubmit": ["__form__0"]
        }
    });
    let input = format!("{}\n", trigger);
    let host = NdjsonHost::new(Cursor::new(input), Vec::new());
    let clock: Rc<dyn Clock> = Rc::new(ManualClock::new());
    let mut controller = build_controller(
        host,
        &EngineConfig::default(),
        Box::new(AutoConfirm(true)),
        clock,
        Rc::new(TraceLogger::disabled()),
    );
    let mut doc = document(login_form());

    let state = controller.run(&mut doc).unwrap();

    assert_eq!(state, AutoSubmitState::Done);
    assert_eq!(doc.value(by_id(&doc, "password")), "secret");
    assert_eq!(doc.submissions().len(), 1);

    let (_, written) = controller.into_host().into_parts();
    let commands: Vec<String> = sent_lines(&written)
        .iter()
        .map(|v| v["command"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        commands,
        vec![
            "bgCollectPageDetails",
            "triggerAutoSubmitLogin",
            "updateIsFieldCurrentlyFilling",
            "updateIsFieldCurrentlyFilling",
        ]
    );
    let request = &sent_lines(&written)[1];
    assert_eq!(request["pageDetailsUrl"], LOGIN_URL);
    assert_eq!(request["pageDetails"]["fields"][1]["type"], "password");
}

#[test]
fn listener_skips_malformed_lines() {
    let input = "not json\n{\"command\":\"collectPageDetails\"}\n";
    let host = NdjsonHost::new(Cursor::new(input), Vec::new());
    let clock: Rc<dyn Clock> = Rc::new(ManualClock::new());
    let tracer = Rc::new(TraceLogger::in_memory());
    let mut controller = build_controller(
        host,
        &EngineConfig::default(),
        Box::new(AutoConfirm(true)),
        clock,
        Rc::clone(&tracer),
    );
    let mut doc = document(login_form());

    controller.listen(&mut doc).unwrap();

    let (_, written) = controller.into_host().into_parts();
    let lines = sent_lines(&written);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["command"], "collectPageDetailsResponse");
    assert_eq!(tracer.events().iter().filter(|e| e.stage == "error").count(), 1);
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "host went away"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn listener_stops_on_transport_failure() {
    let input = "{\"command\":\"collectPageDetails\"}\n{\"command\":\"collectPageDetails\"}\n";
    let host = NdjsonHost::new(Cursor::new(input), ClosedPipe);
    let clock: Rc<dyn Clock> = Rc::new(ManualClock::new());
    let mut controller = build_controller(
        host,
        &EngineConfig::default(),
        Box::new(AutoConfirm(true)),
        clock,
        Rc::new(TraceLogger::disabled()),
    );
    let mut doc = document(login_form());

    match controller.listen(&mut doc) {
        Err(EngineError::HostIo { context, .. }) => {
            assert_eq!(context, "writing collectPageDetailsResponse")
        }
        other => panic!("Expected HostIo error, got {:?}", other),
    }
}

// ============================================================================
// Other transports
// ============================================================================

#[test]
fn recording_host_serves_pushed_messages_in_order() {
    let mut host = RecordingHost::new();
    host.push(HostMessage::DestroyAutofillScript);
    host.push(HostMessage::CollectPageDetails {
        sender: Some("popup".into()),
    });

    assert_eq!(host.next_message().unwrap(), Some(HostMessage::DestroyAutofillScript));
    assert!(matches!(
        host.next_message().unwrap(),
        Some(HostMessage::CollectPageDetails { sender: Some(_) })
    ));
    assert_eq!(host.next_message().unwrap(), None);

    host.send(&EngineMessage::MultiStepAutoSubmitLoginComplete)
        .unwrap();
    assert_eq!(host.sent_commands(), vec!["multiStepAutoSubmitLoginComplete"]);
}

#[test]
fn http_host_reports_unreachable_endpoint() {
    let mut host = HttpHost::new("http://127.0.0.1:1/autofill");
    assert_eq!(host.endpoint(), "http://127.0.0.1:1/autofill");

    let result = host.send(&EngineMessage::MultiStepAutoSubmitLoginComplete);
    assert!(matches!(result, Err(EngineError::Host(_))));
    assert_eq!(host.next_message().unwrap(), None);
}
