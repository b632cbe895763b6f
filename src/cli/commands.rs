use std::io::{BufReader, Write};
use std::rc::Rc;

use serde_json::json;
use tracing::info;

use crate::cli::config::EngineConfig;
use crate::clock::{Clock, SystemClock};
use crate::collect::collector::PageCollector;
use crate::dom::document::Document;
use crate::dom::snapshot::DomSnapshot;
use crate::fill::confirm::{AutoConfirm, ConfirmPrompt, TerminalConfirm};
use crate::fill::fill_script::FillScript;
use crate::host::channel::{HttpHost, NdjsonHost, RecordingHost};
use crate::host::messages::{EngineMessage, HostMessage};
use crate::trace::logger::TraceLogger;
use crate::{build_collector, build_controller, build_executor};

// ============================================================================
// collect subcommand
// ============================================================================

pub fn cmd_collect(page: &str, engine: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tracer = Rc::new(TraceLogger::from_path(engine.trace_file.as_deref()));
    let mut doc = load_page(page)?;
    let collector = build_collector(engine, &tracer);

    let details = collector.collect(&mut doc);
    info!(fields = details.fields.len(), forms = details.forms.len(), "collected");
    println!("{}", details.to_json()?);
    Ok(())
}

// ============================================================================
// fill subcommand
// ============================================================================

pub fn cmd_fill(
    page: &str,
    script_path: &str,
    engine: &EngineConfig,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tracer = Rc::new(TraceLogger::from_path(engine.trace_file.as_deref()));
    let mut doc = load_page(page)?;
    let script = FillScript::load(script_path)?;

    let collector = build_collector(engine, &tracer);
    // Opids only exist after a collection pass.
    collector.collect(&mut doc);

    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());
    let executor = build_executor(engine, Rc::clone(&collector), confirmer(yes), clock, &tracer);
    let outcome = executor.fill_form(&mut doc, &script);

    let report = json!({
        "outcome": format!("{:?}", outcome),
        "fields": field_states(&doc, &collector),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ============================================================================
// autosubmit subcommand
// ============================================================================

/// Runs the workflow against an in-process host that answers every script
/// request with the given fill script.
pub fn cmd_autosubmit(
    page: &str,
    script_path: &str,
    engine: &EngineConfig,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tracer = Rc::new(TraceLogger::from_path(engine.trace_file.as_deref()));
    let mut doc = load_page(page)?;
    let script = FillScript::load(script_path)?;

    let host = RecordingHost::new().with_responder(move |message| match message {
        EngineMessage::TriggerAutoSubmitLogin {
            page_details_url, ..
        } => vec![HostMessage::TriggerAutoSubmitLogin {
            fill_script: script.clone(),
            page_details_url: page_details_url.clone(),
        }],
        _ => Vec::new(),
    });

    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());
    let mut controller = build_controller(host, engine, confirmer(yes), clock, tracer);
    let result = controller.run(&mut doc);

    let submissions: Vec<String> = doc
        .submissions()
        .iter()
        .map(|s| format!("{:?}", s.via))
        .collect();
    let report = json!({
        "state": format!("{:?}", controller.state()),
        "error": result.as_ref().err().map(|e| e.to_string()),
        "messages": controller.host().sent_commands(),
        "submissions": submissions,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    result?;
    Ok(())
}

// ============================================================================
// serve subcommand
// ============================================================================

pub fn cmd_serve(
    page: &str,
    host_url: Option<&str>,
    engine: &EngineConfig,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tracer = Rc::new(TraceLogger::from_path(engine.trace_file.as_deref()));
    let mut doc = load_page(page)?;
    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());

    match host_url {
        Some(url) => {
            info!(url, "serving over HTTP");
            let mut controller =
                build_controller(HttpHost::new(url), engine, confirmer(yes), clock, tracer);
            controller.start(&mut doc)?;
            controller.on_page_load(&mut doc)?;
            controller.listen(&mut doc)?;
        }
        None => {
            info!("serving NDJSON on stdin/stdout");
            // stdin carries host messages, so prompts cannot read from it.
            let host = NdjsonHost::new(BufReader::new(std::io::stdin()), std::io::stdout());
            let mut controller =
                build_controller(host, engine, Box::new(AutoConfirm(yes)), clock, tracer);
            controller.start(&mut doc)?;
            controller.on_page_load(&mut doc)?;
            controller.listen(&mut doc)?;
            let (_, mut stdout) = controller.into_host().into_parts();
            stdout.flush()?;
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

pub fn load_page(path: &str) -> Result<Document, Box<dyn std::error::Error>> {
    let snapshot = DomSnapshot::load(path)?;
    Ok(snapshot.build()?)
}

fn confirmer(yes: bool) -> Box<dyn ConfirmPrompt> {
    if yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(TerminalConfirm)
    }
}

/// Current value and checked state of every collected field.
fn field_states(doc: &Document, collector: &PageCollector) -> Vec<serde_json::Value> {
    collector
        .field_candidates(doc)
        .into_iter()
        .filter_map(|node| {
            let opid = doc.opid(node)?;
            Some(json!({
                "opid": opid,
                "tag": doc.tag(node).unwrap_or_default(),
                "value": if doc.has_value_property(node) { doc.value(node) } else { doc.text_content(node) },
                "checked": doc.checked(node),
            }))
        })
        .collect()
}
