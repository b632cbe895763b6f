use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use autofill_engine::build_controller;
use autofill_engine::cli::config::EngineConfig;
use autofill_engine::clock::{Clock, ManualClock};
use autofill_engine::collect::collector::PageCollector;
use autofill_engine::collect::visibility::CssVisibility;
use autofill_engine::fill::confirm::ConfirmPrompt;
use autofill_engine::fill::executor::FillExecutor;
use autofill_engine::fill::fill_script::FillScript;
use autofill_engine::host::channel::RecordingHost;
use autofill_engine::host::messages::{EngineMessage, HostMessage};
use autofill_engine::submit::controller::AutoSubmitController;
use autofill_engine::trace::logger::TraceLogger;

/// Confirmation prompt that answers from a queue (then a default) and
/// remembers every message it was shown.
pub struct ScriptedConfirm {
    answers: RefCell<VecDeque<bool>>,
    default: bool,
    asked: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn answering(default: bool) -> Rc<Self> {
        Rc::new(ScriptedConfirm {
            answers: RefCell::new(VecDeque::new()),
            default,
            asked: RefCell::new(Vec::new()),
        })
    }

    pub fn with_answers(answers: &[bool], default: bool) -> Rc<Self> {
        Rc::new(ScriptedConfirm {
            answers: RefCell::new(answers.iter().copied().collect()),
            default,
            asked: RefCell::new(Vec::new()),
        })
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl ConfirmPrompt for ScriptedConfirm {
    fn confirm(&self, message: &str) -> bool {
        self.asked.borrow_mut().push(message.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(self.default)
    }
}

pub fn collector() -> Rc<PageCollector> {
    Rc::new(PageCollector::new(Rc::new(CssVisibility)))
}

pub fn executor(
    collector: &Rc<PageCollector>,
    confirm: &Rc<ScriptedConfirm>,
    clock: &Rc<ManualClock>,
) -> FillExecutor {
    let clock: Rc<dyn Clock> = clock.clone();
    FillExecutor::new(Rc::clone(collector), Box::new(Rc::clone(confirm)), clock)
}

/// Host that answers the script request with `script`, addressed to
/// whatever URL the engine reported.
pub fn answering_host(script: FillScript) -> RecordingHost {
    RecordingHost::new().with_responder(move |message| match message {
        EngineMessage::TriggerAutoSubmitLogin {
            page_details_url, ..
        } => vec![HostMessage::TriggerAutoSubmitLogin {
            fill_script: script.clone(),
            page_details_url: page_details_url.clone(),
        }],
        _ => Vec::new(),
    })
}

pub fn controller(
    host: RecordingHost,
    clock: &Rc<ManualClock>,
    tracer: &Rc<TraceLogger>,
) -> AutoSubmitController<RecordingHost> {
    let clock: Rc<dyn Clock> = clock.clone();
    build_controller(
        host,
        &EngineConfig::default(),
        Box::new(ScriptedConfirm::answering(true)),
        clock,
        Rc::clone(tracer),
    )
}

/// `updateIsFieldCurrentlyFilling` payloads in the order they were sent.
pub fn filling_flags(host: &RecordingHost) -> Vec<bool> {
    host.sent()
        .iter()
        .filter_map(|m| match m {
            EngineMessage::UpdateIsFieldCurrentlyFilling {
                is_field_currently_filling,
            } => Some(*is_field_currently_filling),
            _ => None,
        })
        .collect()
}
