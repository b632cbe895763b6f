use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::collect::collector::{PageCollector, CHECKED_SENTINEL};
use crate::dom::document::Document;
use crate::dom::events::EventKind;
use crate::dom::node::NodeId;
use crate::fill::confirm::{ConfirmPrompt, Localizer};
use crate::fill::fill_script::{FillAction, FillScript};
use crate::fill::fillable::{as_fillable, Fillable};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

pub const ANIMATION_CLASS: &str = "com-bitwarden-browser-animated-fill";
pub const DEFAULT_ACTION_DELAY: Duration = Duration::from_millis(20);
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(200);

const TRUTHY_VALUES: &[&str] = &["true", "y", "1", "yes", CHECKED_SENTINEL];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VetoReason {
    /// Sandboxed iframe, opaque origin, or no hostname.
    SandboxedFrame,
    InsecureOriginDeclined,
    UntrustedIframeDeclined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// Script had no actions.
    Empty,
    /// A gate stopped the fill before any action ran.
    Vetoed(VetoReason),
    Filled {
        actions_run: usize,
        /// Opid of the last action in script order.
        last_filled_opid: Option<String>,
    },
}

impl FillOutcome {
    pub fn is_vetoed(&self) -> bool {
        matches!(self, FillOutcome::Vetoed(_))
    }

    pub fn last_filled_opid(&self) -> Option<&str> {
        match self {
            FillOutcome::Filled {
                last_filled_opid, ..
            } => last_filled_opid.as_deref(),
            _ => None,
        }
    }
}

/// What a mutation wrote, re-asserted after page listeners run.
enum Written {
    Value(String),
    Checked,
    Text(String),
}

/// Applies fill scripts to the live document with simulated user
/// interaction around every write.
pub struct FillExecutor {
    collector: Rc<PageCollector>,
    confirm: Box<dyn ConfirmPrompt>,
    localizer: Localizer,
    clock: Rc<dyn Clock>,
    action_delay: Duration,
    animation_duration: Duration,
    /// Animation class removals not yet run, ordered by deadline.
    pending_removals: RefCell<Vec<(Duration, NodeId)>>,
    tracer: Rc<TraceLogger>,
}

impl FillExecutor {
    pub fn new(
        collector: Rc<PageCollector>,
        confirm: Box<dyn ConfirmPrompt>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        FillExecutor {
            collector,
            confirm,
            localizer: Localizer::default(),
            clock,
            action_delay: DEFAULT_ACTION_DELAY,
            animation_duration: DEFAULT_ANIMATION_DURATION,
            pending_removals: RefCell::new(Vec::new()),
            tracer: Rc::new(TraceLogger::disabled()),
        }
    }

    pub fn with_localizer(mut self, localizer: Localizer) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn with_animation_duration(mut self, duration: Duration) -> Self {
        self.animation_duration = duration;
        self
    }

    pub fn with_tracer(mut self, tracer: Rc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn collector(&self) -> &Rc<PageCollector> {
        &self.collector
    }

    // ========================================================================
    // Entry point
    // ========================================================================

    /// Runs every scripted action unless a gate vetoes the whole fill.
    /// Action `i` runs `delay × i` after a shared start. Returns as soon as
    /// the last action ran; animation removals stay scheduled.
    pub fn fill_form(&self, doc: &mut Document, script: &FillScript) -> FillOutcome {
        if script.is_empty() {
            return FillOutcome::Empty;
        }

        if let Some(reason) = self.veto(doc, script) {
            info!(?reason, "fill vetoed");
            self.tracer
                .log(TraceEvent::now("veto").with_detail(format!("{:?}", reason)));
            return FillOutcome::Vetoed(reason);
        }

        let delay = script
            .properties
            .delay_between_operations
            .map(Duration::from_millis)
            .unwrap_or(self.action_delay);
        let start = self.clock.now();
        let mut actions_run = 0;
        let mut last_filled_opid = None;

        for step in &script.steps {
            let due = start + delay * step.position as u32;
            self.run_removals(doc, Some(due));
            self.clock.sleep_until(due);

            let (resolved, animated) = self.run_action(doc, &step.action);
            if let Some(node) = animated {
                let deadline = self.clock.now() + self.animation_duration;
                let mut pending = self.pending_removals.borrow_mut();
                let at = pending.partition_point(|(d, _)| *d <= deadline);
                pending.insert(at, (deadline, node));
            }

            actions_run += 1;
            last_filled_opid = Some(step.action.opid().to_string());
            self.tracer.log(
                TraceEvent::now("fill")
                    .with_action(step.action.name())
                    .with_opid(step.action.opid())
                    .with_detail(if resolved { "applied" } else { "target not found" }),
            );
        }

        FillOutcome::Filled {
            actions_run,
            last_filled_opid,
        }
    }

    fn veto(&self, doc: &Document, script: &FillScript) -> Option<VetoReason> {
        if doc.frame.opaque_origin || doc.frame.sandboxed || doc.hostname().is_empty() {
            return Some(VetoReason::SandboxedFrame);
        }

        let hostname = doc.hostname();
        let secure_prefix = format!("https://{}", hostname);
        let saved_on_secure_page = script
            .saved_urls
            .as_ref()
            .is_some_and(|urls| urls.iter().any(|u| u.starts_with(&secure_prefix)));
        if saved_on_secure_page
            && doc.location().scheme() == "http"
            && self.collector.is_password_field_within_document(doc)
            && !self
                .confirm
                .confirm(&self.localizer.insecure_page_message(&hostname))
        {
            return Some(VetoReason::InsecureOriginDeclined);
        }

        if script.untrusted_iframe
            && !self
                .confirm
                .confirm(&self.localizer.untrusted_iframe_message(&hostname))
        {
            return Some(VetoReason::UntrustedIframeDeclined);
        }

        None
    }

    // ========================================================================
    // Animation timers
    // ========================================================================

    /// Elements still carrying the fill animation class.
    pub fn pending_animations(&self) -> Vec<NodeId> {
        self.pending_removals.borrow().iter().map(|(_, n)| *n).collect()
    }

    /// Runs, in deadline order, every removal due at or before `deadline`.
    /// Later removals stay scheduled.
    pub fn run_animations_until(&self, doc: &mut Document, deadline: Duration) {
        self.run_removals(doc, Some(deadline));
    }

    /// Runs removals that are already due without waiting.
    pub fn run_due_animations(&self, doc: &mut Document) {
        self.run_removals(doc, Some(self.clock.now()));
    }

    /// Waits out every scheduled removal.
    pub fn finish_animations(&self, doc: &mut Document) {
        self.run_removals(doc, None);
    }

    fn run_removals(&self, doc: &mut Document, until: Option<Duration>) {
        loop {
            let next = {
                let mut pending = self.pending_removals.borrow_mut();
                match pending.first() {
                    Some((deadline, _)) if until.is_none_or(|u| *deadline <= u) => {
                        Some(pending.remove(0))
                    }
                    _ => None,
                }
            };
            let Some((deadline, node)) = next else {
                break;
            };
            if deadline > self.clock.now() {
                self.clock.sleep_until(deadline);
            }
            doc.remove_class(node, ANIMATION_CLASS);
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Returns whether the opid resolved, and the element left animating.
    fn run_action(&self, doc: &mut Document, action: &FillAction) -> (bool, Option<NodeId>) {
        let target = self.collector.field_element_by_opid(doc, action.opid());
        let Some(node) = target else {
            debug!(action = action.name(), opid = action.opid(), "no element for opid");
            return (false, None);
        };

        let animated = match action {
            FillAction::FillByOpid { value, .. } => self.insert_value(doc, node, value),
            FillAction::ClickOnOpid { .. } => {
                doc.click(node);
                None
            }
            FillAction::FocusByOpid { .. } => {
                if doc.active_element() == Some(node) {
                    doc.blur(node);
                }
                self.click_and_focus(doc, node, true);
                None
            }
        };
        (true, animated)
    }

    fn insert_value(&self, doc: &mut Document, node: NodeId, value: &str) -> Option<NodeId> {
        let fillable = as_fillable(doc, node)?;
        if value.is_empty()
            || (fillable.can_be_readonly() && doc.is_read_only(node))
            || (fillable.can_be_disabled() && doc.is_disabled(node))
        {
            return None;
        }

        let written = match &fillable {
            Fillable::Span | Fillable::Other => Written::Text(value.to_string()),
            Fillable::Input { kind } if kind.is_toggle() => {
                let truthy = TRUTHY_VALUES.contains(&value.to_lowercase().as_str());
                if !truthy {
                    return None;
                }
                Written::Checked
            }
            _ => Written::Value(value.to_string()),
        };

        self.pre_insert_events(doc, node, &fillable);
        match &written {
            Written::Value(v) => doc.set_value(node, v),
            Written::Checked => doc.set_checked(node, true),
            Written::Text(t) => doc.set_text_content(node, t),
        }
        self.post_insert_events(doc, node, &fillable, &written);

        let hidden = self
            .collector
            .visibility()
            .is_element_hidden_by_css(doc, node);
        if hidden || !fillable.animates() {
            return None;
        }
        doc.add_class(node, ANIMATION_CLASS);
        Some(node)
    }

    fn pre_insert_events(&self, doc: &mut Document, node: NodeId, fillable: &Fillable) {
        let initial = fillable.is_form_field().then(|| doc.value(node));

        self.click_and_focus(doc, node, false);
        self.keyboard_events(doc, node);

        if let Some(initial) = initial {
            if doc.value(node) != initial {
                doc.set_value(node, &initial);
            }
        }
    }

    fn post_insert_events(
        &self,
        doc: &mut Document,
        node: NodeId,
        fillable: &Fillable,
        written: &Written,
    ) {
        let autofilled = fillable.is_form_field().then(|| doc.value(node));
        self.keyboard_events(doc, node);
        if let Some(autofilled) = &autofilled {
            if doc.value(node) != *autofilled {
                doc.set_value(node, autofilled);
            }
        }

        doc.dispatch_event(node, EventKind::Input);
        doc.dispatch_event(node, EventKind::Change);
        reassert(doc, node, written);
    }

    fn click_and_focus(&self, doc: &mut Document, node: NodeId, reset_value: bool) {
        doc.click(node);

        let initial = if reset_value && doc.has_value_property(node) {
            Some(doc.value(node))
        } else {
            None
        };
        doc.focus(node);

        if let Some(initial) = initial.filter(|v| !v.is_empty()) {
            if doc.value(node) != initial {
                doc.set_value(node, &initial);
            }
        }
    }

    fn keyboard_events(&self, doc: &mut Document, node: NodeId) {
        for kind in [EventKind::KeyDown, EventKind::KeyPress, EventKind::KeyUp] {
            doc.dispatch_event(node, kind);
        }
    }
}

/// Input/change listeners may rewrite the field; the script's value wins.
fn reassert(doc: &mut Document, node: NodeId, written: &Written) {
    match written {
        Written::Value(value) => {
            if doc.value(node) != *value {
                doc.set_value(node, value);
            }
        }
        Written::Checked => {
            if !doc.checked(node) {
                doc.set_checked(node, true);
            }
        }
        Written::Text(text) => {
            if doc.text_content(node) != *text {
                doc.set_text_content(node, text);
            }
        }
    }
}
