use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Clock, TimerSlot};
use crate::collect::collector::{is_password_input, PageCollector};
use crate::collect::page_details::PageDetails;
use crate::dom::document::{Document, ReadyState};
use crate::dom::events::{MutationKind, MutationObserverId, MutationObserverInit};
use crate::error::EngineError;
use crate::fill::executor::{FillExecutor, FillOutcome};
use crate::fill::fill_script::FillScript;
use crate::host::channel::HostChannel;
use crate::host::messages::{EngineMessage, HostMessage, AUTO_SUBMIT_SENDER};
use crate::submit::search::{FormSubmission, SubmitSearch};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

pub const DEFAULT_PRE_COLLECT_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_POST_FILL_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSubmitState {
    Idle,
    WaitingForPageLoad,
    Collecting,
    Filling,
    SearchingForSubmit,
    Done,
    Failed,
}

impl AutoSubmitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AutoSubmitState::Done | AutoSubmitState::Failed)
    }
}

/// Settle delays around the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTimings {
    pub pre_collect_delay: Duration,
    pub post_fill_delay: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        ControllerTimings {
            pre_collect_delay: DEFAULT_PRE_COLLECT_DELAY,
            post_fill_delay: DEFAULT_POST_FILL_DELAY,
        }
    }
}

/// Document-wide mutation observer and the location it last saw.
#[derive(Debug, Clone)]
struct PageWatch {
    observer: MutationObserverId,
    href: String,
}

/// Drives collect → fill → submit for one document.
///
/// Owns the host channel and the only timer of the workflow. After
/// `destroy` every call is a no-op.
pub struct AutoSubmitController<H: HostChannel> {
    host: H,
    collector: Rc<PageCollector>,
    executor: FillExecutor,
    search: SubmitSearch,
    clock: Rc<dyn Clock>,
    timer: TimerSlot,
    timings: ControllerTimings,
    state: AutoSubmitState,
    watch: Option<PageWatch>,
    destroyed: bool,
    tracer: Rc<TraceLogger>,
}

impl<H: HostChannel> AutoSubmitController<H> {
    pub fn new(host: H, executor: FillExecutor, search: SubmitSearch, clock: Rc<dyn Clock>) -> Self {
        AutoSubmitController {
            host,
            collector: Rc::clone(executor.collector()),
            executor,
            search,
            clock,
            timer: TimerSlot::new(),
            timings: ControllerTimings::default(),
            state: AutoSubmitState::Idle,
            watch: None,
            destroyed: false,
            tracer: Rc::new(TraceLogger::disabled()),
        }
    }

    pub fn with_timings(mut self, timings: ControllerTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_tracer(mut self, tracer: Rc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn state(&self) -> AutoSubmitState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    /// Begins the workflow: collects now when the page has loaded, otherwise
    /// waits for `on_page_load`.
    pub fn start(&mut self, doc: &mut Document) -> Result<(), EngineError> {
        if self.destroyed {
            return Ok(());
        }
        self.watch(doc);
        if doc.ready_state != ReadyState::Complete {
            self.set_state(AutoSubmitState::WaitingForPageLoad);
            return Ok(());
        }
        self.collect_and_request_script(doc)
    }

    pub fn on_page_load(&mut self, doc: &mut Document) -> Result<(), EngineError> {
        doc.ready_state = ReadyState::Complete;
        if self.destroyed || self.state != AutoSubmitState::WaitingForPageLoad {
            return Ok(());
        }
        self.collect_and_request_script(doc)
    }

    /// Starts the workflow and processes host messages until it ends, the
    /// host goes quiet, or the controller is torn down.
    pub fn run(&mut self, doc: &mut Document) -> Result<AutoSubmitState, EngineError> {
        self.start(doc)?;
        if self.state == AutoSubmitState::WaitingForPageLoad {
            self.on_page_load(doc)?;
        }

        while !self.destroyed && !self.state.is_terminal() {
            match self.host.next_message()? {
                Some(message) => self.handle_message(doc, message)?,
                None => break,
            }
        }
        Ok(self.state)
    }

    /// Processes host messages until the channel closes or the controller
    /// is torn down. Unlike `run`, keeps serving after the workflow ends. A
    /// message that fails is logged and skipped; only transport failures
    /// end the loop.
    pub fn listen(&mut self, doc: &mut Document) -> Result<(), EngineError> {
        self.watch(doc);
        while !self.destroyed {
            if let Err(e) = self.process_mutations(doc) {
                self.report(e)?;
            }
            let message = match self.host.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    self.report(e)?;
                    continue;
                }
            };
            self.executor.run_due_animations(doc);
            if let Err(e) = self.handle_message(doc, message) {
                self.report(e)?;
            }
        }
        Ok(())
    }

    fn report(&self, error: EngineError) -> Result<(), EngineError> {
        if error.is_transport() {
            return Err(error);
        }
        warn!("host message failed: {}", error);
        self.tracer
            .log(TraceEvent::now("error").with_detail(error.to_string()));
        Ok(())
    }

    // ========================================================================
    // Page watch
    // ========================================================================

    /// Observes the whole document. Shadow roots join the watch as
    /// collection passes discover them.
    pub fn watch(&mut self, doc: &mut Document) {
        if self.watch.is_some() || self.destroyed {
            return;
        }
        let observer = doc.create_mutation_observer();
        let root = doc.document_element();
        doc.observe(observer, root, MutationObserverInit::all());
        self.watch = Some(PageWatch {
            observer,
            href: doc.href(),
        });
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Drains the page watch. A new URL restarts the workflow; forms or
    /// fields entering or leaving the page refresh the collected details.
    pub fn process_mutations(&mut self, doc: &mut Document) -> Result<(), EngineError> {
        if self.destroyed {
            return Ok(());
        }
        let Some(observer) = self.watch.as_ref().map(|w| w.observer) else {
            return Ok(());
        };
        let records = doc.take_records(observer);

        let href = doc.href();
        if self.watch.as_ref().is_some_and(|w| w.href != href) {
            return self.handle_location_change(doc, href);
        }

        let churned = records.iter().any(|record| {
            record.kind == MutationKind::ChildList
                && (self.collector.touches_candidates(doc, &record.removed_nodes)
                    || self.collector.touches_candidates(doc, &record.added_nodes))
        });
        if churned {
            let details = self.collect(doc);
            debug!(fields = details.fields.len(), "form elements changed, details refreshed");
            self.tracer.log(
                TraceEvent::now("mutation")
                    .with_count(details.fields.len())
                    .with_detail("fields changed"),
            );
        }
        Ok(())
    }

    fn handle_location_change(&mut self, doc: &mut Document, href: String) -> Result<(), EngineError> {
        info!(href = %href, "location changed, restarting auto-submit");
        if let Some(watch) = self.watch.as_mut() {
            watch.href = href;
        }
        self.timer.clear();
        self.set_state(AutoSubmitState::Idle);
        self.tracer
            .log(TraceEvent::now("mutation").with_detail("location changed"));
        self.start(doc)
    }

    fn collect(&self, doc: &mut Document) -> PageDetails {
        match &self.watch {
            Some(watch) => self.collector.collect_observed(doc, watch.observer),
            None => self.collector.collect(doc),
        }
    }

    pub fn handle_message(&mut self, doc: &mut Document, message: HostMessage) -> Result<(), EngineError> {
        if self.destroyed {
            debug!(?message, "controller destroyed, ignoring message");
            return Ok(());
        }
        if let Some(url) = message.page_details_url() {
            if url != doc.href() {
                debug!(url, href = %doc.href(), "ignoring message for another page");
                return Ok(());
            }
        }

        match message {
            HostMessage::CollectPageDetails { .. } => {
                let details = self.collect(doc);
                self.host.send(&EngineMessage::CollectPageDetailsResponse {
                    details,
                    page_details_url: doc.href(),
                })
            }
            HostMessage::TriggerAutoSubmitLogin { .. } if self.state.is_terminal() => {
                debug!(state = ?self.state, "workflow already ended, ignoring trigger");
                Ok(())
            }
            HostMessage::TriggerAutoSubmitLogin { fill_script, .. } => {
                self.trigger_auto_submit(doc, &fill_script)
            }
            HostMessage::FillForm { fill_script, .. } => {
                let outcome = self.executor.fill_form(doc, &fill_script);
                debug!(?outcome, "direct fill finished");
                Ok(())
            }
            HostMessage::DestroyAutofillScript => {
                self.destroy();
                Ok(())
            }
        }
    }

    /// Tears the controller down. Pending timers are dropped and no later
    /// call resumes the workflow.
    pub fn destroy(&mut self) {
        self.timer.clear();
        self.watch = None;
        self.destroyed = true;
        self.state = AutoSubmitState::Idle;
        info!("auto-submit controller destroyed");
        self.tracer
            .log(TraceEvent::now("workflow").with_detail("destroyed"));
    }

    fn collect_and_request_script(&mut self, doc: &mut Document) -> Result<(), EngineError> {
        self.timer.clear();
        self.timer.arm(self.clock.as_ref(), self.timings.pre_collect_delay);
        self.timer.wait(self.clock.as_ref());

        self.set_state(AutoSubmitState::Collecting);
        self.host.send(&EngineMessage::BgCollectPageDetails {
            sender: AUTO_SUBMIT_SENDER.to_string(),
        })?;

        let details = self.collect(doc);
        if details.fields.is_empty() {
            info!("no fields on page, nothing to submit");
            self.finish();
            return Ok(());
        }

        self.host.send(&EngineMessage::TriggerAutoSubmitLogin {
            page_details: details,
            page_details_url: doc.href(),
        })
    }

    fn trigger_auto_submit(&mut self, doc: &mut Document, script: &FillScript) -> Result<(), EngineError> {
        let Some(form_opid) = script.autosubmit_target() else {
            return self.fail(EngineError::MissingAutoSubmitReference);
        };

        self.set_state(AutoSubmitState::Filling);
        self.host.send(&EngineMessage::UpdateIsFieldCurrentlyFilling {
            is_field_currently_filling: true,
        })?;

        let outcome = self.executor.fill_form(doc, script);
        if let FillOutcome::Vetoed(reason) = outcome {
            info!(?reason, "fill vetoed, skipping submit");
            self.finish();
            return Ok(());
        }

        self.timer.arm(self.clock.as_ref(), self.timings.post_fill_delay);
        if let Some(deadline) = self.timer.deadline() {
            self.executor.run_animations_until(doc, deadline);
        }
        self.timer.wait(self.clock.as_ref());
        self.set_state(AutoSubmitState::SearchingForSubmit);

        if let Some(form_opid) = form_opid {
            match self.collector.form_element_by_opid(doc, form_opid) {
                Some(form) => {
                    let submission = self.search.submit_form(doc, form);
                    debug!(?submission, form_opid, "form submitted");
                    if let FormSubmission::Clicked(_) = submission {
                        self.tracer
                            .log(TraceEvent::now("submit").with_opid(form_opid).with_detail("form button"));
                    }
                    self.finish();
                    return Ok(());
                }
                None => debug!(form_opid, "form not found, searching formless"),
            }
        }

        self.submit_formless(doc, script)
    }

    fn submit_formless(&mut self, doc: &mut Document, script: &FillScript) -> Result<(), EngineError> {
        let last_opid = script.last_opid().map(str::to_string);
        let start = last_opid
            .as_deref()
            .and_then(|opid| self.collector.field_element_by_opid(doc, opid));

        let clicked = start.and_then(|node| self.search.submit_formless(doc, node));
        let (Some(start), Some(_)) = (start, clicked) else {
            return self.fail(EngineError::SubmitTargetNotFound { opid: last_opid });
        };

        if is_password_input(doc, start) {
            self.host.send(&EngineMessage::MultiStepAutoSubmitLoginComplete)?;
            self.tracer
                .log(TraceEvent::now("submit").with_detail("multi-step step complete"));
        }
        self.finish();
        Ok(())
    }

    // ========================================================================
    // Endings
    // ========================================================================

    fn finish(&mut self) {
        self.reset();
        self.set_state(AutoSubmitState::Done);
    }

    fn fail(&mut self, error: EngineError) -> Result<(), EngineError> {
        self.reset();
        self.set_state(AutoSubmitState::Failed);
        warn!("auto-submit failed: {}", error);
        self.tracer
            .log(TraceEvent::now("workflow").with_detail(error.to_string()));
        Err(error)
    }

    /// Clears the timer and the host's filling indicator.
    fn reset(&mut self) {
        self.timer.clear();
        let message = EngineMessage::UpdateIsFieldCurrentlyFilling {
            is_field_currently_filling: false,
        };
        if let Err(e) = self.host.send(&message) {
            warn!("could not clear filling indicator: {}", e);
        }
    }

    fn set_state(&mut self, state: AutoSubmitState) {
        debug!(from = ?self.state, to = ?state, "auto-submit transition");
        self.state = state;
        self.tracer
            .log(TraceEvent::now("workflow").with_state(&state));
    }
}
