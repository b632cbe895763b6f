use std::rc::Rc;
use std::time::Duration;

use crate::{
    cli::config::EngineConfig,
    clock::Clock,
    collect::{collector::PageCollector, visibility::CssVisibility},
    fill::{confirm::ConfirmPrompt, executor::FillExecutor},
    host::channel::HostChannel,
    submit::{
        controller::{AutoSubmitController, ControllerTimings},
        search::{SubmitKeywords, SubmitSearch},
    },
    trace::logger::TraceLogger,
};

pub mod cli;
pub mod clock;
pub mod collect;
pub mod dom;
pub mod error;
pub mod fill;
pub mod host;
pub mod query;
pub mod submit;
pub mod trace;

/// Collector configured from `config`, using CSS-based visibility.
pub fn build_collector(config: &EngineConfig, tracer: &Rc<TraceLogger>) -> Rc<PageCollector> {
    Rc::new(
        PageCollector::new(Rc::new(CssVisibility))
            .with_max_fields(config.max_fields)
            .with_ignore_attribute(&config.ignore_attribute)
            .with_tracer(Rc::clone(tracer)),
    )
}

pub fn build_executor(
    config: &EngineConfig,
    collector: Rc<PageCollector>,
    confirm: Box<dyn ConfirmPrompt>,
    clock: Rc<dyn Clock>,
    tracer: &Rc<TraceLogger>,
) -> FillExecutor {
    FillExecutor::new(collector, confirm, clock)
        .with_action_delay(Duration::from_millis(config.action_delay_ms))
        .with_animation_duration(Duration::from_millis(config.animation_ms))
        .with_tracer(Rc::clone(tracer))
}

/// Wires collector, executor and submit search into a controller that
/// talks to `host`.
pub fn build_controller<H: HostChannel>(
    host: H,
    config: &EngineConfig,
    confirm: Box<dyn ConfirmPrompt>,
    clock: Rc<dyn Clock>,
    tracer: Rc<TraceLogger>,
) -> AutoSubmitController<H> {
    let collector = build_collector(config, &tracer);
    let executor = build_executor(config, collector, confirm, Rc::clone(&clock), &tracer);
    let keywords = SubmitKeywords::new(
        config.login_keywords.clone(),
        config.change_password_keywords.clone(),
    );
    let search = SubmitSearch::new(keywords).with_tracer(Rc::clone(&tracer));

    AutoSubmitController::new(host, executor, search, clock)
        .with_timings(ControllerTimings {
            pre_collect_delay: Duration::from_millis(config.pre_collect_delay_ms),
            post_fill_delay: Duration::from_millis(config.post_fill_delay_ms),
        })
        .with_tracer(tracer)
}
