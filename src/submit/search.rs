use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::query::deep_query::DomQueryService;
use crate::query::selector::SelectorList;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

pub const DEFAULT_LOGIN_KEYWORDS: &[&str] = &["login", "signin", "submit", "continue", "next", "verify"];
pub const DEFAULT_CHANGE_PASSWORD_KEYWORDS: &[&str] = &["change", "save", "update"];

/// Attributes whose text feeds a candidate's keyword set, after its text content.
const KEYWORD_ATTRIBUTES: &[&str] = &[
    "type",
    "value",
    "aria-label",
    "aria-labelledby",
    "aria-describedby",
    "title",
    "id",
    "name",
    "class",
];

const EXPLICIT_SUBMIT_SELECTOR: &str = "[type='submit']";
const BUTTON_SELECTOR: &str = "button, [type='button']";

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\s]").expect("keyword separator regex must compile"))
}

fn non_letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}]+").expect("keyword split regex must compile"))
}

/// Words that mark a control as the one that submits a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitKeywords {
    pub login: Vec<String>,
    pub change_password: Vec<String>,
}

impl Default for SubmitKeywords {
    fn default() -> Self {
        SubmitKeywords {
            login: DEFAULT_LOGIN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            change_password: DEFAULT_CHANGE_PASSWORD_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl SubmitKeywords {
    pub fn new(login: Vec<String>, change_password: Vec<String>) -> Self {
        SubmitKeywords {
            login,
            change_password,
        }
    }

    fn all(&self) -> impl Iterator<Item = &str> {
        self.login
            .iter()
            .chain(self.change_password.iter())
            .map(String::as_str)
    }
}

/// Lowercased words taken from a control's text and identifying attributes.
pub fn keywords_of(doc: &Document, node: NodeId) -> BTreeSet<String> {
    let mut sources = vec![doc.text_content(node)];
    sources.extend(
        KEYWORD_ATTRIBUTES
            .iter()
            .filter_map(|name| doc.attr(node, name).map(str::to_string)),
    );

    let mut keywords = BTreeSet::new();
    for source in sources {
        let squashed = separator_re().replace_all(&source.to_lowercase(), "").into_owned();
        for word in non_letter_re().split(&squashed) {
            if !word.is_empty() {
                keywords.insert(word.to_string());
            }
        }
    }
    keywords
}

/// How a form-anchored search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSubmission {
    Clicked(NodeId),
    RequestSubmit,
    Submit,
}

/// Finds and triggers the control that submits a filled login.
pub struct SubmitSearch {
    query: DomQueryService,
    keywords: SubmitKeywords,
    tracer: Rc<TraceLogger>,
}

impl SubmitSearch {
    pub fn new(keywords: SubmitKeywords) -> Self {
        SubmitSearch {
            query: DomQueryService::new(),
            keywords,
            tracer: Rc::new(TraceLogger::disabled()),
        }
    }

    pub fn with_tracer(mut self, tracer: Rc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn keywords(&self) -> &SubmitKeywords {
        &self.keywords
    }

    /// Any configured keyword appears inside the comma-joined keyword set.
    pub fn is_login_button(&self, doc: &Document, node: NodeId) -> bool {
        let joined = keywords_of(doc, node)
            .into_iter()
            .collect::<Vec<_>>()
            .join(",");
        self.keywords.all().any(|k| !k.is_empty() && joined.contains(k))
    }

    /// First qualifying explicit submit control under `root`, else the first
    /// qualifying button. Shadow roots are searched too.
    pub fn find_submit_in(&self, doc: &Document, root: NodeId) -> Option<NodeId> {
        [EXPLICIT_SUBMIT_SELECTOR, BUTTON_SELECTOR]
            .into_iter()
            .filter_map(|selector| SelectorList::parse(selector).ok())
            .find_map(|selector| {
                self.query
                    .deep_query(doc, root, &selector)
                    .into_iter()
                    .find(|candidate| self.is_login_button(doc, *candidate))
            })
    }

    /// Clicks the control found by `find_submit_in`.
    pub fn click_submit_in(&self, doc: &mut Document, root: NodeId) -> Option<NodeId> {
        let button = self.find_submit_in(doc, root)?;
        debug!(?button, "clicking submit control");
        doc.click(button);
        self.tracer.log(
            TraceEvent::now("submit")
                .with_action("click")
                .with_detail(describe(doc, button)),
        );
        Some(button)
    }

    /// Clicks a submit control inside the form, else asks the form to
    /// submit itself.
    pub fn submit_form(&self, doc: &mut Document, form: NodeId) -> FormSubmission {
        if let Some(button) = self.click_submit_in(doc, form) {
            return FormSubmission::Clicked(button);
        }

        if doc.supports_request_submit(form) {
            doc.request_submit(form);
            self.tracer
                .log(TraceEvent::now("submit").with_action("requestSubmit"));
            FormSubmission::RequestSubmit
        } else {
            doc.submit(form);
            self.tracer.log(TraceEvent::now("submit").with_action("submit"));
            FormSubmission::Submit
        }
    }

    /// Walks up from `start` testing each ancestor, leaving shadow roots
    /// through their host. Stops before `<html>`.
    pub fn submit_formless(&self, doc: &mut Document, start: NodeId) -> Option<NodeId> {
        let mut current = Some(start);
        while let Some(node) = current {
            if doc.is_tag(node, "html") {
                break;
            }
            if let Some(button) = self.click_submit_in(doc, node) {
                return Some(button);
            }

            current = match doc.parent_element(node) {
                Some(parent) => Some(parent),
                None => {
                    let root = doc.root_node(node);
                    if doc.is_shadow_root(root) {
                        doc.shadow_host(root)
                    } else {
                        None
                    }
                }
            };
        }
        None
    }
}

fn describe(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node).unwrap_or_default();
    match doc.attr(node, "id") {
        Some(id) => format!("{}#{}", tag, id),
        None => tag.to_string(),
    }
}
