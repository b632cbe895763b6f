use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::{debug, warn};

use crate::collect::labels::{label_left, label_right, label_tag, label_top};
use crate::collect::page_details::{FieldDescriptor, FormDescriptor, PageDetails, SelectInfo};
use crate::collect::visibility::VisibilityOracle;
use crate::dom::document::Document;
use crate::dom::events::MutationObserverId;
use crate::dom::node::NodeId;
use crate::error::EngineError;
use crate::query::deep_query::DomQueryService;
use crate::query::selector::SelectorList;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

pub const DEFAULT_MAX_FIELDS: usize = 50;
pub const DEFAULT_IGNORE_ATTRIBUTE: &str = "data-bwignore";

/// Input types that are never fill candidates.
pub const IGNORED_INPUT_TYPES: &[&str] = &["hidden", "submit", "reset", "button", "image", "file"];

/// Checkbox/radio fields are dropped first when the cap is hit.
const LOW_PRIORITY_TYPES: &[&str] = &["checkbox", "radio"];

const HIDDEN_VALUE_MAX_CHARS: usize = 254;
const MAX_LENGTH_CAP: i64 = 999;

pub const CHECKED_SENTINEL: &str = "\u{2713}";

fn option_punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[\s~`!@$%^&#*()\-_+=:;'"\[\]|\\,<.>?]"#).expect("option text regex must compile")
    })
}

/// How candidates are gathered from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectStrategy {
    /// Single depth-first walk that enters shadow roots after their hosts.
    #[default]
    TreeWalk,
    /// Selector query over the document, then over every shadow root.
    SelectorQuery,
}

/// Builds `PageDetails` from the live document and owns the opid mapping
/// between descriptors and elements.
pub struct PageCollector {
    query: DomQueryService,
    visibility: Rc<dyn VisibilityOracle>,
    max_fields: usize,
    ignore_attribute: String,
    strategy: CollectStrategy,
    tracer: Rc<TraceLogger>,
}

impl PageCollector {
    pub fn new(visibility: Rc<dyn VisibilityOracle>) -> Self {
        PageCollector {
            query: DomQueryService::new(),
            visibility,
            max_fields: DEFAULT_MAX_FIELDS,
            ignore_attribute: DEFAULT_IGNORE_ATTRIBUTE.to_string(),
            strategy: CollectStrategy::default(),
            tracer: Rc::new(TraceLogger::disabled()),
        }
    }

    pub fn with_max_fields(mut self, max_fields: usize) -> Self {
        self.max_fields = max_fields;
        self
    }

    pub fn with_ignore_attribute(mut self, attribute: &str) -> Self {
        self.ignore_attribute = attribute.to_ascii_lowercase();
        self
    }

    pub fn with_strategy(mut self, strategy: CollectStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tracer(mut self, tracer: Rc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn query(&self) -> &DomQueryService {
        &self.query
    }

    pub fn visibility(&self) -> &Rc<dyn VisibilityOracle> {
        &self.visibility
    }

    /// Selector equivalent of `is_form_field`.
    pub fn candidate_selector(&self) -> String {
        let ignore = &self.ignore_attribute;
        let mut input = format!("input:not([{}])", ignore);
        for input_type in IGNORED_INPUT_TYPES {
            input.push_str(&format!(":not([type=\"{}\" i])", input_type));
        }
        format!(
            "{}, textarea:not([{ignore}]), select:not([{ignore}]), span[data-bwautofill]",
            input
        )
    }

    pub fn is_form_field(&self, doc: &Document, node: NodeId) -> bool {
        match doc.tag(node) {
            Some("span") => doc.has_attr(node, "data-bwautofill"),
            Some(_) if doc.has_attr(node, &self.ignore_attribute) => false,
            Some("input") => doc
                .type_property(node)
                .is_some_and(|t| !IGNORED_INPUT_TYPES.contains(&t.as_str())),
            Some("textarea" | "select") => true,
            _ => false,
        }
    }

    // ========================================================================
    // Collection pass
    // ========================================================================

    pub fn collect(&self, doc: &mut Document) -> PageDetails {
        self.collect_pass(doc, None)
    }

    /// Collection pass that also registers `observer` on every shadow root
    /// it walks into.
    pub fn collect_observed(&self, doc: &mut Document, observer: MutationObserverId) -> PageDetails {
        self.collect_pass(doc, Some(observer))
    }

    fn collect_pass(&self, doc: &mut Document, observer: Option<MutationObserverId>) -> PageDetails {
        let (form_nodes, field_nodes) = match self.query_forms_and_fields(doc, observer) {
            Ok(found) => found,
            Err(e) => {
                warn!("candidate query failed: {}", e);
                (Vec::new(), Vec::new())
            }
        };

        let mut forms = BTreeMap::new();
        for (index, form) in form_nodes.iter().enumerate() {
            let opid = format!("__form__{}", index);
            doc.set_opid(*form, Some(opid.clone()));
            forms.insert(opid.clone(), self.build_form(doc, *form, opid));
        }

        let retained = self.prioritize(doc, &field_nodes);
        for dropped in field_nodes.iter().filter(|n| !retained.contains(n)) {
            doc.set_opid(*dropped, None);
        }

        let mut fields = Vec::with_capacity(retained.len());
        for (index, node) in retained.iter().enumerate() {
            if let Some(field) = self.build_field(doc, *node, index) {
                fields.push(field);
            }
        }

        let details = PageDetails {
            title: doc.title.clone(),
            url: doc.href(),
            document_url: doc.href(),
            forms,
            fields,
            collected_timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };

        debug!(
            forms = details.forms.len(),
            fields = details.fields.len(),
            candidates = field_nodes.len(),
            "collected page details"
        );
        self.tracer.log(
            TraceEvent::now("collect")
                .with_count(details.fields.len())
                .with_detail(details.structure_fingerprint()),
        );

        details
    }

    fn query_forms_and_fields(
        &self,
        doc: &mut Document,
        observer: Option<MutationObserverId>,
    ) -> Result<(Vec<NodeId>, Vec<NodeId>), EngineError> {
        let root = doc.root();
        let found = match self.strategy {
            CollectStrategy::TreeWalk => {
                let predicate =
                    |d: &Document, n: NodeId| d.is_tag(n, "form") || self.is_form_field(d, n);
                match observer {
                    Some(o) => self.query.walk_filtered_observed(doc, root, predicate, o),
                    None => self.query.walk_filtered(doc, root, predicate),
                }
            }
            CollectStrategy::SelectorQuery => {
                let selector = SelectorList::parse(&format!("form, {}", self.candidate_selector()))?;
                match observer {
                    Some(o) => self.query.deep_query_observed(doc, root, &selector, o),
                    None => self.query.deep_query(doc, root, &selector),
                }
            }
        };

        let (forms, fields): (Vec<NodeId>, Vec<NodeId>) =
            found.into_iter().partition(|n| doc.is_tag(*n, "form"));
        let fields = fields
            .into_iter()
            .filter(|n| self.is_form_field(doc, *n))
            .collect();
        Ok((forms, fields))
    }

    /// All current field candidates in document order, uncapped.
    pub fn field_candidates(&self, doc: &Document) -> Vec<NodeId> {
        self.query
            .walk_filtered(doc, doc.root(), |d, n| self.is_form_field(d, n))
    }

    pub fn form_candidates(&self, doc: &Document) -> Vec<NodeId> {
        self.query
            .walk_filtered(doc, doc.root(), |d, n| d.is_tag(n, "form"))
    }

    /// Whether any of `nodes`, or anything beneath them including shadow
    /// trees, is a form or a field candidate. Works on detached subtrees.
    pub fn touches_candidates(&self, doc: &Document, nodes: &[NodeId]) -> bool {
        nodes.iter().any(|node| {
            self.query
                .walk(doc, *node)
                .any(|n| doc.is_tag(n, "form") || self.is_form_field(doc, n))
        })
    }

    /// Applies the field cap. Above the cap, non-checkbox/radio fields keep
    /// their order and fill the list first; checkbox/radio fields take what
    /// room is left.
    pub fn prioritize(&self, doc: &Document, fields: &[NodeId]) -> Vec<NodeId> {
        if fields.len() <= self.max_fields {
            return fields.to_vec();
        }

        let mut priority = Vec::with_capacity(self.max_fields);
        let mut unimportant = Vec::new();
        for node in fields {
            if priority.len() >= self.max_fields {
                return priority;
            }
            let field_type = doc.type_property(*node).unwrap_or_default();
            if LOW_PRIORITY_TYPES.contains(&field_type.as_str()) {
                unimportant.push(*node);
            } else {
                priority.push(*node);
            }
        }

        let room = self.max_fields - priority.len();
        priority.extend(unimportant.into_iter().take(room));
        priority
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    fn build_form(&self, doc: &Document, form: NodeId, opid: String) -> FormDescriptor {
        FormDescriptor {
            opid,
            html_action: doc.resolve_url(doc.attr(form, "action")),
            html_name: doc.attr(form, "name").map(str::to_string),
            html_id: doc.attr(form, "id").map(str::to_string),
            html_method: doc.attr(form, "method").map(str::to_string),
        }
    }

    /// Assigns `__<index>` to the element and describes it. Fields nested in
    /// a submit button are skipped.
    pub fn build_field(&self, doc: &mut Document, node: NodeId, index: usize) -> Option<FieldDescriptor> {
        if inside_submit_button(doc, node) {
            return None;
        }

        let opid = format!("__{}", index);
        doc.set_opid(node, Some(opid.clone()));

        let attr = |name: &str| doc.attr(node, name).map(str::to_string);
        let mut field = FieldDescriptor {
            opid,
            element_number: index,
            tag_name: doc.tag(node).unwrap_or_default().to_string(),
            max_length: max_length(doc, node),
            viewable: self.visibility.is_form_field_viewable(doc, node),
            html_id: attr("id"),
            html_name: attr("name"),
            html_class: attr("class"),
            tabindex: attr("tabindex"),
            title: attr("title"),
            ..FieldDescriptor::default()
        };

        if doc.is_tag(node, "span") {
            return Some(field);
        }

        let field_type = doc.type_property(node);
        if field_type.as_deref() != Some("hidden") {
            field.label_tag = Some(label_tag(doc, node));
            field.label_data = attr("data-label");
            field.label_aria = attr("aria-label");
            field.label_top = label_top(doc, node);
            field.label_right = Some(label_right(doc, node));
            field.label_left = Some(label_left(doc, node));
            field.placeholder = attr("placeholder");
        }

        field.rel = attr("rel");
        field.value = Some(element_value(doc, node));
        field.field_type = field_type;
        field.checked = doc.checked(node);
        field.auto_complete_type = autocomplete_hint(doc, node);
        field.disabled = doc.is_disabled(node);
        field.readonly = doc.is_read_only(node);
        field.select_info = doc.is_tag(node, "select").then(|| select_info(doc, node));
        field.form = doc
            .form_owner(node)
            .and_then(|f| doc.opid(f))
            .map(str::to_string);
        field.aria_hidden = doc.attr(node, "aria-hidden") == Some("true");
        field.aria_disabled = doc.attr(node, "aria-disabled") == Some("true");
        field.aria_haspopup = doc.attr(node, "aria-haspopup") == Some("true");
        field.data_stripe = attr("data-stripe");

        Some(field)
    }

    // ========================================================================
    // Opid resolution
    // ========================================================================

    /// Live element for `opid`: the element carrying it, else the candidate
    /// at the index encoded in the opid.
    pub fn field_element_by_opid(&self, doc: &Document, opid: &str) -> Option<NodeId> {
        let candidates = self.prioritize(doc, &self.field_candidates(doc));
        let matching: Vec<NodeId> = candidates
            .iter()
            .copied()
            .filter(|n| doc.opid(*n) == Some(opid))
            .collect();

        if matching.len() > 1 {
            warn!("more than one element found with opid {}", opid);
        }
        if let Some(first) = matching.first() {
            return Some(*first);
        }

        let index: usize = opid.split("__").nth(1)?.parse().ok()?;
        candidates.get(index).copied()
    }

    pub fn form_element_by_opid(&self, doc: &Document, opid: &str) -> Option<NodeId> {
        self.form_candidates(doc)
            .into_iter()
            .find(|f| doc.opid(*f) == Some(opid))
    }

    /// Any password input anywhere in the document, shadow trees included.
    pub fn is_password_field_within_document(&self, doc: &Document) -> bool {
        self.query.walk(doc, doc.root()).any(|n| is_password_input(doc, n))
    }
}

pub fn is_password_input(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "input") && doc.type_property(node).as_deref() == Some("password")
}

fn inside_submit_button(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if doc.is_tag(n, "button") && doc.attr(n, "type") == Some("submit") {
            return true;
        }
        current = doc.parent_element(n);
    }
    false
}

fn max_length(doc: &Document, node: NodeId) -> Option<u32> {
    if !matches!(doc.tag(node), Some("input" | "textarea")) {
        return None;
    }
    let declared = doc
        .attr(node, "maxlength")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > -1)
        .unwrap_or(MAX_LENGTH_CAP);
    Some(declared.min(MAX_LENGTH_CAP) as u32)
}

fn element_value(doc: &Document, node: NodeId) -> String {
    if !doc.has_value_property(node) {
        return doc.text_content(node);
    }

    let value = doc.value(node);
    match doc.type_property(node).as_deref() {
        Some("checkbox") => {
            if doc.checked(node) {
                CHECKED_SENTINEL.to_string()
            } else {
                String::new()
            }
        }
        Some("hidden") if value.chars().count() > HIDDEN_VALUE_MAX_CHARS => {
            let kept: String = value.chars().take(HIDDEN_VALUE_MAX_CHARS).collect();
            format!("{}...SNIPPED", kept)
        }
        _ => value,
    }
}

fn autocomplete_hint(doc: &Document, node: NodeId) -> Option<String> {
    let hint = ["x-autocompletetype", "autocompletetype", "autocomplete"]
        .iter()
        .filter_map(|name| doc.attr(node, name))
        .find(|v| !v.is_empty())?;
    if hint.trim().eq_ignore_ascii_case("off") {
        return None;
    }
    Some(hint.to_string())
}

fn select_info(doc: &Document, select: NodeId) -> SelectInfo {
    let options = doc
        .options(select)
        .into_iter()
        .map(|option| {
            let text = doc.option_text(option);
            let normalized = if text.is_empty() {
                None
            } else {
                Some(
                    option_punctuation_re()
                        .replace_all(&text.to_lowercase(), "")
                        .into_owned(),
                )
            };
            (normalized, doc.option_value(option))
        })
        .collect();
    SelectInfo { options }
}
