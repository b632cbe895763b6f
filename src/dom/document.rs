use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::events::{
    DispatchedEvent, Event, EventKind, Listener, MutationKind, MutationObserverId,
    MutationObserverInit, MutationRecord, Observation, RegisteredListener, Submission, SubmitVia,
};
use super::node::{ElementData, Node, NodeId, NodeKind, ShadowMode};

/// Browsing-context facts the fill gates look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameContext {
    /// The frame element carries a `sandbox` attribute.
    pub sandboxed: bool,
    /// `self.origin` serializes to `"null"`.
    pub opaque_origin: bool,
    /// Document is loaded inside an iframe.
    pub iframe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Arena-backed live document: light tree, attached shadow trees, page
/// listeners, mutation observers and the focus/submission state the engine
/// drives.
pub struct Document {
    nodes: Vec<Node>,
    document_element: NodeId,
    head: NodeId,
    body: NodeId,
    pub title: String,
    location: Url,
    base_url: Option<Url>,
    pub frame: FrameContext,
    pub ready_state: ReadyState,
    /// Extension-privileged accessor for closed shadow roots is available.
    pub privileged_shadow_access: bool,
    pub viewport: Viewport,
    active_element: Option<NodeId>,
    listeners: Vec<RegisteredListener>,
    event_log: Vec<DispatchedEvent>,
    observations: Vec<Observation>,
    pending_records: HashMap<MutationObserverId, Vec<MutationRecord>>,
    next_observer: usize,
    mutation_count: u64,
    submissions: Vec<Submission>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("location", &self.location.as_str())
            .field("title", &self.title)
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Document {
    pub fn new(location: Url) -> Self {
        let mut doc = Document {
            nodes: vec![Node {
                parent: None,
                children: vec![],
                kind: NodeKind::Document,
            }],
            document_element: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            title: String::new(),
            location,
            base_url: None,
            frame: FrameContext::default(),
            ready_state: ReadyState::Complete,
            privileged_shadow_access: true,
            viewport: Viewport::default(),
            active_element: None,
            listeners: vec![],
            event_log: vec![],
            observations: vec![],
            pending_records: HashMap::new(),
            next_observer: 0,
            mutation_count: 0,
            submissions: vec![],
        };

        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.attach(NodeId(0), html);
        doc.attach(html, head);
        doc.attach(html, body);
        doc.document_element = html;
        doc.head = head;
        doc.body = body;
        doc
    }

    // ------------------------------------------------------------------
    // Tree construction
    // ------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: vec![],
            kind,
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child);
        self.record_child_list(parent, vec![child], vec![]);
    }

    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
        if self.active_element == Some(node) {
            self.active_element = None;
        }
        self.record_child_list(parent, vec![], vec![node]);
    }

    /// Attaches a shadow root to `host` and returns it. Re-attaching returns
    /// the existing root.
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowMode) -> NodeId {
        if let Some(existing) = self.element(host).and_then(|e| e.shadow_root) {
            return existing;
        }
        let shadow = self.push_node(NodeKind::ShadowRoot { host, mode });
        if let Some(data) = self.nodes[host.0].element_mut() {
            data.shadow_root = Some(shadow);
        }
        shadow
    }

    // ------------------------------------------------------------------
    // Node inspection
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id.0).and_then(Node::element)
    }

    /// Direct element access for page setup. Changes made through this
    /// handle are not reported to mutation observers.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(id.0).and_then(Node::element_mut)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    fn sibling_position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, index))
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_position(id)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_position(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.previous_sibling(id);
        while let Some(node) = current {
            if self.is_element(node) {
                return Some(node);
            }
            current = self.previous_sibling(node);
        }
        None
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Top of the tree containing `id`: the document node, a shadow root, or
    /// the top of a detached subtree.
    pub fn root_node(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::ShadowRoot { .. })
    }

    pub fn shadow_host(&self, shadow_root: NodeId) -> Option<NodeId> {
        match self.nodes[shadow_root.0].kind {
            NodeKind::ShadowRoot { host, .. } => Some(host),
            _ => None,
        }
    }

    /// The shadow root attached to `host`, regardless of accessor rules.
    pub fn attached_shadow(&self, host: NodeId) -> Option<(NodeId, ShadowMode)> {
        let shadow = self.element(host)?.shadow_root?;
        match self.nodes[shadow.0].kind {
            NodeKind::ShadowRoot { mode, .. } => Some((shadow, mode)),
            _ => None,
        }
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = self.root_node(id);
        loop {
            if current == self.root() {
                return true;
            }
            match self.shadow_host(current) {
                Some(host) => current = self.root_node(host),
                None => return false,
            }
        }
    }

    /// Light-tree descendants of `root` in document order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Nearest inclusive ancestor element with the given tag, within the
    /// same tree.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_tag(node, tag) {
                return Some(node);
            }
            current = self.parent_element(node);
        }
        None
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn element_by_id_in(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// Concatenated text of light-tree descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let old_children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &old_children {
            self.nodes[child.0].parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.attach(id, text_node);
            added.push(text_node);
        }
        self.record_child_list(id, added, old_children);
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn href(&self) -> String {
        self.location.as_str().to_string()
    }

    pub fn hostname(&self) -> String {
        self.location.host_str().unwrap_or("").to_string()
    }

    pub fn set_location(&mut self, location: Url) {
        self.location = location;
    }

    pub fn set_base_url(&mut self, base: Option<Url>) {
        self.base_url = base;
    }

    /// Resolves `reference` against the document base URL. Missing or
    /// unparsable references resolve to the current page URL.
    pub fn resolve_url(&self, reference: Option<&str>) -> String {
        let base = self.base_url.as_ref().unwrap_or(&self.location);
        match reference {
            Some(r) if !r.trim().is_empty() => base
                .join(r.trim())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| self.href()),
            _ => self.href(),
        }
    }

    // ------------------------------------------------------------------
    // Form control properties
    // ------------------------------------------------------------------

    pub fn has_value_property(&self, id: NodeId) -> bool {
        matches!(self.tag(id), Some("input" | "textarea" | "select"))
    }

    /// Normalized `type` property: inputs default to `text`, selects report
    /// `select-one`/`select-multiple`, buttons default to `submit`.
    pub fn type_property(&self, id: NodeId) -> Option<String> {
        let element = self.element(id)?;
        match element.tag.as_str() {
            "input" => Some(
                element
                    .attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "text".to_string()),
            ),
            "select" => Some(if element.has_attr("multiple") {
                "select-multiple".to_string()
            } else {
                "select-one".to_string()
            }),
            "textarea" => Some("textarea".to_string()),
            "button" => Some(
                element
                    .attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| t == "button" || t == "reset")
                    .unwrap_or_else(|| "submit".to_string()),
            ),
            _ => element.attr("type").map(|t| t.to_ascii_lowercase()),
        }
    }

    pub fn value(&self, id: NodeId) -> String {
        let Some(element) = self.element(id) else {
            return String::new();
        };
        if let Some(value) = &element.value {
            return value.clone();
        }
        match element.tag.as_str() {
            "select" => {
                let options = self.options(id);
                options
                    .iter()
                    .find(|o| self.has_attr(**o, "selected"))
                    .or(options.first())
                    .map(|o| self.option_value(*o))
                    .unwrap_or_default()
            }
            "textarea" => self.text_content(id),
            _ => element.attr("value").unwrap_or("").to_string(),
        }
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(element) = self.nodes[id.0].element_mut() {
            element.value = Some(value.to_string());
            self.record_mutation(id, MutationKind::Property { name: "value" });
        }
    }

    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|n| self.is_tag(*n, "option"))
            .collect()
    }

    pub fn option_text(&self, option: NodeId) -> String {
        self.text_content(option)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.option_text(option))
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|e| e.checked)
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        if !self.is_element(id) {
            return;
        }
        if checked && self.type_property(id).as_deref() == Some("radio") {
            for other in self.radio_group(id) {
                if other != id {
                    if let Some(e) = self.nodes[other.0].element_mut() {
                        e.checked = false;
                    }
                }
            }
        }
        if let Some(e) = self.nodes[id.0].element_mut() {
            e.checked = checked;
        }
        self.record_mutation(id, MutationKind::Property { name: "checked" });
    }

    fn radio_group(&self, radio: NodeId) -> Vec<NodeId> {
        let Some(name) = self.attr(radio, "name").map(str::to_string) else {
            return vec![radio];
        };
        let owner = self.form_owner(radio);
        self.descendants(self.root_node(radio))
            .into_iter()
            .filter(|n| {
                self.type_property(*n).as_deref() == Some("radio")
                    && self.attr(*n, "name") == Some(name.as_str())
                    && self.form_owner(*n) == owner
            })
            .collect()
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.has_attr(id, "disabled")
    }

    pub fn is_read_only(&self, id: NodeId) -> bool {
        self.has_attr(id, "readonly")
    }

    /// The form a control belongs to: the `form` attribute's target in the
    /// same tree, else the nearest ancestor form.
    pub fn form_owner(&self, id: NodeId) -> Option<NodeId> {
        if let Some(form_id) = self.attr(id, "form") {
            return self
                .element_by_id_in(self.root_node(id), form_id)
                .filter(|f| self.is_tag(*f, "form"));
        }
        self.parent_element(id).and_then(|p| self.closest(p, "form"))
    }

    pub fn opid(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|e| e.opid.as_deref())
    }

    /// Writes the engine's synthetic identifier. This is an expando property,
    /// not an attribute, so it is not a DOM mutation.
    pub fn set_opid(&mut self, id: NodeId, opid: Option<String>) {
        if let Some(e) = self.nodes[id.0].element_mut() {
            e.opid = opid;
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(e) = self.nodes[id.0].element_mut() {
            e.set_attr(name, value);
            self.record_mutation(
                id,
                MutationKind::Attributes {
                    name: name.to_ascii_lowercase(),
                },
            );
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let removed = self
            .nodes
            .get_mut(id.0)
            .and_then(Node::element_mut)
            .is_some_and(|e| e.remove_attr(name));
        if removed {
            self.record_mutation(
                id,
                MutationKind::Attributes {
                    name: name.to_ascii_lowercase(),
                },
            );
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        let Some(element) = self.element(id) else {
            return;
        };
        if element.has_class(class) {
            return;
        }
        let mut classes: Vec<&str> = element.classes().collect();
        classes.push(class);
        let joined = classes.join(" ");
        self.set_attribute(id, "class", &joined);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(element) = self.element(id) else {
            return;
        };
        if !element.has_class(class) {
            return;
        }
        let joined = element
            .classes()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, "class", &joined);
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    pub fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    pub fn focus(&mut self, id: NodeId) {
        if !self.is_element(id) || self.active_element == Some(id) {
            return;
        }
        if let Some(previous) = self.active_element.take() {
            self.dispatch_event(previous, EventKind::Blur);
        }
        self.active_element = Some(id);
        self.dispatch_event(id, EventKind::Focus);
    }

    pub fn blur(&mut self, id: NodeId) {
        if self.active_element != Some(id) {
            return;
        }
        self.active_element = None;
        self.dispatch_event(id, EventKind::Blur);
    }

    fn is_form_control(&self, id: NodeId) -> bool {
        matches!(
            self.tag(id),
            Some("input" | "button" | "select" | "textarea")
        )
    }

    fn is_submit_button(&self, id: NodeId) -> bool {
        match self.tag(id) {
            Some("button") => self.type_property(id).as_deref() == Some("submit"),
            Some("input") => matches!(self.type_property(id).as_deref(), Some("submit" | "image")),
            _ => false,
        }
    }

    /// `element.click()`: checkbox/radio activation, the click event, then
    /// implicit submission for submit buttons.
    pub fn click(&mut self, id: NodeId) {
        if !self.is_element(id) || (self.is_form_control(id) && self.is_disabled(id)) {
            return;
        }

        match self.type_property(id).as_deref() {
            Some("checkbox") if self.is_tag(id, "input") => {
                let toggled = !self.checked(id);
                self.set_checked(id, toggled);
            }
            Some("radio") if self.is_tag(id, "input") => self.set_checked(id, true),
            _ => {}
        }

        self.dispatch_event(id, EventKind::Click);

        if self.is_submit_button(id) {
            if let Some(form) = self.form_owner(id) {
                self.dispatch_event(form, EventKind::Submit);
                self.submissions.push(Submission {
                    form,
                    via: SubmitVia::Button(id),
                });
            }
        }
    }

    pub fn supports_request_submit(&self, form: NodeId) -> bool {
        self.element(form).is_some_and(|e| e.request_submit)
    }

    pub fn request_submit(&mut self, form: NodeId) {
        self.dispatch_event(form, EventKind::Submit);
        self.submissions.push(Submission {
            form,
            via: SubmitVia::RequestSubmit,
        });
    }

    /// `form.submit()` bypasses the submit event.
    pub fn submit(&mut self, form: NodeId) {
        self.submissions.push(Submission {
            form,
            via: SubmitVia::Submit,
        });
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener(&mut self, node: NodeId, kind: EventKind, callback: Listener) {
        self.listeners.push(RegisteredListener {
            node,
            kind,
            callback,
        });
    }

    pub fn on<F>(&mut self, node: NodeId, kind: EventKind, callback: F)
    where
        F: Fn(&mut Document, &Event) + 'static,
    {
        self.add_event_listener(node, kind, Rc::new(callback));
    }

    /// Dispatches a synthetic event. Bubbling events propagate through
    /// ancestors and out of shadow trees via their hosts.
    pub fn dispatch_event(&mut self, target: NodeId, kind: EventKind) {
        self.event_log.push(DispatchedEvent { kind, target });

        let mut path = vec![target];
        if kind.bubbles() {
            let mut current = target;
            loop {
                let next = match self.parent(current) {
                    Some(parent) => Some(parent),
                    None => self.shadow_host(current),
                };
                match next {
                    Some(n) => {
                        path.push(n);
                        current = n;
                    }
                    None => break,
                }
            }
        }

        let event = Event { kind, target };
        for node in path {
            let callbacks: Vec<Listener> = self
                .listeners
                .iter()
                .filter(|l| l.node == node && l.kind == kind)
                .map(|l| Rc::clone(&l.callback))
                .collect();
            for callback in callbacks {
                callback(self, &event);
            }
        }
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.event_log
    }

    pub fn event_count(&self, target: NodeId, kind: EventKind) -> usize {
        self.event_log
            .iter()
            .filter(|e| e.target == target && e.kind == kind)
            .count()
    }

    // ------------------------------------------------------------------
    // Mutation observation
    // ------------------------------------------------------------------

    pub fn create_mutation_observer(&mut self) -> MutationObserverId {
        let id = MutationObserverId(self.next_observer);
        self.next_observer += 1;
        self.pending_records.insert(id, vec![]);
        id
    }

    pub fn observe(
        &mut self,
        observer: MutationObserverId,
        target: NodeId,
        init: MutationObserverInit,
    ) {
        let already = self
            .observations
            .iter_mut()
            .find(|o| o.observer == observer && o.target == target);
        match already {
            Some(existing) => existing.init = init,
            None => self.observations.push(Observation {
                observer,
                target,
                init,
            }),
        }
    }

    pub fn observed_targets(&self, observer: MutationObserverId) -> Vec<NodeId> {
        self.observations
            .iter()
            .filter(|o| o.observer == observer)
            .map(|o| o.target)
            .collect()
    }

    pub fn take_records(&mut self, observer: MutationObserverId) -> Vec<MutationRecord> {
        self.pending_records
            .get_mut(&observer)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn disconnect(&mut self, observer: MutationObserverId) {
        self.observations.retain(|o| o.observer != observer);
        self.pending_records.remove(&observer);
    }

    /// Total DOM mutations (attributes, tree, value/checked properties).
    pub fn mutation_count(&self) -> u64 {
        self.mutation_count
    }

    fn record_child_list(&mut self, parent: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        self.record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            added_nodes: added,
            removed_nodes: removed,
        });
    }

    fn record_mutation(&mut self, target: NodeId, kind: MutationKind) {
        self.record(MutationRecord {
            kind,
            target,
            added_nodes: vec![],
            removed_nodes: vec![],
        });
    }

    fn record(&mut self, record: MutationRecord) {
        self.mutation_count += 1;
        let (target, kind) = (record.target, &record.kind);

        let observed = match kind {
            MutationKind::Attributes { .. } | MutationKind::ChildList => true,
            MutationKind::Property { .. } => false,
        };
        if !observed {
            return;
        }

        let mut deliveries = Vec::new();
        for observation in &self.observations {
            let wants_kind = match kind {
                MutationKind::Attributes { .. } => observation.init.attributes,
                _ => observation.init.child_list,
            };
            if !wants_kind {
                continue;
            }
            let in_scope = observation.target == target
                || (observation.init.subtree && self.contains(observation.target, target));
            if in_scope && !deliveries.contains(&observation.observer) {
                deliveries.push(observation.observer);
            }
        }

        for observer in deliveries {
            self.pending_records
                .entry(observer)
                .or_default()
                .push(record.clone());
        }
    }
}
