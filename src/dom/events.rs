use std::rc::Rc;

use super::document::Document;
use super::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Focus,
    Blur,
    KeyDown,
    KeyPress,
    KeyUp,
    Input,
    Change,
    Submit,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::KeyDown => "keydown",
            EventKind::KeyPress => "keypress",
            EventKind::KeyUp => "keyup",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Submit => "submit",
        }
    }

    /// Focus and blur do not bubble.
    pub fn bubbles(&self) -> bool {
        !matches!(self, EventKind::Focus | EventKind::Blur)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub target: NodeId,
}

/// A page script hook. Listeners get the document mutably so they can
/// interfere with the engine the way real page scripts do.
pub type Listener = Rc<dyn Fn(&mut Document, &Event)>;

#[derive(Clone)]
pub(crate) struct RegisteredListener {
    pub node: NodeId,
    pub kind: EventKind,
    pub callback: Listener,
}

/// Log entry for every event dispatched on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub kind: EventKind,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationObserverId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub attributes: bool,
    pub child_list: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    /// `{ attributes: true, childList: true, subtree: true }`
    pub const fn all() -> Self {
        MutationObserverInit {
            attributes: true,
            child_list: true,
            subtree: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Attributes { name: String },
    ChildList,
    Property { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    /// Child list changes only.
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Observation {
    pub observer: MutationObserverId,
    pub target: NodeId,
    pub init: MutationObserverInit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitVia {
    /// Activation of a submit button inside the form.
    Button(NodeId),
    RequestSubmit,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub form: NodeId,
    pub via: SubmitVia,
}
