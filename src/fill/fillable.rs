use crate::dom::document::Document;
use crate::dom::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Password,
    Email,
    Number,
    Tel,
    Url,
    Checkbox,
    Radio,
    Other(String),
}

impl InputKind {
    fn from_type(input_type: &str) -> Self {
        match input_type {
            "text" => InputKind::Text,
            "password" => InputKind::Password,
            "email" => InputKind::Email,
            "number" => InputKind::Number,
            "tel" => InputKind::Tel,
            "url" => InputKind::Url,
            "checkbox" => InputKind::Checkbox,
            "radio" => InputKind::Radio,
            other => InputKind::Other(other.to_string()),
        }
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self, InputKind::Checkbox | InputKind::Radio)
    }

    /// Text-like kinds that get the fill animation.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            InputKind::Text
                | InputKind::Password
                | InputKind::Email
                | InputKind::Number
                | InputKind::Tel
                | InputKind::Url
        )
    }
}

/// What a fill target can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fillable {
    Input { kind: InputKind },
    TextArea,
    Select,
    /// `span[data-bwautofill]` pseudo-field, filled through its text.
    Span,
    /// Any other element. Filled through its text, like a span.
    Other,
}

impl Fillable {
    /// Has a `value` property (input, textarea, select).
    pub fn is_form_field(&self) -> bool {
        matches!(self, Fillable::Input { .. } | Fillable::TextArea | Fillable::Select)
    }

    pub fn can_be_readonly(&self) -> bool {
        matches!(self, Fillable::Input { .. } | Fillable::TextArea)
    }

    pub fn can_be_disabled(&self) -> bool {
        self.is_form_field()
    }

    /// Form fields animate only when text-like. Non-field targets always do.
    pub fn animates(&self) -> bool {
        match self {
            Fillable::Input { kind } => kind.is_text_like(),
            Fillable::TextArea | Fillable::Select => false,
            Fillable::Span | Fillable::Other => true,
        }
    }
}

pub fn as_fillable(doc: &Document, node: NodeId) -> Option<Fillable> {
    let fillable = match doc.tag(node)? {
        "input" => Fillable::Input {
            kind: InputKind::from_type(&doc.type_property(node).unwrap_or_default()),
        },
        "textarea" => Fillable::TextArea,
        "select" => Fillable::Select,
        "span" => Fillable::Span,
        _ => Fillable::Other,
    };
    Some(fillable)
}
