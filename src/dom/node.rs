use cssparser::{Delimiter, ParseError, Parser, ParserInput};
use serde::{Deserialize, Serialize};

/// Index of a node inside a `Document` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    Open,
    Closed,
}

/// Layout box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    ShadowRoot { host: NodeId, mode: ShadowMode },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }
}

/// Element state: attributes plus the live properties page scripts and the
/// engine read and write (value, checked, opid).
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in source order, names lowercased.
    pub attrs: Vec<(String, String)>,
    /// Live `value` property. `None` until first written, in which case the
    /// `value` attribute (or option text for selects) is the value.
    pub value: Option<String>,
    pub checked: bool,
    /// Synthetic identifier written by the collector. Not an attribute.
    pub opid: Option<String>,
    pub shadow_root: Option<NodeId>,
    /// False for custom elements that have not been upgraded (`:defined`).
    pub defined: bool,
    /// Privileged shadow-root access throws for this host.
    pub shadow_access_throws: bool,
    /// Forms only: whether `requestSubmit()` is available.
    pub request_submit: bool,
    pub rect: Option<Rect>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: None,
            checked: false,
            opid: None,
            shadow_root: None,
            defined: true,
            shadow_access_throws: false,
            request_submit: true,
            rect: None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.attrs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attrs.push((name, value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| *k != name);
        before != self.attrs.len()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }
}

/// Inline style declarations relevant to visibility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f64>,
    pub clip_path: Option<String>,
}

impl InlineStyle {
    pub fn parse(style: &str) -> Self {
        let mut input = ParserInput::new(style);
        let mut parser = Parser::new(&mut input);
        let mut parsed = InlineStyle::default();

        while !parser.is_exhausted() {
            let declaration: Result<(String, String), ParseError<'_, ()>> =
                parser.parse_until_after(Delimiter::Semicolon, |p| {
                    let property = p.expect_ident()?.to_ascii_lowercase();
                    p.expect_colon()?;
                    let start = p.position();
                    while p.next().is_ok() {}
                    Ok((property, p.slice_from(start).to_string()))
                });
            let Ok((property, value)) = declaration else {
                continue;
            };
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();

            match property.as_str() {
                "display" => parsed.display = Some(value),
                "visibility" => parsed.visibility = Some(value),
                "opacity" => parsed.opacity = value.parse().ok(),
                "clip-path" => parsed.clip_path = Some(value),
                _ => {}
            }
        }

        parsed
    }
}
