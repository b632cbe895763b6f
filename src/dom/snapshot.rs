use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::EngineError;

use super::document::{Document, FrameContext, ReadyState, Viewport};
use super::node::{NodeId, Rect, ShadowMode};

/// JSON description of a page, used to build a live `Document`.
///
/// ```json
/// {
///   "url": "https://example.com/login",
///   "title": "Sign in",
///   "body": [
///     { "tag": "form", "attrs": { "id": "login" }, "children": [
///       { "tag": "input", "attrs": { "type": "password" } }
///     ]},
///     "some text"
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub frame: FrameContext,
    #[serde(default)]
    pub ready_state: ReadyState,
    #[serde(default = "default_true")]
    pub privileged_shadow_access: bool,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub body: Vec<SnapshotNode>,
}

/// A text node is a bare string, an element is an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Text(String),
    Element(ElementSnapshot),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
    #[serde(default)]
    pub shadow: Option<ShadowSnapshot>,
    #[serde(default)]
    pub rect: Option<Rect>,
    /// Custom element that has not been upgraded yet.
    #[serde(default)]
    pub undefined: bool,
    /// Privileged shadow-root access throws for this host.
    #[serde(default)]
    pub shadow_throws: bool,
    #[serde(default = "default_true")]
    pub request_submit: bool,
    /// Live value, when it differs from the `value` attribute.
    #[serde(default)]
    pub value: Option<String>,
    /// Live checkedness. Defaults to the presence of a `checked` attribute.
    #[serde(default)]
    pub checked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSnapshot {
    #[serde(default = "default_open")]
    pub mode: ShadowMode,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

fn default_true() -> bool { true }
fn default_open() -> ShadowMode { ShadowMode::Open }

impl DomSnapshot {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::JsonParse {
            context: "DOM snapshot".into(),
            source: e,
        })
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, EngineError> {
        serde_json::from_value(value).map_err(|e| EngineError::JsonParse {
            context: "DOM snapshot".into(),
            source: e,
        })
    }

    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Snapshot(format!("cannot read {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    /// Builds the live document. Page scripts (listeners) are attached to the
    /// result afterwards.
    pub fn build(&self) -> Result<Document, EngineError> {
        let location = Url::parse(&self.url)
            .map_err(|e| EngineError::Snapshot(format!("invalid url '{}': {}", self.url, e)))?;

        let base_url = match &self.base_url {
            Some(base) => Some(location.join(base).map_err(|e| {
                EngineError::Snapshot(format!("invalid base url '{}': {}", base, e))
            })?),
            None => None,
        };

        let mut doc = Document::new(location);
        doc.title = self.title.clone();
        doc.set_base_url(base_url);
        doc.frame = self.frame.clone();
        doc.ready_state = self.ready_state;
        doc.privileged_shadow_access = self.privileged_shadow_access;
        if let Some(viewport) = self.viewport {
            doc.viewport = viewport;
        }

        let body = doc.body();
        build_children(&mut doc, body, &self.body)?;
        Ok(doc)
    }
}

fn build_children(
    doc: &mut Document,
    parent: NodeId,
    children: &[SnapshotNode],
) -> Result<(), EngineError> {
    for child in children {
        let id = match child {
            SnapshotNode::Text(text) => doc.create_text(text),
            SnapshotNode::Element(element) => build_element(doc, element)?,
        };
        doc.append_child(parent, id);
    }
    Ok(())
}

fn build_element(doc: &mut Document, snapshot: &ElementSnapshot) -> Result<NodeId, EngineError> {
    let tag = snapshot.tag.trim();
    if tag.is_empty() || tag.contains(char::is_whitespace) {
        return Err(EngineError::Snapshot(format!(
            "invalid tag name '{}'",
            snapshot.tag
        )));
    }

    let id = doc.create_element(tag);
    if let Some(data) = doc.element_mut(id) {
        for (name, value) in &snapshot.attrs {
            data.set_attr(name, value);
        }
        let checked = snapshot.checked.unwrap_or(data.has_attr("checked"));
        data.checked = checked;
        data.value = snapshot.value.clone();
        data.rect = snapshot.rect;
        data.defined = !snapshot.undefined;
        data.shadow_access_throws = snapshot.shadow_throws;
        data.request_submit = snapshot.request_submit;
    }

    if let Some(shadow) = &snapshot.shadow {
        let root = doc.attach_shadow(id, shadow.mode);
        build_children(doc, root, &shadow.children)?;
    }

    build_children(doc, id, &snapshot.children)?;
    Ok(id)
}
