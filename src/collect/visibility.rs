use crate::dom::document::Document;
use crate::dom::node::{InlineStyle, NodeId};

/// Decides whether a field is something a user could actually see.
pub trait VisibilityOracle {
    /// Laid out inside the viewport and not hidden by CSS.
    fn is_form_field_viewable(&self, doc: &Document, node: NodeId) -> bool;

    fn is_element_hidden_by_css(&self, doc: &Document, node: NodeId) -> bool;
}

/// Evaluates inline `style` declarations, the `hidden` attribute and the
/// element's layout box against the document viewport.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssVisibility;

impl CssVisibility {
    fn style(doc: &Document, node: NodeId) -> InlineStyle {
        doc.attr(node, "style")
            .map(InlineStyle::parse)
            .unwrap_or_default()
    }

    /// Walks the flat tree upward: parent elements, then the shadow host once
    /// a shadow root is reached.
    fn ancestors(doc: &Document, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = node;
        loop {
            let next = match doc.parent(current) {
                Some(p) if doc.is_shadow_root(p) => doc.shadow_host(p),
                Some(p) if doc.is_element(p) => Some(p),
                _ => None,
            };
            match next {
                Some(n) => {
                    out.push(n);
                    current = n;
                }
                None => return out,
            }
        }
    }

    fn is_outside_viewport(doc: &Document, node: NodeId) -> bool {
        let Some(rect) = doc.element(node).and_then(|e| e.rect) else {
            return false;
        };
        rect.width < 1.0
            || rect.height < 1.0
            || rect.right() < 0.0
            || rect.bottom() < 0.0
            || rect.x > doc.viewport.width
            || rect.y > doc.viewport.height
    }
}

fn clip_path_hides(clip_path: &str) -> bool {
    let value = clip_path.trim();
    if let Some(inner) = value.strip_prefix("inset(").and_then(|s| s.strip_suffix(')')) {
        return inner
            .split_whitespace()
            .filter_map(|v| v.strip_suffix('%'))
            .filter_map(|v| v.parse::<f64>().ok())
            .any(|v| v >= 50.0);
    }
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    matches!(compact.as_str(), "circle(0)" | "circle(0px)" | "circle(0%)")
}

impl VisibilityOracle for CssVisibility {
    fn is_form_field_viewable(&self, doc: &Document, node: NodeId) -> bool {
        !Self::is_outside_viewport(doc, node) && !self.is_element_hidden_by_css(doc, node)
    }

    fn is_element_hidden_by_css(&self, doc: &Document, node: NodeId) -> bool {
        let own = Self::style(doc, node);

        if own.display.as_deref() == Some("none") || doc.has_attr(node, "hidden") {
            return true;
        }
        if own.opacity.is_some_and(|o| o <= 0.0) {
            return true;
        }
        if own.clip_path.as_deref().is_some_and(clip_path_hides) {
            return true;
        }

        // visibility inherits: the nearest declaration wins
        let mut visibility = own.visibility;
        for ancestor in Self::ancestors(doc, node) {
            let style = Self::style(doc, ancestor);
            if style.display.as_deref() == Some("none") || doc.has_attr(ancestor, "hidden") {
                return true;
            }
            if visibility.is_none() {
                visibility = style.visibility;
            }
        }

        matches!(visibility.as_deref(), Some("hidden" | "collapse"))
    }
}
