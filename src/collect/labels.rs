use std::sync::OnceLock;

use regex::Regex;

use crate::dom::document::Document;
use crate::dom::node::NodeId;

/// Tags that end a positional label scan.
const SECTION_TAGS: &[&str] = &[
    "html", "body", "button", "form", "head", "iframe", "input", "option", "script", "select",
    "table", "textarea",
];

const LABELABLE_TAGS: &[&str] = &[
    "input", "select", "textarea", "button", "meter", "output", "progress",
];

fn non_printable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x20-\x7E]+|\s+").expect("non-printable regex must compile"))
}

/// Replaces runs of non-printable characters and runs of whitespace with a
/// single space, then trims.
pub fn normalize_text(text: &str) -> String {
    non_printable_re().replace_all(text, " ").trim().to_string()
}

/// Normalized text of a text node, or of an element's descendants.
pub fn node_text(doc: &Document, node: NodeId) -> String {
    match doc.text(node) {
        Some(text) => normalize_text(text),
        None => normalize_text(&doc.text_content(node)),
    }
}

fn is_new_section(doc: &Document, node: Option<NodeId>) -> bool {
    match node {
        None => true,
        Some(n) => doc.tag(n).is_some_and(|t| SECTION_TAGS.contains(&t)),
    }
}

// ============================================================================
// label-tag
// ============================================================================

fn is_labelable(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("input") => doc.type_property(node).as_deref() != Some("hidden"),
        Some(tag) => LABELABLE_TAGS.contains(&tag),
        None => false,
    }
}

/// Labels associated with `field` the way `element.labels` reports them:
/// `for` references resolved in the field's tree, plus an enclosing label
/// whose first labelable descendant is the field. Tree order.
pub fn native_labels(doc: &Document, field: NodeId) -> Vec<NodeId> {
    if !is_labelable(doc, field) {
        return Vec::new();
    }
    let root = doc.root_node(field);
    doc.descendants(root)
        .into_iter()
        .filter(|label| doc.is_tag(*label, "label"))
        .filter(|label| match doc.attr(*label, "for") {
            Some(target) => doc.element_by_id_in(root, target) == Some(field),
            None => {
                doc.contains(*label, field)
                    && doc
                        .descendants(*label)
                        .into_iter()
                        .find(|n| is_labelable(doc, *n))
                        == Some(field)
            }
        })
        .collect()
}

fn push_unique(labels: &mut Vec<NodeId>, label: NodeId) {
    if !labels.contains(&label) {
        labels.push(label);
    }
}

/// Concatenated text of every label associated with the field.
pub fn label_tag(doc: &Document, field: NodeId) -> String {
    let mut labels = native_labels(doc, field);
    if labels.is_empty() {
        labels = fallback_labels(doc, field);
    }

    labels
        .into_iter()
        .map(|label| normalize_text(&doc.text_content(label)))
        .collect::<Vec<_>>()
        .join("")
}

fn fallback_labels(doc: &Document, field: NodeId) -> Vec<NodeId> {
    let mut labels = Vec::new();

    let id = doc.attr(field, "id").filter(|v| !v.is_empty());
    let name = doc.attr(field, "name").filter(|v| !v.is_empty());
    if id.is_some() || name.is_some() {
        let root = doc.root_node(field);
        for label in doc.descendants(root) {
            if !doc.is_tag(label, "label") {
                continue;
            }
            let target = doc.attr(label, "for");
            if target.is_some() && (target == id || target == name) {
                push_unique(&mut labels, label);
            }
        }
    }

    let mut current = Some(field);
    while let Some(node) = current {
        if node == doc.document_element() {
            break;
        }
        if doc.is_tag(node, "label") {
            push_unique(&mut labels, node);
        }
        current = doc
            .parent_element(node)
            .and_then(|p| doc.closest(p, "label"));
    }

    if labels.is_empty() {
        let term = doc
            .parent_element(field)
            .filter(|p| doc.is_tag(*p, "dd"))
            .and_then(|dd| doc.previous_element_sibling(dd))
            .filter(|dt| doc.is_tag(*dt, "dt"));
        if let Some(dt) = term {
            labels.push(dt);
        }
    }

    labels
}

// ============================================================================
// Positional labels
// ============================================================================

fn table_cells(doc: &Document, row: NodeId) -> Vec<NodeId> {
    doc.element_children(row)
        .into_iter()
        .filter(|c| doc.is_tag(*c, "td") || doc.is_tag(*c, "th"))
        .collect()
}

/// Text of the same-column cell in the previous table row.
pub fn label_top(doc: &Document, field: NodeId) -> Option<String> {
    let cell = doc.closest(field, "td")?;
    let row = doc.parent_element(cell).filter(|r| doc.is_tag(*r, "tr"));
    let cell_index = row.and_then(|r| table_cells(doc, r).iter().position(|c| *c == cell));

    let previous_row = doc
        .closest(cell, "tr")
        .and_then(|tr| doc.previous_element_sibling(tr))
        .filter(|tr| doc.is_tag(*tr, "tr"))?;

    let cells = table_cells(doc, previous_row);
    let index = cell_index?;
    cells.get(index).map(|c| node_text(doc, *c))
}

/// Text of the following siblings up to the next section element.
pub fn label_right(doc: &Document, field: NodeId) -> String {
    let mut parts = Vec::new();
    let mut current = field;
    while let Some(next) = doc.next_sibling(current) {
        current = next;
        if is_new_section(doc, Some(current)) {
            break;
        }
        let text = node_text(doc, current);
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("")
}

/// Text preceding the field, read backward through siblings and, when
/// those are exhausted without a hit, through the parent's previous sibling.
pub fn label_left(doc: &Document, field: NodeId) -> String {
    let mut parts = previous_sibling_texts(doc, field);
    parts.reverse();
    parts.join("")
}

fn previous_sibling_texts(doc: &Document, node: NodeId) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = node;
    while let Some(previous) = doc.previous_sibling(current) {
        current = previous;
        if is_new_section(doc, Some(current)) {
            return parts;
        }
        let text = node_text(doc, current);
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if !parts.is_empty() {
        return parts;
    }

    let Some(parent) = doc.parent(current) else {
        return parts;
    };

    let mut sibling = if doc.is_element(parent) {
        doc.previous_element_sibling(parent)
    } else {
        doc.previous_sibling(parent)
    };
    while let Some(s) = sibling {
        match doc.last_child(s) {
            Some(last) if !is_new_section(doc, Some(s)) => sibling = Some(last),
            _ => break,
        }
    }

    let Some(sibling) = sibling.filter(|s| !is_new_section(doc, Some(*s))) else {
        return parts;
    };

    let text = node_text(doc, sibling);
    if !text.is_empty() {
        parts.push(text);
        return parts;
    }

    previous_sibling_texts(doc, sibling)
}
