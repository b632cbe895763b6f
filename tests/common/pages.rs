use autofill_engine::dom::document::Document;
use autofill_engine::dom::node::NodeId;
use autofill_engine::dom::snapshot::DomSnapshot;
use autofill_engine::query::deep_query::DomQueryService;
use serde_json::{json, Value};

pub const LOGIN_URL: &str = "https://example.com/login";

/// Builds a live document from a full snapshot description.
pub fn snapshot(value: Value) -> Document {
    DomSnapshot::from_value(value)
        .expect("snapshot should parse")
        .build()
        .expect("snapshot should build")
}

/// Document at `LOGIN_URL` whose body holds `body`.
pub fn document(body: Value) -> Document {
    snapshot(json!({ "url": LOGIN_URL, "title": "Sign in", "body": body }))
}

/// Element with the given id, searching shadow trees too.
pub fn by_id(doc: &Document, id: &str) -> NodeId {
    DomQueryService::new()
        .deep_query_str(doc, doc.root(), &format!("#{}", id))
        .expect("id selector should parse")
        .first()
        .copied()
        .unwrap_or_else(|| panic!("no element with id {}", id))
}

pub fn input(id: &str, input_type: &str) -> Value {
    json!({ "tag": "input", "attrs": { "type": input_type, "id": id, "name": id } })
}

pub fn label(for_id: &str, text: &str) -> Value {
    json!({ "tag": "label", "attrs": { "for": for_id }, "children": [text] })
}

/// One form: username, password and a "Log in" submit button.
pub fn login_form() -> Value {
    json!([{
        "tag": "form",
        "attrs": { "id": "login", "action": "/session", "method": "post", "name": "signin" },
        "children": [
            label("username", "Username"),
            input("username", "text"),
            label("password", "Password"),
            input("password", "password"),
            { "tag": "button", "attrs": { "type": "submit", "id": "submit" }, "children": ["Log in"] }
        ]
    }])
}

/// No form: a password step with a "Continue" button next to it.
pub fn formless_password_step() -> Value {
    json!([{
        "tag": "div",
        "attrs": { "class": "step" },
        "children": [
            {
                "tag": "div",
                "children": [label("password", "Password"), input("password", "password")]
            },
            { "tag": "button", "attrs": { "id": "continue" }, "children": ["Continue"] }
        ]
    }])
}

/// A text input nested two shadow roots deep.
pub fn nested_shadow_field() -> Value {
    json!([{
        "tag": "outer-widget",
        "attrs": { "id": "outer" },
        "shadow": {
            "mode": "open",
            "children": [{
                "tag": "inner-widget",
                "attrs": { "id": "inner" },
                "shadow": {
                    "mode": "closed",
                    "children": [input("deep", "email")]
                }
            }]
        }
    }])
}

pub fn text_inputs(count: usize) -> Vec<Value> {
    (0..count).map(|i| input(&format!("text{}", i), "text")).collect()
}

pub fn checkboxes(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| input(&format!("check{}", i), "checkbox"))
        .collect()
}
