use std::rc::Rc;

use autofill_engine::collect::collector::{CollectStrategy, PageCollector, CHECKED_SENTINEL};
use autofill_engine::collect::labels::{label_left, label_tag, label_top, normalize_text};
use autofill_engine::collect::visibility::{CssVisibility, VisibilityOracle};
use autofill_engine::dom::node::InlineStyle;
use autofill_engine::trace::logger::TraceLogger;
use serde_json::{json, Value};

mod common;
use crate::common::doubles::collector;
use crate::common::pages::{
    by_id, checkboxes, document, input, label, login_form, nested_shadow_field, text_inputs,
};

fn opids(details: &autofill_engine::collect::page_details::PageDetails) -> Vec<String> {
    details.fields.iter().map(|f| f.opid.clone()).collect()
}

// ============================================================================
// Identification
// ============================================================================

#[test]
fn collecting_unchanged_page_twice_assigns_identical_opids() {
    let mut doc = document(login_form());
    let collector = collector();

    let first = collector.collect(&mut doc);
    let second = collector.collect(&mut doc);

    assert_eq!(opids(&first), vec!["__0", "__1"]);
    assert_eq!(opids(&first), opids(&second));
    assert_eq!(first.forms.keys().collect::<Vec<_>>(), second.forms.keys().collect::<Vec<_>>());
    assert_eq!(first.structure_fingerprint(), second.structure_fingerprint());
}

#[test]
fn login_form_is_described() {
    let mut doc = document(login_form());
    let details = collector().collect(&mut doc);

    assert_eq!(details.title, "Sign in");
    assert_eq!(details.url, "https://example.com/login");

    let form = &details.forms["__form__0"];
    assert_eq!(form.html_action, "https://example.com/session");
    assert_eq!(form.html_method.as_deref(), Some("post"));
    assert_eq!(form.html_name.as_deref(), Some("signin"));
    assert_eq!(form.html_id.as_deref(), Some("login"));

    let username = details.field("__0").unwrap();
    assert_eq!(username.tag_name, "input");
    assert_eq!(username.field_type.as_deref(), Some("text"));
    assert_eq!(username.label_tag.as_deref(), Some("Username"));
    assert_eq!(username.form.as_deref(), Some("__form__0"));
    assert!(username.viewable);

    let password = details.field("__1").unwrap();
    assert_eq!(password.field_type.as_deref(), Some("password"));
    assert_eq!(password.label_tag.as_deref(), Some("Password"));
    assert_eq!(password.label_left.as_deref(), Some("Password"));
    assert_eq!(password.max_length, Some(999));
}

#[test]
fn missing_form_action_resolves_to_page_url() {
    let mut doc = document(json!([{ "tag": "form", "children": [input("q", "text")] }]));
    let details = collector().collect(&mut doc);

    assert_eq!(details.forms["__form__0"].html_action, "https://example.com/login");
}

#[test]
fn page_details_serialize_with_host_field_names() {
    let mut doc = document(login_form());
    let details = collector().collect(&mut doc);
    let value: Value = serde_json::from_str(&details.to_json().unwrap()).unwrap();

    assert!(value["documentUrl"].is_string());
    assert!(value["collectedTimestamp"].is_u64());
    assert_eq!(value["forms"]["__form__0"]["htmlID"], "login");
    assert_eq!(value["fields"][0]["label-tag"], "Username");
    assert_eq!(value["fields"][1]["type"], "password");
}

// ============================================================================
// Cap
// ============================================================================

#[test]
fn cap_prefers_non_checkbox_fields_and_backfills_checkboxes() {
    let checks = checkboxes(3);
    let texts = text_inputs(5);
    let body = json!([
        checks[0], texts[0], texts[1], checks[1], texts[2], texts[3], checks[2], texts[4]
    ]);
    let mut doc = document(body);
    let collector = PageCollector::new(Rc::new(CssVisibility)).with_max_fields(6);

    let details = collector.collect(&mut doc);

    assert_eq!(details.fields.len(), 6);
    let ids: Vec<&str> = details
        .fields
        .iter()
        .filter_map(|f| f.html_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["text0", "text1", "text2", "text3", "text4", "check0"]);

    // Dropped fields carry no opid.
    assert_eq!(doc.opid(by_id(&doc, "check1")), None);
    assert_eq!(doc.opid(by_id(&doc, "check2")), None);
    assert_eq!(doc.opid(by_id(&doc, "check0")), Some("__5"));
}

#[test]
fn cap_below_priority_count_drops_all_checkboxes() {
    let mut body = checkboxes(2);
    body.extend(text_inputs(4));
    let mut doc = document(Value::Array(body));
    let collector = PageCollector::new(Rc::new(CssVisibility)).with_max_fields(3);

    let details = collector.collect(&mut doc);

    let ids: Vec<&str> = details
        .fields
        .iter()
        .filter_map(|f| f.html_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["text0", "text1", "text2"]);
}

#[test]
fn default_cap_is_fifty() {
    let mut doc = document(Value::Array(text_inputs(60)));
    let details = collector().collect(&mut doc);

    assert_eq!(details.fields.len(), 50);
    assert_eq!(details.fields.last().unwrap().opid, "__49");
}

// ============================================================================
// Candidates
// ============================================================================

#[test]
fn excluded_inputs_and_opted_out_fields_are_not_collected() {
    let mut doc = document(json!([
        input("h", "hidden"),
        input("s", "submit"),
        input("r", "reset"),
        input("b", "button"),
        input("i", "image"),
        input("f", "file"),
        { "tag": "input", "attrs": { "type": "text", "id": "skip", "data-bwignore": "" } },
        { "tag": "textarea", "attrs": { "id": "notes" } },
        { "tag": "span", "attrs": { "id": "pseudo", "data-bwautofill": "" }, "children": ["1234"] },
        { "tag": "span", "attrs": { "id": "plain" } }
    ]));
    let details = collector().collect(&mut doc);

    let ids: Vec<&str> = details
        .fields
        .iter()
        .filter_map(|f| f.html_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["notes", "pseudo"]);

    let span = details.field("__1").unwrap();
    assert_eq!(span.tag_name, "span");
    assert_eq!(span.label_tag, None);
    assert_eq!(span.value, None);
}

#[test]
fn field_inside_submit_button_is_skipped_but_consumes_its_index() {
    let mut doc = document(json!([
        { "tag": "button", "attrs": { "type": "submit" }, "children": [input("nested", "text")] },
        input("outside", "text")
    ]));
    let details = collector().collect(&mut doc);

    assert_eq!(opids(&details), vec!["__1"]);
    assert_eq!(details.fields[0].html_id.as_deref(), Some("outside"));
}

#[test]
fn field_two_shadow_roots_deep_gets_an_opid() {
    let mut doc = document(nested_shadow_field());
    let collector = collector();

    let details = collector.collect(&mut doc);

    assert_eq!(opids(&details), vec!["__0"]);
    let deep = by_id(&doc, "deep");
    assert_eq!(doc.opid(deep), Some("__0"));
    assert_eq!(collector.field_element_by_opid(&doc, "__0"), Some(deep));
}

#[test]
fn selector_strategy_finds_the_same_login_fields() {
    let mut walked = document(login_form());
    let mut queried = document(login_form());

    let by_walk = collector().collect(&mut walked);
    let by_query = PageCollector::new(Rc::new(CssVisibility))
        .with_strategy(CollectStrategy::SelectorQuery)
        .collect(&mut queried);

    assert_eq!(by_walk.structure_fingerprint(), by_query.structure_fingerprint());
}

#[test]
fn collect_observed_watches_shadow_roots() {
    let mut doc = document(nested_shadow_field());
    let observer = doc.create_mutation_observer();

    collector().collect_observed(&mut doc, observer);

    assert_eq!(doc.observed_targets(observer).len(), 2);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn hidden_value_is_truncated_and_labels_suppressed() {
    let long_value = "x".repeat(1000);
    let mut doc = document(json!([
        label("token", "Secret token"),
        { "tag": "input", "attrs": { "type": "hidden", "id": "token", "value": long_value, "placeholder": "p" } }
    ]));
    let collector = collector();
    let token = by_id(&doc, "token");

    // Hidden inputs are never candidates; describe it directly.
    assert!(collector.collect(&mut doc).fields.is_empty());
    let field = collector.build_field(&mut doc, token, 0).unwrap();

    let value = field.value.unwrap();
    assert_eq!(value, format!("{}...SNIPPED", "x".repeat(254)));
    assert_eq!(field.label_tag, None);
    assert_eq!(field.label_left, None);
    assert_eq!(field.label_right, None);
    assert_eq!(field.label_top, None);
    assert_eq!(field.placeholder, None);
}

#[test]
fn checkbox_values_use_the_check_mark_sentinel() {
    let mut doc = document(json!([
        { "tag": "input", "attrs": { "type": "checkbox", "id": "on", "checked": "" } },
        input("off", "checkbox")
    ]));
    let details = collector().collect(&mut doc);

    assert_eq!(details.fields[0].value.as_deref(), Some(CHECKED_SENTINEL));
    assert!(details.fields[0].checked);
    assert_eq!(details.fields[1].value.as_deref(), Some(""));
}

#[test]
fn select_options_are_normalized() {
    let mut doc = document(json!([{
        "tag": "select",
        "attrs": { "id": "country" },
        "children": [
            { "tag": "option", "attrs": { "value": "us" }, "children": ["United States!"] },
            { "tag": "option", "attrs": { "value": "none" } }
        ]
    }]));
    let details = collector().collect(&mut doc);

    let options = &details.fields[0].select_info.as_ref().unwrap().options;
    assert_eq!(options[0], (Some("unitedstates".to_string()), "us".to_string()));
    assert_eq!(options[1], (None, "none".to_string()));
}

#[test]
fn autocomplete_off_is_suppressed() {
    let mut doc = document(json!([
        { "tag": "input", "attrs": { "type": "text", "autocomplete": "off" } },
        { "tag": "input", "attrs": { "type": "text", "autocomplete": "username" } },
        { "tag": "input", "attrs": { "type": "text", "x-autocompletetype": "email", "autocomplete": "off" } }
    ]));
    let details = collector().collect(&mut doc);

    let hints: Vec<Option<&str>> = details
        .fields
        .iter()
        .map(|f| f.auto_complete_type.as_deref())
        .collect();
    assert_eq!(hints, vec![None, Some("username"), Some("email")]);
}

#[test]
fn max_length_is_capped() {
    let mut doc = document(json!([
        { "tag": "input", "attrs": { "type": "text", "maxlength": "2000" } },
        { "tag": "input", "attrs": { "type": "text", "maxlength": "20" } },
        { "tag": "textarea" },
        { "tag": "select" }
    ]));
    let details = collector().collect(&mut doc);

    let lengths: Vec<Option<u32>> = details.fields.iter().map(|f| f.max_length).collect();
    assert_eq!(lengths, vec![Some(999), Some(20), Some(999), None]);
}

#[test]
fn aria_flags_are_true_only_for_literal_true() {
    let mut doc = document(json!([
        { "tag": "input", "attrs": { "type": "text", "aria-hidden": "true", "aria-disabled": "false" } }
    ]));
    let details = collector().collect(&mut doc);

    assert!(details.fields[0].aria_hidden);
    assert!(!details.fields[0].aria_disabled);
    assert!(!details.fields[0].aria_haspopup);
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn top_label_comes_from_previous_table_row() {
    let doc = document(json!([{
        "tag": "table",
        "children": [{
            "tag": "tbody",
            "children": [
                { "tag": "tr", "children": [
                    { "tag": "td", "children": ["Email"] },
                    { "tag": "td", "children": ["Password"] }
                ]},
                { "tag": "tr", "children": [
                    { "tag": "td", "children": [input("email", "email")] },
                    { "tag": "td", "children": [input("pw", "password")] }
                ]}
            ]
        }]
    }]));

    assert_eq!(label_top(&doc, by_id(&doc, "pw")).as_deref(), Some("Password"));
    assert_eq!(label_top(&doc, by_id(&doc, "email")).as_deref(), Some("Email"));
}

#[test]
fn definition_list_term_labels_field() {
    let doc = document(json!([{
        "tag": "dl",
        "children": [
            { "tag": "dt", "children": ["Account  number"] },
            { "tag": "dd", "children": [{ "tag": "input", "attrs": { "type": "text" } }] }
        ]
    }]));
    let field = doc
        .descendants(doc.body())
        .into_iter()
        .find(|n| doc.is_tag(*n, "input"))
        .unwrap();

    assert_eq!(label_tag(&doc, field), "Account number");
}

#[test]
fn enclosing_label_and_left_text_are_found() {
    let doc = document(json!([
        { "tag": "label", "children": ["Remember me", input("remember", "checkbox")] },
        { "tag": "div", "children": [
            { "tag": "span", "children": ["Code:"] },
            input("code", "text")
        ]}
    ]));

    assert_eq!(label_tag(&doc, by_id(&doc, "remember")), "Remember me");
    assert_eq!(label_left(&doc, by_id(&doc, "code")), "Code:");
}

#[test]
fn label_text_drops_non_printable_characters() {
    assert_eq!(normalize_text("  User\u{00a0}name\t\n "), "User name");
}

// ============================================================================
// Visibility and tracing
// ============================================================================

#[test]
fn css_hidden_and_zero_size_fields_are_not_viewable() {
    let mut doc = document(json!([
        { "tag": "div", "attrs": { "style": "display: none" }, "children": [input("gone", "text")] },
        { "tag": "input", "attrs": { "type": "text", "id": "tiny" }, "rect": { "x": 0.0, "y": 0.0, "width": 0.0, "height": 0.0 } },
        { "tag": "input", "attrs": { "type": "text", "id": "clear", "style": "opacity: 0" } },
        input("shown", "text")
    ]));
    let details = collector().collect(&mut doc);

    let viewable: Vec<bool> = details.fields.iter().map(|f| f.viewable).collect();
    assert_eq!(viewable, vec![false, false, false, true]);
    assert!(CssVisibility.is_element_hidden_by_css(&doc, by_id(&doc, "gone")));
    assert!(!CssVisibility.is_element_hidden_by_css(&doc, by_id(&doc, "tiny")));
}

#[test]
fn inline_style_reads_declarations_through_css_tokens() {
    let style = InlineStyle::parse(
        "color: red; DISPLAY : None !important;; clip-path: inset(0 0 0 0); opacity: .5; visibility",
    );

    assert_eq!(style.display.as_deref(), Some("none"));
    assert_eq!(style.clip_path.as_deref(), Some("inset(0 0 0 0)"));
    assert_eq!(style.opacity, Some(0.5));
    assert_eq!(style.visibility, None);
    assert_eq!(InlineStyle::parse(""), InlineStyle::default());
}

#[test]
fn collection_pass_is_traced() {
    let tracer = Rc::new(TraceLogger::in_memory());
    let collector = PageCollector::new(Rc::new(CssVisibility)).with_tracer(Rc::clone(&tracer));
    let mut doc = document(login_form());

    let details = collector.collect(&mut doc);

    let events = tracer.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stage, "collect");
    assert_eq!(events[0].count, Some(2));
    assert_eq!(events[0].detail.as_deref(), Some(details.structure_fingerprint().as_str()));
}

#[test]
fn positional_fallback_resolves_field_without_opid() {
    let mut doc = document(login_form());
    let collector = collector();
    collector.collect(&mut doc);

    let password = by_id(&doc, "password");
    doc.set_opid(password, None);

    assert_eq!(collector.field_element_by_opid(&doc, "__1"), Some(password));
    assert_eq!(collector.field_element_by_opid(&doc, "__7"), None);
    assert_eq!(collector.field_element_by_opid(&doc, "garbage"), None);
}
