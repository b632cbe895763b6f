use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Everything one collection pass learned about the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetails {
    pub title: String,
    pub url: String,
    pub document_url: String,
    /// Keyed by form opid.
    pub forms: BTreeMap<String, FormDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub collected_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    /// `__form__<index>`
    pub opid: String,
    /// Absolute form action, resolved against the page URL.
    pub html_action: String,
    pub html_name: Option<String>,
    #[serde(rename = "htmlID")]
    pub html_id: Option<String>,
    pub html_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// `__<index>`
    pub opid: String,
    pub element_number: usize,
    pub tag_name: String,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub value: Option<String>,
    pub viewable: bool,
    pub max_length: Option<u32>,
    pub disabled: bool,
    pub readonly: bool,
    pub checked: bool,

    #[serde(rename = "htmlID")]
    pub html_id: Option<String>,
    pub html_name: Option<String>,
    pub html_class: Option<String>,
    pub tabindex: Option<String>,
    pub title: Option<String>,

    #[serde(rename = "label-tag")]
    pub label_tag: Option<String>,
    #[serde(rename = "label-data")]
    pub label_data: Option<String>,
    #[serde(rename = "label-aria")]
    pub label_aria: Option<String>,
    #[serde(rename = "label-top")]
    pub label_top: Option<String>,
    #[serde(rename = "label-left")]
    pub label_left: Option<String>,
    #[serde(rename = "label-right")]
    pub label_right: Option<String>,
    pub placeholder: Option<String>,

    pub auto_complete_type: Option<String>,
    pub rel: Option<String>,
    #[serde(rename = "aria-hidden")]
    pub aria_hidden: bool,
    #[serde(rename = "aria-disabled")]
    pub aria_disabled: bool,
    #[serde(rename = "aria-haspopup")]
    pub aria_haspopup: bool,
    #[serde(rename = "data-stripe")]
    pub data_stripe: Option<String>,

    pub select_info: Option<SelectInfo>,
    /// Opid of the owning form.
    pub form: Option<String>,
}

/// Normalized `(text, value)` pairs of a select's options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectInfo {
    pub options: Vec<(Option<String>, String)>,
}

impl PageDetails {
    pub fn field(&self, opid: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.opid == opid)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::JsonSerialize {
            context: "PageDetails".into(),
            source: e,
        })
    }

    /// SHA-1 over the ordered field identities. Two passes over an unchanged
    /// DOM produce the same fingerprint.
    pub fn structure_fingerprint(&self) -> String {
        use sha1::{Digest, Sha1};

        let mut hasher = Sha1::new();
        for form in self.forms.values() {
            hasher.update(form.opid.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(form.html_action.as_bytes());
            hasher.update(b"\x1e");
        }
        for field in &self.fields {
            hasher.update(field.opid.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(field.tag_name.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(field.field_type.as_deref().unwrap_or("").as_bytes());
            hasher.update(b"\x1f");
            hasher.update(field.form.as_deref().unwrap_or("").as_bytes());
            hasher.update(b"\x1e");
        }
        format!("{:x}", hasher.finalize())
    }
}
