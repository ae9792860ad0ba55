use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A content model definition as the store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Field shown as the entry title in the editor.
    #[serde(default)]
    pub display_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// One field of a [`ContentTypeDef`].
///
/// `items` and `validations` are kept as raw JSON; they are passed through,
/// never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub id: String,
    pub name: String,
    /// `Symbol`, `Text`, `RichText`, `Link`, `Array`, ...
    #[serde(rename = "type")]
    pub field_type: String,
    /// `Entry` or `Asset` for `Link` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    /// Element type of `Array` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub omitted: bool,
    #[serde(default)]
    pub validations: Vec<Value>,
}
