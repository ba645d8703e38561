//! Abstract style payloads carried by `apply_style` commands and style deltas.
//!
//! These are the loose, string-typed shapes the AI backend and the sync server
//! emit. Conversion to concrete grid styles lives in the engine crate.

use serde::{Deserialize, Serialize};

/// How a style command is applied to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleMethod {
    /// Build one style descriptor and assign it to every cell in range.
    #[default]
    StyleObject,
    /// Resolve the range once and call one setter per property.
    DirectMethod,
}

impl StyleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleMethod::StyleObject => "style_object",
            StyleMethod::DirectMethod => "direct_method",
        }
    }
}

/// Style command payload (`detailedCommand` of an `apply_style` command).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleCommand {
    #[serde(default)]
    pub method: StyleMethod,
    #[serde(default)]
    pub properties: StyleProperties,
}

/// One border side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderSpec {
    #[serde(default = "default_border_color")]
    pub color: String,
    /// thin | medium | thick | double | dotted | dashed
    #[serde(default)]
    pub style: Option<String>,
}

fn default_border_color() -> String {
    "#000000".to_string()
}

/// Property bag. Every field is optional; only provided fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fore_color: Option<String>,

    /// CSS-like shorthand, e.g. "bold 12pt Arial".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,

    /// left | center | right | general
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_align: Option<String>,
    /// top | center | bottom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_align: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left: Option<BorderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top: Option<BorderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right: Option<BorderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<BorderSpec>,
    /// Shorthand for all four sides; individual sides win when both are set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderSpec>,

    /// none | underline | overline | lineThrough
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_indent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    /// Number format string, e.g. "0.00" or "#,##0".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
}

impl StyleProperties {
    pub fn is_empty(&self) -> bool {
        *self == StyleProperties::default()
    }
}
