//! Concrete cell styles and the conversion from loose wire properties.
//!
//! Wire `StyleProperties` are strings; grids store typed enums. Every provided
//! property becomes exactly one [`StyleProp`], and both style-apply paths go
//! through [`CellStyle::apply`], so they cannot disagree on the result.

use serde::{Deserialize, Serialize};
use sheetpilot_protocol::{BorderSpec, StyleProperties};

/// Horizontal alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
    General,
}

impl HAlign {
    /// Unrecognized values fall back to `Left`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" => HAlign::Center,
            "right" => HAlign::Right,
            "general" => HAlign::General,
            _ => HAlign::Left,
        }
    }
}

/// Vertical alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

impl VAlign {
    /// Unrecognized values fall back to `Top`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "middle" => VAlign::Center,
            "bottom" => VAlign::Bottom,
            _ => VAlign::Top,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineStyle {
    #[default]
    Thin,
    Medium,
    Thick,
    Double,
    Dotted,
    Dashed,
}

impl LineStyle {
    /// Unrecognized values fall back to `Thin`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => LineStyle::Medium,
            "thick" => LineStyle::Thick,
            "double" => LineStyle::Double,
            "dotted" => LineStyle::Dotted,
            "dashed" => LineStyle::Dashed,
            _ => LineStyle::Thin,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    Overline,
    LineThrough,
}

impl TextDecoration {
    /// Unrecognized values fall back to `None`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "underline" => TextDecoration::Underline,
            "overline" => TextDecoration::Overline,
            "linethrough" | "line-through" => TextDecoration::LineThrough,
            _ => TextDecoration::None,
        }
    }
}

/// A colored border line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBorder {
    pub color: String,
    pub style: LineStyle,
}

impl LineBorder {
    pub fn new(color: impl Into<String>, style: LineStyle) -> Self {
        Self { color: color.into(), style }
    }
}

impl From<&BorderSpec> for LineBorder {
    fn from(border: &BorderSpec) -> Self {
        LineBorder {
            color: border.color.clone(),
            style: border.style.as_deref().map(LineStyle::parse).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderSide {
    Left,
    Top,
    Right,
    Bottom,
}

impl BorderSide {
    pub const ALL: [BorderSide; 4] = [BorderSide::Left, BorderSide::Top, BorderSide::Right, BorderSide::Bottom];
}

/// One style setter call.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleProp {
    BackColor(String),
    ForeColor(String),
    Font(String),
    HAlign(HAlign),
    VAlign(VAlign),
    Border(BorderSide, LineBorder),
    TextDecoration(TextDecoration),
    WordWrap(bool),
    TextIndent(u32),
    Locked(bool),
    Hidden(bool),
    Formatter(String),
}

impl StyleProp {
    /// Expand wire properties into setter calls, skipping anything not provided.
    pub fn from_properties(props: &StyleProperties) -> Vec<StyleProp> {
        let mut out = Vec::new();

        if let Some(c) = &props.back_color {
            out.push(StyleProp::BackColor(c.clone()));
        }
        if let Some(c) = &props.fore_color {
            out.push(StyleProp::ForeColor(c.clone()));
        }
        if let Some(font) = compose_font(props) {
            out.push(StyleProp::Font(font));
        }
        if let Some(a) = &props.h_align {
            out.push(StyleProp::HAlign(HAlign::parse(a)));
        }
        if let Some(a) = &props.v_align {
            out.push(StyleProp::VAlign(VAlign::parse(a)));
        }

        let sides = [
            (BorderSide::Left, &props.border_left),
            (BorderSide::Top, &props.border_top),
            (BorderSide::Right, &props.border_right),
            (BorderSide::Bottom, &props.border_bottom),
        ];
        for (side, border) in sides {
            if let Some(border) = border.as_ref().or(props.border.as_ref()) {
                out.push(StyleProp::Border(side, LineBorder::from(border)));
            }
        }

        if let Some(d) = &props.text_decoration {
            out.push(StyleProp::TextDecoration(TextDecoration::parse(d)));
        }
        if let Some(w) = props.word_wrap {
            out.push(StyleProp::WordWrap(w));
        }
        if let Some(i) = props.text_indent {
            out.push(StyleProp::TextIndent(i));
        }
        if let Some(l) = props.locked {
            out.push(StyleProp::Locked(l));
        }
        if let Some(h) = props.hidden {
            out.push(StyleProp::Hidden(h));
        }
        if let Some(f) = &props.formatter {
            out.push(StyleProp::Formatter(f.clone()));
        }

        out
    }
}

/// Font shorthand: `font` wins, otherwise the parts are composed
/// as "style weight size family".
fn compose_font(props: &StyleProperties) -> Option<String> {
    if let Some(font) = &props.font {
        return Some(font.clone());
    }
    if props.font_family.is_none()
        && props.font_size.is_none()
        && props.font_weight.is_none()
        && props.font_style.is_none()
    {
        return None;
    }
    let parts = [
        props.font_style.as_deref(),
        props.font_weight.as_deref(),
        Some(props.font_size.as_deref().unwrap_or("11pt")),
        Some(props.font_family.as_deref().unwrap_or("Calibri")),
    ];
    Some(
        parts
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty() && *p != "normal")
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Style stored on a cell. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fore_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_align: Option<HAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_align: Option<VAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left: Option<LineBorder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top: Option<LineBorder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right: Option<LineBorder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<LineBorder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<TextDecoration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_indent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }

    /// A descriptor with exactly the given properties set.
    pub fn from_props(props: &[StyleProp]) -> Self {
        let mut style = CellStyle::default();
        for prop in props {
            style.apply(prop);
        }
        style
    }

    pub fn apply(&mut self, prop: &StyleProp) {
        match prop {
            StyleProp::BackColor(c) => self.back_color = Some(c.clone()),
            StyleProp::ForeColor(c) => self.fore_color = Some(c.clone()),
            StyleProp::Font(f) => self.font = Some(f.clone()),
            StyleProp::HAlign(a) => self.h_align = Some(*a),
            StyleProp::VAlign(a) => self.v_align = Some(*a),
            StyleProp::Border(side, border) => *self.border_mut(*side) = Some(border.clone()),
            StyleProp::TextDecoration(d) => self.text_decoration = Some(*d),
            StyleProp::WordWrap(w) => self.word_wrap = Some(*w),
            StyleProp::TextIndent(i) => self.text_indent = Some(*i),
            StyleProp::Locked(l) => self.locked = Some(*l),
            StyleProp::Hidden(h) => self.hidden = Some(*h),
            StyleProp::Formatter(f) => self.formatter = Some(f.clone()),
        }
    }

    /// Overlay every field `patch` sets onto this style.
    pub fn layer(&mut self, patch: &CellStyle) {
        fn over<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        over(&mut self.back_color, &patch.back_color);
        over(&mut self.fore_color, &patch.fore_color);
        over(&mut self.font, &patch.font);
        over(&mut self.h_align, &patch.h_align);
        over(&mut self.v_align, &patch.v_align);
        over(&mut self.border_left, &patch.border_left);
        over(&mut self.border_top, &patch.border_top);
        over(&mut self.border_right, &patch.border_right);
        over(&mut self.border_bottom, &patch.border_bottom);
        over(&mut self.text_decoration, &patch.text_decoration);
        over(&mut self.word_wrap, &patch.word_wrap);
        over(&mut self.text_indent, &patch.text_indent);
        over(&mut self.locked, &patch.locked);
        over(&mut self.hidden, &patch.hidden);
        over(&mut self.formatter, &patch.formatter);
    }

    fn border_mut(&mut self, side: BorderSide) -> &mut Option<LineBorder> {
        match side {
            BorderSide::Left => &mut self.border_left,
            BorderSide::Top => &mut self.border_top,
            BorderSide::Right => &mut self.border_right,
            BorderSide::Bottom => &mut self.border_bottom,
        }
    }
}
