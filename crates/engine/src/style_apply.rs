//! Style apply sub-engine.
//!
//! Two mechanisms, one result:
//! - `style_object` builds a single descriptor and layers it onto every cell,
//!   row-major.
//! - `direct_method` resolves the range once and issues one setter call per
//!   property.
//!
//! Failures never escape; they come back as `success: false`.

use serde::{Deserialize, Serialize};
use sheetpilot_protocol::{CommandRange, StyleCommand, StyleMethod, StyleProperties};

use crate::grid::{Grid, GridError};
use crate::style::{CellStyle, StyleProp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleApplyResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_method: Option<StyleMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_range: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn apply_style(grid: &mut dyn Grid, sheet: usize, range: &CommandRange, command: &StyleCommand) -> StyleApplyResult {
    let area = range.area();
    let props = StyleProp::from_properties(&command.properties);

    let outcome = match command.method {
        StyleMethod::StyleObject => apply_style_object(grid, sheet, range, &props),
        StyleMethod::DirectMethod => props.iter().try_for_each(|p| grid.set_range_property(sheet, area, p)),
    };

    match outcome {
        Ok(()) => StyleApplyResult {
            success: true,
            message: format!("applied {} style properties to {}", props.len(), area),
            applied_method: Some(command.method),
            applied_range: Some(area.to_string()),
            applied_properties: property_names(&command.properties),
            error: None,
        },
        Err(e) => {
            log::warn!("style apply ({}) failed on {}: {}", command.method.as_str(), area, e);
            StyleApplyResult {
                success: false,
                message: format!("failed to apply style to {area}"),
                applied_method: None,
                applied_range: None,
                applied_properties: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

fn apply_style_object(grid: &mut dyn Grid, sheet: usize, range: &CommandRange, props: &[StyleProp]) -> Result<(), GridError> {
    let descriptor = CellStyle::from_props(props);
    let area = range.area();
    let extents = grid.extents(sheet)?;
    if !extents.contains(&area) {
        return Err(GridError::OutOfBounds {
            row: area.end_row(),
            col: area.end_col(),
            rows: extents.rows,
            cols: extents.cols,
        });
    }
    for pos in area.cells() {
        let mut style = grid.style(sheet, pos.row, pos.col)?;
        style.layer(&descriptor);
        grid.set_style(sheet, pos.row, pos.col, style)?;
    }
    Ok(())
}

/// Wire names of the properties that were provided, e.g. `["backColor", "hAlign"]`.
fn property_names(props: &StyleProperties) -> Vec<String> {
    match serde_json::to_value(props) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
