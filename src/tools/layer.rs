//! Layer visibility tool.

use serde_json::{json, Value};

use super::{required_str, AnalysisContext, Tool, ToolError, ToolGroup, ToolOutput};

const VISIBILITY_ACTIONS: [&str; 3] = ["show", "hide", "toggle"];

/// Show, hide or toggle a layer by name.
pub struct ToggleLayerVisibility;

impl Tool for ToggleLayerVisibility {
    fn name(&self) -> &str {
        "toggle_layer_visibility"
    }

    fn description(&self) -> &str {
        "切换前端图层可见性（前端执行）。返回格式 \"action:layer_name\"。"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "layer_name": {
                    "type": "string",
                    "description": "图层名称（不是图层ID）"
                },
                "action": {
                    "type": "string",
                    "enum": VISIBILITY_ACTIONS,
                    "description": "show 显示, hide 隐藏, toggle 切换"
                }
            },
            "required": ["layer_name", "action"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::LayerAndQuery
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'打开@图层名称'或'隐藏@图层名称'或'切换@图层名称'时调用。".to_string(),
            "使用图层名称而非图层ID进行操作。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        let layer_name = required_str(args, "layer_name")?;
        let action = required_str(args, "action")?.to_ascii_lowercase();
        if !VISIBILITY_ACTIONS.contains(&action.as_str()) {
            return Err(ToolError::InvalidArguments(format!(
                "'action' must be one of show/hide/toggle, got '{}'",
                action
            )));
        }
        Ok(ToolOutput::Text(format!("{}:{}", action, layer_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_layer_formats_action_and_name() {
        let out = ToggleLayerVisibility
            .execute(
                &json!({"layer_name": "道路图层", "action": "show"}),
                &AnalysisContext::default(),
            )
            .expect("toggle");
        assert_eq!(out, ToolOutput::Text("show:道路图层".to_string()));
    }

    #[test]
    fn rejects_unknown_visibility_action() {
        let err = ToggleLayerVisibility
            .execute(
                &json!({"layer_name": "道路图层", "action": "delete"}),
                &AnalysisContext::default(),
            )
            .expect_err("invalid action");
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn requires_layer_name() {
        assert!(ToggleLayerVisibility
            .execute(&json!({"action": "hide"}), &AnalysisContext::default())
            .is_err());
    }
}
