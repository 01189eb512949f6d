//! Save-as-layer and export-as-GeoJSON tools, one pair per analysis family.

use serde_json::{json, Value};

use super::naming::AnalysisKind;
use super::{optional_str, AnalysisContext, Tool, ToolError, ToolGroup, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTarget {
    /// Add the result features as a new map layer.
    Layer,
    /// Download the result features as a `.json` GeoJSON file.
    GeoJson,
}

impl ResultTarget {
    fn verb(self) -> &'static str {
        match self {
            ResultTarget::Layer => "save_layer",
            ResultTarget::GeoJson => "export_json",
        }
    }

    fn argument(self) -> &'static str {
        match self {
            ResultTarget::Layer => "layer_name",
            ResultTarget::GeoJson => "file_name",
        }
    }
}

/// Hands the latest result of one analysis family to the frontend for
/// saving or exporting.
pub struct ResultTool {
    kind: AnalysisKind,
    target: ResultTarget,
    name: String,
    description: String,
}

/// Registered name of the save/export tool for one analysis family.
pub fn result_tool_name(kind: AnalysisKind, target: ResultTarget) -> String {
    match target {
        ResultTarget::Layer => format!("save_{}_results_as_layer", kind.slug()),
        ResultTarget::GeoJson => format!("export_{}_results_as_json", kind.slug()),
    }
}

impl ResultTool {
    pub fn new(kind: AnalysisKind, target: ResultTarget) -> Self {
        let name = result_tool_name(kind, target);
        let description = match target {
            ResultTarget::Layer => format!(
                "保存{}结果为图层（前端执行）。返回 {{ action: '{}.save_layer', params: {{ layer_name }} }}。",
                kind.label(),
                kind.slug()
            ),
            ResultTarget::GeoJson => format!(
                "导出{}结果为GeoJSON文件（前端执行）。返回 {{ action: '{}.export_json', params: {{ file_name }} }}。",
                kind.label(),
                kind.slug()
            ),
        };
        Self {
            kind,
            target,
            name,
            description,
        }
    }

    pub fn action(&self) -> String {
        format!("{}.{}", self.kind.slug(), self.target.verb())
    }
}

impl Tool for ResultTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let description = match self.target {
            ResultTarget::Layer => "新图层名称（可选，未指定时自动生成默认名称）",
            ResultTarget::GeoJson => "文件名，不包含扩展名（可选，未指定时自动生成默认名称）",
        };
        json!({
            "type": "object",
            "properties": {
                self.target.argument(): { "type": "string", "description": description }
            },
            "required": []
        })
    }

    fn group(&self) -> ToolGroup {
        match (self.target, self.kind) {
            (ResultTarget::Layer, _) => ToolGroup::SaveAsLayer,
            (ResultTarget::GeoJson, AnalysisKind::Query) => ToolGroup::LayerAndQuery,
            (ResultTarget::GeoJson, _) => ToolGroup::Analysis,
        }
    }

    fn usage(&self) -> Vec<String> {
        let label = self.kind.label();
        let short = self.kind.short_label();
        match (self.target, self.kind) {
            (ResultTarget::Layer, AnalysisKind::Query) => vec![
                "当用户说'保存查询结果为图层'、'另存为图层'、'保存为新图层'时调用。".to_string(),
                "图层名称可选：未指定时系统自动生成默认名称。".to_string(),
            ],
            (ResultTarget::Layer, kind) => vec![
                format!("当用户说'保存{label}结果为图层'、'另存{short}结果为图层'时调用。"),
                format!(
                    "重要：只有在执行了{label}({})后，用户要求保存结果时才调用此工具。",
                    kind.producing_tool()
                ),
                "图层名称可选：未指定时系统自动生成默认名称。".to_string(),
            ],
            (ResultTarget::GeoJson, AnalysisKind::Query) => vec![
                "当用户说'导出为JSON'、'导出为GeoJSON'、'导出查询结果'时调用。".to_string(),
                "文件名不包含扩展名，未指定时系统自动生成默认名称。".to_string(),
            ],
            (ResultTarget::GeoJson, _) => vec![
                format!("当用户说'导出{label}结果为JSON'、'导出{short}结果为GeoJSON'时调用。"),
                "文件名不包含扩展名，未指定时系统自动生成默认名称。".to_string(),
            ],
        }
    }

    fn execute(&self, args: &Value, context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        if !args.is_null() && !args.is_object() {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".to_string(),
            ));
        }
        let argument = self.target.argument();
        let name = optional_str(args, argument)
            .map(str::to_string)
            .unwrap_or_else(|| context.default_name(self.kind));

        let mut params = serde_json::Map::new();
        params.insert(argument.to_string(), Value::String(name));
        ToolOutput::action(&self.action(), params)
    }
}
