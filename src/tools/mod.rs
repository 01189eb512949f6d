//! Map-operation tools the model may call.
//!
//! Every tool is a pure formatter: it validates its arguments and packages an
//! instruction for the frontend map renderer, which performs the actual layer
//! or analysis operation. Nothing here touches geometry.

mod analysis;
mod layer;
pub mod naming;
mod query;
mod results;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSchema;

pub use analysis::{BufferAnalysis, EraseAnalysis, IntersectionAnalysis, ShortestPathAnalysis};
pub use layer::ToggleLayerVisibility;
pub use naming::{AnalysisContext, AnalysisKind, QueryParams};
pub use query::QueryFeaturesByAttribute;
pub use results::{result_tool_name, ResultTarget, ResultTool};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("未知工具: {0}")]
    UnknownTool(String),

    #[error("工具参数错误: {0}")]
    InvalidArguments(String),

    #[error("failed to encode tool output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What a tool hands back for the frontend.
///
/// Older tools answer with a colon-delimited string; newer ones with a
/// structured action. An attribute query keeps its typed parameters and goes
/// on the wire in the string form. All variants serialize untagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Query(QueryParams),
    Action { action: String, params: Value },
}

/// Params keys that name the thing an action applies to, in priority order.
const SUBJECT_KEYS: [&str; 4] = [
    "layer_name",
    "target_layer_name",
    "start_layer_name",
    "file_name",
];

impl ToolOutput {
    pub fn action(action: &str, params: impl Serialize) -> Result<Self, ToolError> {
        Ok(ToolOutput::Action {
            action: action.to_string(),
            params: serde_json::to_value(params)?,
        })
    }

    /// The single-line form recorded in conversation history.
    pub fn history_entry(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Query(query) => query.to_instruction(),
            ToolOutput::Action { action, params } => SUBJECT_KEYS
                .iter()
                .find_map(|key| params.get(*key).and_then(|v| v.as_str()))
                .map(|subject| format!("{}:{}", action, subject))
                .unwrap_or_else(|| action.clone()),
        }
    }
}

impl fmt::Display for ToolOutput {
    /// Content of the tool message replayed to the model.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutput::Text(text) => f.write_str(text),
            ToolOutput::Query(query) => f.write_str(&query.to_instruction()),
            ToolOutput::Action { action, params } => write!(
                f,
                "{}",
                serde_json::json!({ "action": action, "params": params })
            ),
        }
    }
}

/// Section of the prompt catalog a tool is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolGroup {
    LayerAndQuery,
    Analysis,
    SaveAsLayer,
}

impl ToolGroup {
    pub const ORDER: [ToolGroup; 3] = [
        ToolGroup::LayerAndQuery,
        ToolGroup::Analysis,
        ToolGroup::SaveAsLayer,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            ToolGroup::LayerAndQuery => "图层显示与查询",
            ToolGroup::Analysis => "空间分析",
            ToolGroup::SaveAsLayer => "保存为图层",
        }
    }
}

pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments (`{"type":"object", ...}`).
    fn parameters_schema(&self) -> Value;

    fn group(&self) -> ToolGroup;

    /// Trigger phrases and usage notes for the prompt catalog, one per line.
    fn usage(&self) -> Vec<String>;

    /// Run the tool. Must be pure: same arguments and context, same output.
    fn execute(&self, args: &Value, context: &AnalysisContext) -> Result<ToolOutput, ToolError>;
}

/// Fixed set of tools available to the model, in catalog order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Registry with every built-in map tool.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(ToggleLayerVisibility));
        registry.register(Arc::new(QueryFeaturesByAttribute));
        registry.register(Arc::new(ResultTool::new(AnalysisKind::Query, ResultTarget::GeoJson)));

        registry.register(Arc::new(BufferAnalysis));
        registry.register(Arc::new(IntersectionAnalysis));
        registry.register(Arc::new(EraseAnalysis));
        registry.register(Arc::new(ShortestPathAnalysis));

        for kind in AnalysisKind::ALL {
            registry.register(Arc::new(ResultTool::new(kind, ResultTarget::Layer)));
            if kind != AnalysisKind::Query {
                registry.register(Arc::new(ResultTool::new(kind, ResultTarget::GeoJson)));
            }
        }

        registry
    }

    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a tool, replacing any tool with the same name in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn list_tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function declarations to bind on a model call.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema::function(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Execute the named tool.
    pub fn dispatch(
        &self,
        name: &str,
        args: &Value,
        context: &AnalysisContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args, context)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Argument helpers shared by the tool implementations.

fn ensure_object(args: &Value) -> Result<&serde_json::Map<String, Value>, ToolError> {
    args.as_object()
        .ok_or_else(|| ToolError::InvalidArguments("arguments must be a JSON object".to_string()))
}

/// Non-blank string argument, trimmed.
fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    ensure_object(args)?;
    optional_str(args, key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{}' argument", key)))
}

/// Numeric argument; numeric strings are accepted since models often quote numbers.
fn optional_number(args: &Value, key: &str) -> Result<Option<f64>, ToolError> {
    let Some(value) = args.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(ToolError::InvalidArguments(format!(
            "'{}' must be a number, got {}",
            key, value
        ))),
    }
}

fn required_number(args: &Value, key: &str) -> Result<f64, ToolError> {
    ensure_object(args)?;
    optional_number(args, key)?
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{}' argument", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_has_sixteen_unique_tools() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 16);

        let schemas = registry.get_tool_schemas();
        let mut names: Vec<&str> = schemas.iter().map(|s| s.function.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 16);

        for name in [
            "toggle_layer_visibility",
            "query_features_by_attribute",
            "save_query_results_as_layer",
            "export_query_results_as_json",
            "execute_buffer_analysis",
            "execute_intersection_analysis",
            "execute_erase_analysis",
            "execute_shortest_path_analysis",
            "save_buffer_results_as_layer",
            "export_buffer_results_as_json",
            "save_intersection_results_as_layer",
            "export_intersection_results_as_json",
            "save_erase_results_as_layer",
            "export_erase_results_as_json",
            "save_path_results_as_layer",
            "export_path_results_as_json",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn dispatch_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch("delete_everything", &json!({}), &AnalysisContext::default())
            .expect_err("unknown tool");
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "delete_everything"));
        assert_eq!(err.to_string(), "未知工具: delete_everything");
    }

    fn sample_args(name: &str) -> Value {
        match name {
            "toggle_layer_visibility" => json!({"layer_name": "道路图层", "action": "show"}),
            "query_features_by_attribute" => {
                json!({"layer_name": "学校", "field": "NAME", "operator": "=", "value": "一中"})
            }
            "execute_buffer_analysis" => json!({"layer_name": "roads", "radius": 50}),
            "execute_intersection_analysis" => json!({"target_layer_name": "a", "mask_layer_name": "b"}),
            "execute_erase_analysis" => json!({"target_layer_name": "a", "erase_layer_name": "b"}),
            "execute_shortest_path_analysis" => json!({"start_layer_name": "a", "end_layer_name": "b"}),
            name if name.starts_with("export_") => json!({"file_name": "route"}),
            _ => json!({}),
        }
    }

    #[test]
    fn dispatch_is_pure() {
        let registry = ToolRegistry::new();

        // Save/export tools read the context, so check against a populated one too.
        let mut populated = AnalysisContext::default();
        for kind in AnalysisKind::ALL {
            let tool = kind.producing_tool();
            let output = registry
                .dispatch(tool, &sample_args(tool), &AnalysisContext::default())
                .expect(tool);
            populated.observe(&output);
        }
        assert!(populated.query.is_some() && populated.shortest_path.is_some());

        for ctx in [AnalysisContext::default(), populated] {
            let mut checked = 0;
            for tool in registry.list_tools() {
                let name = tool.name();
                let args = sample_args(name);
                let first = registry.dispatch(name, &args, &ctx).expect(name);
                let second = registry.dispatch(name, &args, &ctx).expect(name);
                assert_eq!(first, second, "{name} is not deterministic");
                checked += 1;
            }
            assert_eq!(checked, 16);
        }
    }

    #[test]
    fn register_replaces_same_name_in_place() {
        let mut registry = ToolRegistry::new();
        let before: Vec<String> = registry.list_tools().iter().map(|t| t.name().to_string()).collect();
        registry.register(Arc::new(ToggleLayerVisibility));
        let after: Vec<String> = registry.list_tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn history_entry_forms() {
        assert_eq!(
            ToolOutput::Text("show:道路图层".to_string()).history_entry(),
            "show:道路图层"
        );
        let buffer = ToolOutput::action(
            "buffer_analysis",
            json!({"layer_name": "roads", "radius": 50}),
        )
        .expect("encode");
        assert_eq!(buffer.history_entry(), "buffer_analysis:roads");

        let export = ToolOutput::action("path.export_json", json!({"file_name": "route"}))
            .expect("encode");
        assert_eq!(export.history_entry(), "path.export_json:route");

        let bare = ToolOutput::action("noop", json!({})).expect("encode");
        assert_eq!(bare.history_entry(), "noop");
    }

    #[test]
    fn output_serializes_untagged() {
        let text = serde_json::to_value(ToolOutput::Text("hide:水系".to_string())).expect("text");
        assert_eq!(text, json!("hide:水系"));

        let action = ToolOutput::action("erase.save_layer", json!({"layer_name": "x"})).expect("encode");
        assert_eq!(
            serde_json::to_value(&action).expect("action"),
            json!({"action": "erase.save_layer", "params": {"layer_name": "x"}})
        );
        assert_eq!(
            action.to_string(),
            r#"{"action":"erase.save_layer","params":{"layer_name":"x"}}"#
        );
    }

    #[test]
    fn number_arguments_accept_quoted_values() {
        let args = json!({"radius": "50", "bad": "fifty", "flag": true});
        assert_eq!(optional_number(&args, "radius").expect("radius"), Some(50.0));
        assert!(optional_number(&args, "bad").is_err());
        assert!(optional_number(&args, "flag").is_err());
        assert_eq!(optional_number(&args, "absent").expect("absent"), None);
        assert!(required_number(&args, "absent").is_err());
    }

    #[test]
    fn string_arguments_require_object() {
        assert!(matches!(
            required_str(&json!("layer=道路"), "layer_name"),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(required_str(&json!({"layer_name": "  "}), "layer_name").is_err());
        assert_eq!(
            required_str(&json!({"layer_name": " 道路 "}), "layer_name").expect("trimmed"),
            "道路"
        );
    }
}
