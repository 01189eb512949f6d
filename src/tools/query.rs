//! Attribute query tool.

use serde_json::{json, Value};

use super::naming::{map_operator, QueryParams, OPERATOR_MAP};
use super::{required_str, AnalysisContext, Tool, ToolError, ToolGroup, ToolOutput};

/// Select features of a layer by comparing one attribute to a value.
pub struct QueryFeaturesByAttribute;

impl Tool for QueryFeaturesByAttribute {
    fn name(&self) -> &str {
        "query_features_by_attribute"
    }

    fn description(&self) -> &str {
        "按属性选择要素（前端执行）。返回格式 \"query:layer_name:field:operator:value\"，操作符为 eq/ne/gt/gte/lt/lte/like。"
    }

    fn parameters_schema(&self) -> Value {
        let operators: Vec<&str> = OPERATOR_MAP
            .iter()
            .flat_map(|(symbol, name)| [*symbol, *name])
            .collect();
        json!({
            "type": "object",
            "properties": {
                "layer_name": { "type": "string", "description": "图层名称" },
                "field": { "type": "string", "description": "属性字段名" },
                "operator": {
                    "type": "string",
                    "description": format!("比较操作符，可选值: {}", operators.join(", "))
                },
                "value": { "type": "string", "description": "查询值" }
            },
            "required": ["layer_name", "field", "operator", "value"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::LayerAndQuery
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'在@图层名称中查找字段=值'、'查询@图层名称的属性'、'筛选@图层名称'时调用。".to_string(),
            "操作符必须使用前端支持的格式（见操作符映射表），例如用户说'查找NAME=学校'时operator传递'eq'而不是'='。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        let params = QueryParams {
            layer_name: required_str(args, "layer_name")?.to_string(),
            field: required_str(args, "field")?.to_string(),
            operator: map_operator(required_str(args, "operator")?),
            // Values may legitimately be numeric in the model's JSON.
            value: match args.get("value") {
                Some(Value::Number(n)) => n.to_string(),
                _ => required_str(args, "value")?.to_string(),
            },
        };
        Ok(ToolOutput::Query(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::AnalysisKind;

    fn run(args: Value) -> Result<ToolOutput, ToolError> {
        QueryFeaturesByAttribute.execute(&args, &AnalysisContext::default())
    }

    #[test]
    fn raw_equals_is_translated() {
        let out = run(json!({"layer_name": "学校", "field": "NAME", "operator": "=", "value": "学校"}))
            .expect("query");
        let ToolOutput::Query(params) = &out else {
            panic!("query returns typed params");
        };
        assert_eq!(params.operator, "eq");
        let text = out.to_string();
        assert_eq!(text, "query:学校:NAME:eq:学校");
        assert!(text.contains("eq"));
        assert!(!text.contains(":=:"));
    }

    #[test]
    fn translated_operator_is_kept() {
        let out = run(json!({"layer_name": "人口", "field": "POP", "operator": "gte", "value": 1000}))
            .expect("query");
        assert_eq!(out.history_entry(), "query:人口:POP:gte:1000");
        assert_eq!(
            serde_json::to_value(&out).expect("serialize"),
            json!("query:人口:POP:gte:1000")
        );
    }

    #[test]
    fn colon_in_layer_name_survives_into_default_name() {
        let mut ctx = AnalysisContext::default();
        let out = run(json!({"layer_name": "站点:2024", "field": "NAME", "operator": "=", "value": "x"}))
            .expect("query");
        assert_eq!(out.to_string(), "query:站点:2024:NAME:eq:x");
        ctx.observe(&out);
        assert_eq!(ctx.default_name(AnalysisKind::Query), "属性查询结果_站点:2024_NAMEeqx");
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!(matches!(
            run(json!({"layer_name": "学校", "operator": "=", "value": "x"})),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
