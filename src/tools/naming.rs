//! Analysis families, operator translation and default result names.
//!
//! Save/export tools may be called without a name. The name is then derived
//! from the parameters of the most recent analysis of the same family in the
//! conversation, which [`AnalysisContext`] tracks.

use serde::{Deserialize, Serialize};

use super::ToolOutput;

/// Attribute-query operators as typed by users, and the form the frontend
/// filter expects.
pub const OPERATOR_MAP: [(&str, &str); 7] = [
    ("=", "eq"),
    ("!=", "ne"),
    (">", "gt"),
    (">=", "gte"),
    ("<", "lt"),
    ("<=", "lte"),
    ("like", "like"),
];

/// Translate a comparison operator to its frontend name.
///
/// Unknown operators (including already-translated ones such as `eq`) are
/// returned unchanged.
pub fn map_operator(raw: &str) -> String {
    let trimmed = raw.trim();
    OPERATOR_MAP
        .iter()
        .find(|(symbol, _)| *symbol == trimmed || (*symbol == "like" && trimmed.eq_ignore_ascii_case("like")))
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Render a number the way result names embed it: `50`, not `50.0`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub const DEFAULT_BUFFER_UNIT: &str = "meters";
pub const DEFAULT_BUFFER_SEGMENTS: u32 = 10;
pub const DEFAULT_PATH_UNITS: &str = "kilometers";
pub const DEFAULT_PATH_RESOLUTION: f64 = 1000.0;

/// The five result-producing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Query,
    Buffer,
    Intersection,
    Erase,
    ShortestPath,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Query,
        AnalysisKind::Buffer,
        AnalysisKind::Intersection,
        AnalysisKind::Erase,
        AnalysisKind::ShortestPath,
    ];

    /// Prefix of default result names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            AnalysisKind::Query => "属性查询结果",
            AnalysisKind::Buffer => "缓冲区分析结果",
            AnalysisKind::Intersection => "相交分析结果",
            AnalysisKind::Erase => "擦除分析结果",
            AnalysisKind::ShortestPath => "最短路径分析结果",
        }
    }

    /// Namespace of save/export actions, and the infix of their tool names.
    pub fn slug(self) -> &'static str {
        match self {
            AnalysisKind::Query => "query",
            AnalysisKind::Buffer => "buffer",
            AnalysisKind::Intersection => "intersection",
            AnalysisKind::Erase => "erase",
            AnalysisKind::ShortestPath => "path",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisKind::Query => "属性查询",
            AnalysisKind::Buffer => "缓冲区分析",
            AnalysisKind::Intersection => "相交分析",
            AnalysisKind::Erase => "擦除分析",
            AnalysisKind::ShortestPath => "最短路径分析",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            AnalysisKind::Query => "查询",
            AnalysisKind::Buffer => "缓冲区",
            AnalysisKind::Intersection => "相交",
            AnalysisKind::Erase => "擦除",
            AnalysisKind::ShortestPath => "路径",
        }
    }

    /// Tool that produces results of this family.
    pub fn producing_tool(self) -> &'static str {
        match self {
            AnalysisKind::Query => "query_features_by_attribute",
            AnalysisKind::Buffer => "execute_buffer_analysis",
            AnalysisKind::Intersection => "execute_intersection_analysis",
            AnalysisKind::Erase => "execute_erase_analysis",
            AnalysisKind::ShortestPath => "execute_shortest_path_analysis",
        }
    }

    /// Template shown to the model in the naming rules.
    pub fn name_template(self) -> &'static str {
        match self {
            AnalysisKind::Query => "属性查询结果_图层名_字段操作值",
            AnalysisKind::Buffer => "缓冲区分析结果_源图层名_r半径_s分段数",
            AnalysisKind::Intersection => "相交分析结果_目标图层_AND_掩膜图层",
            AnalysisKind::Erase => "擦除分析结果_目标图层_MINUS_擦除图层",
            AnalysisKind::ShortestPath => "最短路径分析结果_units-单位_res-分辨率",
        }
    }
}

/// Parameters of a buffer run, as sent to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferParams {
    pub layer_name: String,
    pub radius: f64,
    pub unit: String,
    pub segments: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionParams {
    pub target_layer_name: String,
    pub mask_layer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraseParams {
    pub target_layer_name: String,
    pub erase_layer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    pub start_layer_name: String,
    pub end_layer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstacle_layer_name: Option<String>,
    pub units: String,
    pub resolution: f64,
}

/// Parameters of an attribute query. Serialized as its instruction string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "String")]
pub struct QueryParams {
    pub layer_name: String,
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl QueryParams {
    /// Encode as the legacy `query:<layer>:<field>:<op>:<value>` instruction.
    pub fn to_instruction(&self) -> String {
        format!(
            "query:{}:{}:{}:{}",
            self.layer_name, self.field, self.operator, self.value
        )
    }
}

impl From<QueryParams> for String {
    fn from(params: QueryParams) -> Self {
        params.to_instruction()
    }
}

/// Most recent parameters per analysis family for one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisContext {
    pub query: Option<QueryParams>,
    pub buffer: Option<BufferParams>,
    pub intersection: Option<IntersectionParams>,
    pub erase: Option<EraseParams>,
    pub shortest_path: Option<PathParams>,
}

pub const BUFFER_ACTION: &str = "buffer_analysis";
pub const INTERSECTION_ACTION: &str = "intersection_analysis";
pub const ERASE_ACTION: &str = "erase_analysis";
pub const PATH_ACTION: &str = "shortest_path_analysis";

impl AnalysisContext {
    /// Fold a tool output into the context. Outputs that are not analysis
    /// runs leave it untouched.
    pub fn observe(&mut self, output: &ToolOutput) {
        match output {
            ToolOutput::Text(_) => {}
            ToolOutput::Query(query) => self.query = Some(query.clone()),
            ToolOutput::Action { action, params } => {
                let params = params.clone();
                match action.as_str() {
                    BUFFER_ACTION => {
                        if let Ok(p) = serde_json::from_value(params) {
                            self.buffer = Some(p);
                        }
                    }
                    INTERSECTION_ACTION => {
                        if let Ok(p) = serde_json::from_value(params) {
                            self.intersection = Some(p);
                        }
                    }
                    ERASE_ACTION => {
                        if let Ok(p) = serde_json::from_value(params) {
                            self.erase = Some(p);
                        }
                    }
                    PATH_ACTION => {
                        if let Ok(p) = serde_json::from_value(params) {
                            self.shortest_path = Some(p);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Default result name for `kind`; the bare prefix when no run of that
    /// family has been seen.
    pub fn default_name(&self, kind: AnalysisKind) -> String {
        let prefix = kind.name_prefix();
        let suffix = match kind {
            AnalysisKind::Query => self
                .query
                .as_ref()
                .map(|q| format!("{}_{}{}{}", q.layer_name, q.field, q.operator, q.value)),
            AnalysisKind::Buffer => self.buffer.as_ref().map(|b| {
                format!("{}_r{}_s{}", b.layer_name, format_number(b.radius), b.segments)
            }),
            AnalysisKind::Intersection => self
                .intersection
                .as_ref()
                .map(|i| format!("{}_AND_{}", i.target_layer_name, i.mask_layer_name)),
            AnalysisKind::Erase => self
                .erase
                .as_ref()
                .map(|e| format!("{}_MINUS_{}", e.target_layer_name, e.erase_layer_name)),
            AnalysisKind::ShortestPath => self
                .shortest_path
                .as_ref()
                .map(|p| format!("units-{}_res-{}", p.units, format_number(p.resolution))),
        };
        match suffix {
            Some(suffix) => format!("{}_{}", prefix, suffix),
            None => prefix.to_string(),
        }
    }
}
