//! Spatial analysis tools: buffer, intersection, erase and shortest path.
//!
//! The analyses run in the frontend; these tools only check the parameters
//! against the limits of the analysis backend and hand them over.

use serde_json::{json, Value};

use super::naming::{
    BufferParams, EraseParams, IntersectionParams, PathParams, BUFFER_ACTION, DEFAULT_BUFFER_SEGMENTS,
    DEFAULT_BUFFER_UNIT, DEFAULT_PATH_RESOLUTION, DEFAULT_PATH_UNITS, ERASE_ACTION,
    INTERSECTION_ACTION, PATH_ACTION,
};
use super::{
    optional_number, optional_str, required_number, required_str, AnalysisContext, Tool,
    ToolError, ToolGroup, ToolOutput,
};

const SEGMENT_RANGE: std::ops::RangeInclusive<f64> = 1.0..=64.0;
const PATH_UNITS: [&str; 3] = ["kilometers", "miles", "meters"];

pub struct BufferAnalysis;

impl Tool for BufferAnalysis {
    fn name(&self) -> &str {
        "execute_buffer_analysis"
    }

    fn description(&self) -> &str {
        "执行缓冲区分析（前端执行）。返回 { action: 'buffer_analysis', params }。"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "layer_name": { "type": "string", "description": "图层名称" },
                "radius": { "type": "number", "description": "缓冲区半径" },
                "unit": { "type": "string", "description": "单位，默认 meters" },
                "segments": { "type": "integer", "description": "半圆弧线段数 1-64，默认 10" }
            },
            "required": ["layer_name", "radius"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Analysis
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'对@图层名称进行缓冲区分析'、'创建@图层名称的缓冲区'、'缓冲区分析'时调用。".to_string(),
            "需要指定图层名称、半径和单位（默认meters）。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        let layer_name = required_str(args, "layer_name")?;
        let radius = required_number(args, "radius")?;
        if radius <= 0.0 {
            return Err(ToolError::InvalidArguments(format!(
                "'radius' must be positive, got {}",
                radius
            )));
        }
        let unit = optional_str(args, "unit").unwrap_or(DEFAULT_BUFFER_UNIT);
        let segments = optional_number(args, "segments")?
            .unwrap_or(f64::from(DEFAULT_BUFFER_SEGMENTS));
        if !SEGMENT_RANGE.contains(&segments) || segments.fract() != 0.0 {
            return Err(ToolError::InvalidArguments(format!(
                "'segments' must be an integer between 1 and 64, got {}",
                segments
            )));
        }

        ToolOutput::action(
            BUFFER_ACTION,
            BufferParams {
                layer_name: layer_name.to_string(),
                radius,
                unit: unit.to_string(),
                segments: segments as u32,
            },
        )
    }
}

pub struct IntersectionAnalysis;

impl Tool for IntersectionAnalysis {
    fn name(&self) -> &str {
        "execute_intersection_analysis"
    }

    fn description(&self) -> &str {
        "执行相交分析（前端执行）。返回 { action: 'intersection_analysis', params }。"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_layer_name": { "type": "string", "description": "目标图层名称" },
                "mask_layer_name": { "type": "string", "description": "掩膜图层名称" }
            },
            "required": ["target_layer_name", "mask_layer_name"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Analysis
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'对@图层名称进行相交分析'、'计算@图层名称与@图层名称的相交'、'相交分析'时调用。".to_string(),
            "需要指定目标图层名称和掩膜图层名称。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        ToolOutput::action(
            INTERSECTION_ACTION,
            IntersectionParams {
                target_layer_name: required_str(args, "target_layer_name")?.to_string(),
                mask_layer_name: required_str(args, "mask_layer_name")?.to_string(),
            },
        )
    }
}

pub struct EraseAnalysis;

impl Tool for EraseAnalysis {
    fn name(&self) -> &str {
        "execute_erase_analysis"
    }

    fn description(&self) -> &str {
        "执行擦除分析（前端执行）。返回 { action: 'erase_analysis', params }。"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_layer_name": { "type": "string", "description": "目标图层名称" },
                "erase_layer_name": { "type": "string", "description": "擦除图层名称" }
            },
            "required": ["target_layer_name", "erase_layer_name"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Analysis
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'对@图层名称进行擦除分析'、'从@图层名称中擦除@图层名称'、'擦除分析'时调用。".to_string(),
            "需要指定目标图层名称和擦除图层名称。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        ToolOutput::action(
            ERASE_ACTION,
            EraseParams {
                target_layer_name: required_str(args, "target_layer_name")?.to_string(),
                erase_layer_name: required_str(args, "erase_layer_name")?.to_string(),
            },
        )
    }
}

pub struct ShortestPathAnalysis;

impl Tool for ShortestPathAnalysis {
    fn name(&self) -> &str {
        "execute_shortest_path_analysis"
    }

    fn description(&self) -> &str {
        "执行最短路径分析（前端执行）。返回 { action: 'shortest_path_analysis', params }。"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "start_layer_name": { "type": "string", "description": "起点图层名称" },
                "end_layer_name": { "type": "string", "description": "终点图层名称" },
                "obstacle_layer_name": { "type": "string", "description": "障碍物图层名称（可选）" },
                "units": {
                    "type": "string",
                    "enum": PATH_UNITS,
                    "description": "距离单位，默认 kilometers"
                },
                "resolution": { "type": "number", "description": "栅格分辨率，正数，默认 1000" }
            },
            "required": ["start_layer_name", "end_layer_name"]
        })
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Analysis
    }

    fn usage(&self) -> Vec<String> {
        vec![
            "当用户说'计算@图层名称到@图层名称的最短路径'、'最短路径分析'时调用。".to_string(),
            "需要指定起点图层名称、终点图层名称，障碍物图层名称可选。".to_string(),
        ]
    }

    fn execute(&self, args: &Value, _context: &AnalysisContext) -> Result<ToolOutput, ToolError> {
        let resolution = optional_number(args, "resolution")?.unwrap_or(DEFAULT_PATH_RESOLUTION);
        if resolution <= 0.0 {
            return Err(ToolError::InvalidArguments(format!(
                "'resolution' must be positive, got {}",
                resolution
            )));
        }
        let units = optional_str(args, "units").unwrap_or(DEFAULT_PATH_UNITS);
        if !PATH_UNITS.contains(&units) {
            return Err(ToolError::InvalidArguments(format!(
                "'units' must be one of kilometers/miles/meters, got '{}'",
                units
            )));
        }

        ToolOutput::action(
            PATH_ACTION,
            PathParams {
                start_layer_name: required_str(args, "start_layer_name")?.to_string(),
                end_layer_name: required_str(args, "end_layer_name")?.to_string(),
                obstacle_layer_name: optional_str(args, "obstacle_layer_name").map(str::to_string),
                units: units.to_string(),
                resolution,
            },
        )
    }
}
