//! System prompt templates for the two model calls of a turn.

use std::fmt::Write as _;

use serde_json::Value;

use crate::tools::naming::OPERATOR_MAP;
use crate::tools::{result_tool_name, AnalysisKind, ResultTarget, Tool, ToolGroup, ToolRegistry};

/// Which of the two model calls a prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Tool selection: the model reads the history and proposes tool calls.
    First,
    /// Answer generation after the tool results are known.
    Second,
}

/// Renders the system instructions from the tool catalog.
///
/// The catalog is fixed for the process lifetime, so everything except the
/// history is rendered once at construction.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    header: String,
    catalog: String,
    operators: String,
    naming: String,
}

impl PromptAssembler {
    pub fn new(tools: &ToolRegistry) -> Self {
        Self {
            header: render_header(tools.len()),
            catalog: render_catalog(tools),
            operators: render_operator_table(),
            naming: render_naming_rules(),
        }
    }

    /// Build the system prompt for `phase`, ending with the conversation's
    /// history (oldest first).
    pub fn build_system_prompt(&self, history: &[String], phase: Phase) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.header);
        prompt.push_str(&self.catalog);
        prompt.push_str(&self.operators);
        prompt.push_str(&self.naming);
        prompt.push_str(&render_rules(phase));
        if phase == Phase::Second {
            prompt.push_str(REPLY_POLICY);
        }
        prompt.push_str(&render_history(history));
        prompt
    }
}

fn render_header(tool_count: usize) -> String {
    let mut out = format!(
        "你是地图助手，有{tool_count}个工具，分为三组。所有地图操作都由前端执行，你只负责选择工具并给出参数。\n\n"
    );
    out.push_str("=== 重要：上下文记忆规则 ===\n");
    out.push_str("你必须记住当前对话中最近执行的分析操作类型。当用户说'保存为图层'、'导出为JSON'等操作时：\n");
    for kind in AnalysisKind::ALL {
        let _ = writeln!(
            out,
            "- 如果最近执行了{} → 使用{}或{}",
            kind.label(),
            result_tool_name(kind, ResultTarget::Layer),
            result_tool_name(kind, ResultTarget::GeoJson)
        );
    }
    out.push_str("禁止询问用户要保存哪个分析的结果，必须基于上下文自动判断。\n\n");
    out
}

fn render_catalog(tools: &ToolRegistry) -> String {
    let group_names = ["第一组", "第二组", "第三组"];
    let mut out = String::new();
    let mut number = 0;
    for (group, group_name) in ToolGroup::ORDER.into_iter().zip(group_names) {
        let _ = writeln!(out, "=== {}：{} ===", group_name, group.heading());
        for tool in tools.list_tools().iter().filter(|t| t.group() == group) {
            number += 1;
            let _ = writeln!(out, "{}) {}", number, signature(tool.as_ref()));
            for line in tool.usage() {
                let _ = writeln!(out, "- {}", line);
            }
        }
        out.push('\n');
    }
    out
}

/// `name(arg:type, opt?:type, mode:'a'|'b')` from the argument schema.
fn signature(tool: &dyn Tool) -> String {
    let schema = tool.parameters_schema();
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let params: Vec<String> = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    let marker = if required.contains(&name.as_str()) { "" } else { "?" };
                    format!("{}{}:{}", name, marker, type_label(prop))
                })
                .collect()
        })
        .unwrap_or_default();

    format!("{}({})", tool.name(), params.join(", "))
}

fn type_label(prop: &Value) -> String {
    if let Some(choices) = prop.get("enum").and_then(Value::as_array) {
        return choices
            .iter()
            .filter_map(Value::as_str)
            .map(|c| format!("'{}'", c))
            .collect::<Vec<_>>()
            .join("|");
    }
    match prop.get("type").and_then(Value::as_str) {
        Some("string") => "str",
        Some("number") => "float",
        Some("integer") => "int",
        Some("boolean") => "bool",
        Some(other) => other,
        None => "any",
    }
    .to_string()
}

fn render_operator_table() -> String {
    let mut out = String::from("=== 操作符映射 ===\n");
    out.push_str("query_features_by_attribute 的 operator 参数必须使用前端支持的格式：\n");
    for (symbol, name) in OPERATOR_MAP {
        if symbol == name {
            let _ = writeln!(out, "  * '{}' 保持不变", symbol);
        } else {
            let _ = writeln!(out, "  * '{}' 映射为 '{}'", symbol, name);
        }
    }
    out.push_str("- 例如: 用户说'查找NAME=学校'时，operator参数必须传递'eq'而不是'='\n\n");
    out
}

fn render_naming_rules() -> String {
    let mut out = String::from("=== 默认命名规则 ===\n");
    out.push_str("当用户未指定图层名称或文件名时，系统自动生成包含参数信息的默认名称：\n");
    for kind in AnalysisKind::ALL {
        let _ = writeln!(out, "- {}：'{}'", kind.label(), kind.name_template());
    }
    out.push('\n');
    out
}

fn render_rules(phase: Phase) -> String {
    let mut rules = Vec::new();

    let mut matching = String::from("保存和导出操作必须与对应的分析操作匹配：");
    for kind in AnalysisKind::ALL {
        let _ = write!(
            matching,
            "\n   - {}完成后，用户要求保存 → 使用{}",
            kind.label(),
            result_tool_name(kind, ResultTarget::Layer)
        );
    }
    rules.push(matching);
    if phase == Phase::First {
        rules.push(
            "上下文承接：用户仅说'保存为图层'或'保存'时，默认针对最近一次完成的分析/查询结果执行对应的保存工具，严禁追问是哪一种；如用户明确指明其它方法再切换".to_string(),
        );
    }
    rules.push("图层名称参数为可选：用户未指定时直接调用工具，系统自动生成默认名称".to_string());
    rules.push("若用户使用@图层名称，请将@后的文本作为图层名称传递".to_string());
    rules.push("严禁自行执行这些操作，必须通过工具完成".to_string());

    let mut out = String::from("=== 重要规则 ===\n");
    for (i, rule) in rules.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, rule);
    }
    out.push('\n');
    out
}

const REPLY_POLICY: &str = r#"=== 回复规则 ===
当工具执行完成后，必须简洁回复，禁止废话：
- 图层操作：直接说'图层已显示/隐藏'
- 查询、分析、保存、导出操作：直接说'正在执行请稍后'
- 工具返回错误时：用一句话说明错误原因
严禁说'看起来'、'可能'、'如果'、'请确认'等不确定词汇。
严禁解释系统工作原理或引导用户查看界面。
严禁回复具体的要素数量或详细结果。
严禁编造或猜测操作结果。
只回复'正在执行请稍后'或简单的操作状态，一句话结束。

"#;

/// One line per entry, `action=<a>; layer=<b>` split at the first colon,
/// followed by a hint naming the latest entry.
pub fn render_history(history: &[String]) -> String {
    let lines: Vec<String> = history.iter().map(|entry| history_line(entry)).collect();
    let last = lines.last().map(String::as_str).unwrap_or("无");
    let body = if lines.is_empty() {
        "（无）".to_string()
    } else {
        lines.join("\n")
    };
    format!(
        "历史操作(顺序, 最新在下):\n{}\n最近一次操作: {}。若用户问'刚才做了什么'，请直接依据最近几次操作回答。",
        body, last
    )
}

fn history_line(entry: &str) -> String {
    match entry.split_once(':') {
        Some((action, layer)) => format!("action={}; layer={}", action, layer),
        None => entry.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(&ToolRegistry::new())
    }

    #[test]
    fn catalog_lists_every_tool_once_in_order() {
        let registry = ToolRegistry::new();
        let prompt = assembler().build_system_prompt(&[], Phase::First);
        assert!(prompt.contains("有16个工具"));
        assert!(prompt.contains("1) toggle_layer_visibility(layer_name:str, action:'show'|'hide'|'toggle')"));
        assert!(prompt.contains("4) execute_buffer_analysis(layer_name:str, radius:float, unit?:str, segments?:int)"));
        assert!(prompt.contains("16) save_path_results_as_layer(layer_name?:str)"));
        for tool in registry.list_tools() {
            let needle = format!(") {}(", tool.name());
            assert_eq!(prompt.matches(&needle).count(), 1, "{}", tool.name());
        }

        let layer_group = prompt.find("=== 第一组：图层显示与查询 ===").expect("group 1");
        let analysis_group = prompt.find("=== 第二组：空间分析 ===").expect("group 2");
        let save_group = prompt.find("=== 第三组：保存为图层 ===").expect("group 3");
        assert!(layer_group < analysis_group && analysis_group < save_group);
        let export_query = prompt.find(") export_query_results_as_json(").expect("export query");
        assert!(layer_group < export_query && export_query < analysis_group);
    }

    #[test]
    fn sections_are_ordered() {
        let prompt = assembler().build_system_prompt(&["show:道路".to_string()], Phase::Second);
        let positions: Vec<usize> = [
            "上下文记忆规则",
            "=== 第一组",
            "=== 操作符映射 ===",
            "=== 默认命名规则 ===",
            "=== 重要规则 ===",
            "=== 回复规则 ===",
            "历史操作(顺序, 最新在下)",
        ]
        .iter()
        .map(|section| prompt.find(section).expect(section))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn phases_differ_in_rules_and_reply_policy() {
        let assembler = assembler();
        let first = assembler.build_system_prompt(&[], Phase::First);
        let second = assembler.build_system_prompt(&[], Phase::Second);
        assert!(first.contains("上下文承接"));
        assert!(!first.contains("正在执行请稍后"));
        assert!(!second.contains("上下文承接"));
        assert!(second.contains("正在执行请稍后"));
    }

    #[test]
    fn operator_table_comes_from_mapping() {
        let prompt = assembler().build_system_prompt(&[], Phase::First);
        for (symbol, name) in OPERATOR_MAP {
            if symbol != name {
                assert!(prompt.contains(&format!("'{}' 映射为 '{}'", symbol, name)));
            }
        }
        assert!(prompt.contains("'like' 保持不变"));
    }

    #[test]
    fn naming_rules_cover_every_family() {
        let prompt = assembler().build_system_prompt(&[], Phase::First);
        for kind in AnalysisKind::ALL {
            assert!(prompt.contains(kind.name_template()), "{:?}", kind);
        }
    }

    #[test]
    fn history_is_rendered_with_last_action_hint() {
        let history = vec![
            "show:道路图层".to_string(),
            "query:学校:NAME:eq:一中".to_string(),
            "buffer_analysis:roads".to_string(),
        ];
        let rendered = render_history(&history);
        assert!(rendered.contains(
            "action=show; layer=道路图层\naction=query; layer=学校:NAME:eq:一中\naction=buffer_analysis; layer=roads\n"
        ));
        assert!(rendered.contains("最近一次操作: action=buffer_analysis; layer=roads。"));
    }

    #[test]
    fn history_without_colon_is_verbatim() {
        let rendered = render_history(&["noop".to_string()]);
        assert!(rendered.contains("\nnoop\n"));
        assert!(rendered.contains("最近一次操作: noop。"));

        let empty = render_history(&[]);
        assert!(empty.contains("（无）"));
        assert!(empty.contains("最近一次操作: 无。"));
    }
}
