//! Conversation history: what each conversation has asked the map to do.
//!
//! Every successful tool call appends one entry (`"<action>:<subject>"` or an
//! opaque string) and updates the conversation's [`AnalysisContext`]. The
//! entries are replayed into the next first-phase prompt so the model can
//! resolve "save that" against the latest analysis.

mod memory;

pub use memory::InMemoryHistoryStore;

use chrono::{DateTime, Utc};

use crate::tools::{AnalysisContext, ToolOutput};

/// History of one conversation. Entries are append-only.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    entries: Vec<String>,
    context: AnalysisContext,
    updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.context
    }

    pub fn last_entry(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// When the last entry was appended.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn append(&mut self, entry: String) {
        self.entries.push(entry);
        self.updated_at = Some(Utc::now());
    }

    /// Append the output's history entry and fold it into the analysis context.
    pub fn record(&mut self, output: &ToolOutput) {
        self.context.observe(output);
        self.append(output.history_entry());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_appends_entry_and_context() {
        let mut conversation = Conversation::default();
        let output = ToolOutput::action(
            "buffer_analysis",
            json!({"layer_name": "roads", "radius": 50.0, "unit": "meters", "segments": 10}),
        )
        .expect("encode");
        conversation.record(&output);

        assert_eq!(conversation.entries(), ["buffer_analysis:roads"]);
        assert_eq!(conversation.last_entry(), Some("buffer_analysis:roads"));
        assert!(conversation.context().buffer.is_some());
        assert!(conversation.updated_at().is_some());
    }

    #[test]
    fn append_is_append_only() {
        let mut conversation = Conversation::default();
        let mut expected: Vec<String> = Vec::new();
        for entry in ["show:道路", "hide:道路", "show:道路", "query:学校:NAME:eq:一中"] {
            conversation.append(entry.to_string());
            expected.push(entry.to_string());
            assert_eq!(conversation.entries(), expected.as_slice());
        }
    }
}
