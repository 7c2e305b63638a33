//! Tool catalog and typed tool calls
//!
//! The catalog is purely declarative: it is serialized and handed to the
//! model so it knows which structured calls it may request. Execution lives
//! in the execution module. Calls are a closed tagged variant with typed
//! arguments; unknown names and malformed shapes are rejected at parse time
//! with distinct errors so the orchestrator can degrade per-call.

use crate::error::AssistantError;
use crate::models::{Mood, Period, TransactionKind};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default reminder lead applied when the model does not pass one.
pub const DEFAULT_REMINDER_LEAD_MINUTES: u32 = 15;

/// One entry of the declarative catalog, serialized for the model as a
/// Gemini function declaration.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The full fixed catalog, in a stable order.
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: "log_transaction",
            description: "Record an income or expense transaction for the user",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "amount": { "type": "NUMBER", "description": "Positive amount" },
                    "type": { "type": "STRING", "enum": ["income", "expense"] },
                    "category": { "type": "STRING", "description": "Free-text category, e.g. Food" },
                    "description": { "type": "STRING" }
                },
                "required": ["amount", "type", "category"]
            }),
        },
        ToolDeclaration {
            name: "schedule_meeting",
            description: "Add a meeting or reminder to the user's schedule",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "description": { "type": "STRING" },
                    "date": { "type": "STRING", "description": "ISO date, YYYY-MM-DD" },
                    "time": { "type": "STRING", "description": "24h time, HH:MM" },
                    "reminder_lead_minutes": {
                        "type": "INTEGER",
                        "description": "Minutes before the start to remind; defaults to 15"
                    }
                },
                "required": ["title", "date", "time"]
            }),
        },
        ToolDeclaration {
            name: "add_journal_entry",
            description: "Save a mood journal entry for the user",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "content": { "type": "STRING" },
                    "mood": {
                        "type": "STRING",
                        "enum": ["happy", "sad", "energetic", "calm", "neutral"]
                    }
                },
                "required": ["content", "mood"]
            }),
        },
        ToolDeclaration {
            name: "get_daily_quote",
            description: "Fetch today's inspirational quote",
            parameters: json!({ "type": "OBJECT", "properties": {} }),
        },
        ToolDeclaration {
            name: "get_user_finances",
            description: "Summarize the user's transactions for a period",
            parameters: period_parameters(),
        },
        ToolDeclaration {
            name: "get_user_schedule",
            description: "Summarize the user's schedule for a period",
            parameters: period_parameters(),
        },
        ToolDeclaration {
            name: "get_user_journals",
            description: "Summarize the user's journal entries for a period",
            parameters: period_parameters(),
        },
        ToolDeclaration {
            name: "search_web",
            description: "Look up current information on the web",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "query": { "type": "STRING" }
                },
                "required": ["query"]
            }),
        },
    ]
}

fn period_parameters() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "period": {
                "type": "STRING",
                "enum": ["today", "this_week", "this_month", "last_month", "all"],
                "description": "Summary window; defaults to all"
            }
        }
    })
}

//
// ================= Typed Arguments =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct LogTransactionArgs {
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleMeetingArgs {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// ISO date, YYYY-MM-DD.
    pub date: String,
    /// 24h time, HH:MM.
    pub time: String,
    #[serde(default)]
    pub reminder_lead_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddJournalEntryArgs {
    pub content: String,
    pub mood: Mood,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SummaryArgs {
    #[serde(default)]
    pub period: Option<String>,
}

impl SummaryArgs {
    pub fn period(&self) -> Period {
        self.period
            .as_deref()
            .map(Period::parse_token)
            .unwrap_or(Period::All)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchWebArgs {
    pub query: String,
}

//
// ================= Tool Calls =================
//

/// A structured call requested by the model, parsed into its typed form.
#[derive(Debug, Clone)]
pub enum ToolCall {
    LogTransaction(LogTransactionArgs),
    ScheduleMeeting(ScheduleMeetingArgs),
    AddJournalEntry(AddJournalEntryArgs),
    GetDailyQuote,
    GetUserFinances(SummaryArgs),
    GetUserSchedule(SummaryArgs),
    GetUserJournals(SummaryArgs),
    SearchWeb(SearchWebArgs),
}

impl ToolCall {
    /// Parse a requested call by name and raw arguments. Unknown names and
    /// argument-shape mismatches fail with distinct error kinds.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        let shape_error = |e: serde_json::Error| {
            AssistantError::InvalidToolArguments(format!("{}: {}", name, e))
        };

        match name {
            "log_transaction" => Ok(ToolCall::LogTransaction(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "schedule_meeting" => Ok(ToolCall::ScheduleMeeting(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "add_journal_entry" => Ok(ToolCall::AddJournalEntry(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "get_daily_quote" => Ok(ToolCall::GetDailyQuote),
            "get_user_finances" => Ok(ToolCall::GetUserFinances(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "get_user_schedule" => Ok(ToolCall::GetUserSchedule(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "get_user_journals" => Ok(ToolCall::GetUserJournals(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            "search_web" => Ok(ToolCall::SearchWeb(
                serde_json::from_value(args.clone()).map_err(shape_error)?,
            )),
            other => Err(AssistantError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::LogTransaction(_) => "log_transaction",
            ToolCall::ScheduleMeeting(_) => "schedule_meeting",
            ToolCall::AddJournalEntry(_) => "add_journal_entry",
            ToolCall::GetDailyQuote => "get_daily_quote",
            ToolCall::GetUserFinances(_) => "get_user_finances",
            ToolCall::GetUserSchedule(_) => "get_user_schedule",
            ToolCall::GetUserJournals(_) => "get_user_journals",
            ToolCall::SearchWeb(_) => "search_web",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_complete() {
        let names: Vec<&str> = declarations().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "log_transaction",
                "schedule_meeting",
                "add_journal_entry",
                "get_daily_quote",
                "get_user_finances",
                "get_user_schedule",
                "get_user_journals",
                "search_web",
            ]
        );
    }

    #[test]
    fn test_parse_log_transaction() {
        let args = json!({
            "type": "expense",
            "amount": 250,
            "category": "Food",
            "description": "lunch"
        });

        let call = ToolCall::parse("log_transaction", &args).unwrap();
        match call {
            ToolCall::LogTransaction(parsed) => {
                assert_eq!(parsed.amount, 250.0);
                assert_eq!(parsed.kind, TransactionKind::Expense);
                assert_eq!(parsed.category, "Food");
                assert_eq!(parsed.description, "lunch");
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_required_argument() {
        let args = json!({ "amount": 10.0 });
        let result = ToolCall::parse("log_transaction", &args);
        assert!(matches!(
            result,
            Err(AssistantError::InvalidToolArguments(_))
        ));
    }

    #[test]
    fn test_parse_unknown_tool() {
        let result = ToolCall::parse("open_garage_door", &json!({}));
        assert!(matches!(result, Err(AssistantError::UnknownTool(_))));
    }

    #[test]
    fn test_summary_args_default_period() {
        let args: SummaryArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.period(), Period::All);

        let args: SummaryArgs = serde_json::from_value(json!({ "period": "this_week" })).unwrap();
        assert_eq!(args.period(), Period::ThisWeek);
    }
}
