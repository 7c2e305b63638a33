//! Tool call execution
//!
//! Dispatches parsed tool calls to their handlers. A call can never abort
//! the round: unknown names return the literal "unknown function" result and
//! handler failures are converted into error-text results that are fed back
//! to the model.

use crate::context::AssistantContext;
use crate::error::AssistantError;
use crate::gemini::{Content, FunctionCall, ModelRequest};
use crate::models::{
    ActionKind, AgenticAction, JournalEntry, Mood, Period, ScheduleItem, Transaction,
    TransactionKind,
};
use crate::tools::{ToolCall, DEFAULT_REMINDER_LEAD_MINUTES};
use crate::Result;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one executed call: a short text for the model plus the action
/// surfaced to the caller when the call mutated a record.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub name: String,
    pub result: String,
    pub action: Option<AgenticAction>,
}

pub struct ToolExecutor {
    ctx: Arc<AssistantContext>,
}

impl ToolExecutor {
    pub fn new(ctx: Arc<AssistantContext>) -> Self {
        Self { ctx }
    }

    /// Execute one requested call. Never returns Err; failures become
    /// error-text results so the conversation can continue.
    pub async fn execute(&self, request: &FunctionCall) -> ToolOutcome {
        let call = match ToolCall::parse(&request.name, &request.args) {
            Ok(call) => call,
            Err(AssistantError::UnknownTool(name)) => {
                warn!(tool = %name, "Model requested an unregistered tool");
                return ToolOutcome {
                    name: request.name.clone(),
                    result: "unknown function".to_string(),
                    action: None,
                };
            }
            Err(error) => {
                warn!(tool = %request.name, error = %error, "Malformed tool arguments");
                return ToolOutcome {
                    name: request.name.clone(),
                    result: format!("error: {}", error),
                    action: None,
                };
            }
        };

        debug!(tool = call.name(), "Executing tool call");

        match self.dispatch(call).await {
            Ok((result, action)) => ToolOutcome {
                name: request.name.clone(),
                result,
                action,
            },
            Err(error) => {
                warn!(tool = %request.name, error = %error, "Tool handler failed");
                ToolOutcome {
                    name: request.name.clone(),
                    result: format!("error: {}", error),
                    action: None,
                }
            }
        }
    }

    async fn dispatch(&self, call: ToolCall) -> Result<(String, Option<AgenticAction>)> {
        match call {
            ToolCall::LogTransaction(args) => {
                if args.amount <= 0.0 {
                    return Err(AssistantError::InvalidToolArguments(
                        "amount must be positive".to_string(),
                    ));
                }

                let tx = Transaction::new(args.amount, args.kind, args.category, args.description);
                let payload = serde_json::to_value(&tx)?;
                self.ctx.store.insert_transaction(tx.clone()).await?;

                Ok((
                    format!(
                        "Logged {} of {:.2} in {}",
                        tx.kind, tx.amount, tx.category
                    ),
                    Some(AgenticAction::executed(ActionKind::Transaction, payload)),
                ))
            }

            ToolCall::ScheduleMeeting(args) => {
                let date = NaiveDate::parse_from_str(&args.date, "%Y-%m-%d").map_err(|e| {
                    AssistantError::InvalidToolArguments(format!("date '{}': {}", args.date, e))
                })?;
                let time = NaiveTime::parse_from_str(&args.time, "%H:%M").map_err(|e| {
                    AssistantError::InvalidToolArguments(format!("time '{}': {}", args.time, e))
                })?;

                let item = ScheduleItem {
                    id: uuid::Uuid::new_v4(),
                    title: args.title,
                    description: args.description,
                    date,
                    time,
                    reminder_lead_minutes: Some(
                        args.reminder_lead_minutes
                            .unwrap_or(DEFAULT_REMINDER_LEAD_MINUTES),
                    ),
                };
                let payload = serde_json::to_value(&item)?;
                self.ctx.store.insert_schedule_item(item.clone()).await?;

                Ok((
                    format!(
                        "Scheduled '{}' on {} at {}",
                        item.title,
                        item.date,
                        item.time.format("%H:%M")
                    ),
                    Some(AgenticAction::executed(ActionKind::Schedule, payload)),
                ))
            }

            ToolCall::AddJournalEntry(args) => {
                if args.content.trim().is_empty() {
                    return Err(AssistantError::InvalidToolArguments(
                        "journal content must not be empty".to_string(),
                    ));
                }

                let entry = JournalEntry::new(args.content, args.mood);
                let payload = serde_json::to_value(&entry)?;
                self.ctx.store.insert_journal_entry(entry.clone()).await?;

                Ok((
                    format!("Saved a {} journal entry", entry.mood),
                    Some(AgenticAction::executed(ActionKind::Journal, payload)),
                ))
            }

            ToolCall::GetDailyQuote => {
                let quote = fetch_daily_quote(&self.ctx).await?;
                Ok((quote, None))
            }

            ToolCall::GetUserFinances(args) => {
                let summary = self.finances_summary(args.period()).await?;
                Ok((summary, None))
            }

            ToolCall::GetUserSchedule(args) => {
                let summary = self.schedule_summary(args.period()).await?;
                Ok((summary, None))
            }

            ToolCall::GetUserJournals(args) => {
                let summary = self.journal_summary(args.period()).await?;
                Ok((summary, None))
            }

            ToolCall::SearchWeb(args) => {
                let found = fetch_web_search(&self.ctx, &args.query).await?;
                Ok((found, None))
            }
        }
    }

    // =============================
    // Aggregate Reads
    // =============================

    async fn finances_summary(&self, period: Period) -> Result<String> {
        let now = Utc::now();
        let transactions: Vec<Transaction> = self
            .ctx
            .store
            .list_transactions()
            .await?
            .into_iter()
            .filter(|tx| period.contains(tx.occurred_at, now))
            .collect();

        if transactions.is_empty() {
            return Ok(format!("no transactions for period {}", period));
        }

        let income: f64 = transactions
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Income)
            .map(|tx| tx.amount)
            .sum();
        let expense: f64 = transactions
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Expense)
            .map(|tx| tx.amount)
            .sum();

        let samples: Vec<String> = transactions
            .iter()
            .take(3)
            .map(|tx| {
                let sign = match tx.kind {
                    TransactionKind::Income => '+',
                    TransactionKind::Expense => '-',
                };
                format!("{} {}{:.2}", tx.category, sign, tx.amount)
            })
            .collect();

        Ok(format!(
            "period={} transactions={} income={:.2} expense={:.2} net={:.2} | recent: {}",
            period,
            transactions.len(),
            income,
            expense,
            income - expense,
            samples.join("; ")
        ))
    }

    async fn schedule_summary(&self, period: Period) -> Result<String> {
        let today = Utc::now().date_naive();
        let items: Vec<ScheduleItem> = self
            .ctx
            .store
            .list_schedule_items()
            .await?
            .into_iter()
            .filter(|item| period.contains_date(item.date, today))
            .collect();

        if items.is_empty() {
            return Ok(format!("no schedule items for period {}", period));
        }

        let samples: Vec<String> = items
            .iter()
            .take(3)
            .map(|item| format!("{} {} {}", item.date, item.time.format("%H:%M"), item.title))
            .collect();

        Ok(format!(
            "period={} items={} | next: {}",
            period,
            items.len(),
            samples.join("; ")
        ))
    }

    async fn journal_summary(&self, period: Period) -> Result<String> {
        let now = Utc::now();
        let entries: Vec<JournalEntry> = self
            .ctx
            .store
            .list_journal_entries()
            .await?
            .into_iter()
            .filter(|entry| period.contains(entry.occurred_at, now))
            .collect();

        if entries.is_empty() {
            return Ok(format!("no journal entries for period {}", period));
        }

        let mut tally: Vec<(Mood, usize)> = Vec::new();
        for entry in &entries {
            match tally.iter_mut().find(|(mood, _)| *mood == entry.mood) {
                Some((_, count)) => *count += 1,
                None => tally.push((entry.mood, 1)),
            }
        }
        let moods: Vec<String> = tally
            .iter()
            .map(|(mood, count)| format!("{}={}", mood, count))
            .collect();

        let latest = entries
            .first()
            .map(|entry| entry.content.chars().take(80).collect::<String>())
            .unwrap_or_default();

        Ok(format!(
            "period={} entries={} moods: {} | latest: {}",
            period,
            entries.len(),
            moods.join(" "),
            latest
        ))
    }
}

// =============================
// Cached Remote Lookups
// =============================

/// Daily quote behind the governor's single-slot cache. The remote call is
/// only made on a miss, and only a successful response is cached.
pub async fn fetch_daily_quote(ctx: &AssistantContext) -> Result<String> {
    if let Some(cached) = ctx.governor.cached_quote().await {
        debug!("Daily quote served from cache");
        return Ok(cached);
    }

    ctx.governor.acquire_permit().await?;

    let reply = ctx
        .transport
        .generate(ModelRequest {
            system_instruction: "You write short, original inspirational quotes. \
                                 Reply with a single sentence and its author line."
                .to_string(),
            tools: vec![],
            contents: vec![Content::user_text("Give me today's inspirational quote.")],
        })
        .await?;

    ctx.governor.store_quote(reply.text.clone()).await;
    Ok(reply.text)
}

/// Free-text lookup behind the governor's per-query cache.
pub async fn fetch_web_search(ctx: &AssistantContext, query: &str) -> Result<String> {
    if let Some(cached) = ctx.governor.cached_search(query).await {
        debug!("Search result served from cache");
        return Ok(cached);
    }

    ctx.governor.acquire_permit().await?;

    let reply = ctx
        .transport
        .generate(ModelRequest {
            system_instruction: "You are a web lookup assistant. Provide a concise, \
                                 factual summary of current information for the query."
                .to_string(),
            tools: vec![],
            contents: vec![Content::user_text(query)],
        })
        .await?;

    ctx.governor.store_search(query, reply.text.clone()).await;
    Ok(reply.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockTransport;
    use crate::governor::RateGovernor;
    use crate::store::RecordStore;
    use serde_json::json;

    async fn test_context(script: Vec<Result<crate::gemini::ModelReply>>) -> Arc<AssistantContext> {
        let store = Arc::new(RecordStore::in_memory());
        store.initialize().await.unwrap();

        AssistantContext::new(
            store,
            Arc::new(RateGovernor::new()),
            Arc::new(MockTransport::new(script)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_transaction_creates_record_and_action() {
        let ctx = test_context(vec![]).await;
        let executor = ToolExecutor::new(Arc::clone(&ctx));

        let outcome = executor
            .execute(&FunctionCall {
                name: "log_transaction".to_string(),
                args: json!({
                    "type": "expense",
                    "amount": 250,
                    "category": "Food",
                    "description": "lunch"
                }),
            })
            .await;

        let action = outcome.action.expect("mutating call logs an action");
        assert_eq!(action.kind, ActionKind::Transaction);
        assert!(action.executed);

        let stored = ctx.store.list_transactions().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, 250.0);
        assert_eq!(stored[0].kind, TransactionKind::Expense);
        assert_eq!(stored[0].category, "Food");
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_amount_becomes_error_text() {
        let ctx = test_context(vec![]).await;
        let executor = ToolExecutor::new(Arc::clone(&ctx));

        let outcome = executor
            .execute(&FunctionCall {
                name: "log_transaction".to_string(),
                args: json!({ "type": "expense", "amount": -5, "category": "Food" }),
            })
            .await;

        assert!(outcome.result.starts_with("error:"));
        assert!(outcome.action.is_none());
        assert!(ctx.store.list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tool_returns_literal_result() {
        let ctx = test_context(vec![]).await;
        let executor = ToolExecutor::new(ctx);

        let outcome = executor
            .execute(&FunctionCall {
                name: "format_hard_drive".to_string(),
                args: json!({}),
            })
            .await;

        assert_eq!(outcome.result, "unknown function");
        assert!(outcome.action.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_meeting_defaults_reminder_lead() {
        let ctx = test_context(vec![]).await;
        let executor = ToolExecutor::new(Arc::clone(&ctx));

        let outcome = executor
            .execute(&FunctionCall {
                name: "schedule_meeting".to_string(),
                args: json!({ "title": "Dentist", "date": "2025-07-01", "time": "14:30" }),
            })
            .await;

        assert_eq!(outcome.action.unwrap().kind, ActionKind::Schedule);

        let items = ctx.store.list_schedule_items().await.unwrap();
        assert_eq!(items[0].reminder_lead_minutes, Some(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_quote_is_cached_within_ttl() {
        let ctx = test_context(vec![
            MockTransport::text_reply("Make it count. — Anonymous"),
            MockTransport::text_reply("A different quote"),
        ])
        .await;

        let first = fetch_daily_quote(&ctx).await.unwrap();
        let second = fetch_daily_quote(&ctx).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_refetched_after_ttl_expiry() {
        let ctx = test_context(vec![
            MockTransport::text_reply("first"),
            MockTransport::text_reply("second"),
        ])
        .await;

        assert_eq!(fetch_daily_quote(&ctx).await.unwrap(), "first");

        tokio::time::advance(crate::governor::QUOTE_TTL + std::time::Duration::from_secs(1)).await;

        assert_eq!(fetch_daily_quote(&ctx).await.unwrap(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_finances_summary_totals() {
        let ctx = test_context(vec![]).await;
        let executor = ToolExecutor::new(Arc::clone(&ctx));

        ctx.store
            .insert_transaction(Transaction::new(
                3000.0,
                TransactionKind::Income,
                "Salary".to_string(),
                "paycheck".to_string(),
            ))
            .await
            .unwrap();
        ctx.store
            .insert_transaction(Transaction::new(
                45.5,
                TransactionKind::Expense,
                "Food".to_string(),
                "groceries".to_string(),
            ))
            .await
            .unwrap();

        let outcome = executor
            .execute(&FunctionCall {
                name: "get_user_finances".to_string(),
                args: json!({ "period": "today" }),
            })
            .await;

        assert!(outcome.result.contains("transactions=2"));
        assert!(outcome.result.contains("income=3000.00"));
        assert!(outcome.result.contains("expense=45.50"));
        assert!(outcome.action.is_none());
    }
}
