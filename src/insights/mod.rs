//! Insight generators
//!
//! Read-only summaries over the stored records, phrased by the model. Each
//! generator aggregates locally first and only spends a permit when there is
//! something to comment on; empty stores get a local reply for free.

use crate::context::AssistantContext;
use crate::execution::fetch_daily_quote;
use crate::gemini::{Content, ModelRequest};
use crate::models::{Mood, Period, TransactionKind};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::info;

/// A short model-phrased commentary on the user's finances this month.
pub async fn financial_health(ctx: &AssistantContext) -> Result<String> {
    let transactions = ctx.store.list_transactions().await?;
    let now = Utc::now();
    let recent: Vec<_> = transactions
        .iter()
        .filter(|t| Period::ThisMonth.contains(t.occurred_at, now))
        .collect();

    if recent.is_empty() {
        return Ok(
            "I don't have any transactions logged this month yet. Log a few and \
             I'll tell you how things look."
                .to_string(),
        );
    }

    let mut income = 0.0;
    let mut expenses = 0.0;
    let mut by_category: HashMap<&str, f64> = HashMap::new();
    for transaction in &recent {
        match transaction.kind {
            TransactionKind::Income => income += transaction.amount,
            TransactionKind::Expense => {
                expenses += transaction.amount;
                *by_category.entry(transaction.category.as_str()).or_default() +=
                    transaction.amount;
            }
        }
    }

    let mut categories: Vec<_> = by_category.into_iter().collect();
    categories.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut digest = format!(
        "This month: income {:.2}, expenses {:.2}, net {:.2}, across {} transactions.\n",
        income,
        expenses,
        income - expenses,
        recent.len()
    );
    for (category, total) in categories.iter().take(5) {
        let _ = writeln!(digest, "- {}: {:.2} spent", category, total);
    }

    info!(transactions = recent.len(), "Generating financial health insight");
    phrase(
        ctx,
        "You are a supportive financial advisor. Given this spending digest, give \
         the user a short assessment of their financial health with one or two \
         concrete suggestions. Keep it under 120 words.",
        &digest,
    )
    .await
}

/// Commentary on the mood distribution of recent journal entries.
pub async fn mood_trend(ctx: &AssistantContext) -> Result<String> {
    let entries = ctx.store.list_journal_entries().await?;
    if entries.is_empty() {
        return Ok(
            "There are no journal entries yet. Write a few and I'll reflect your \
             mood trend back to you."
                .to_string(),
        );
    }

    let mut tally: HashMap<Mood, usize> = HashMap::new();
    for entry in entries.iter().take(30) {
        *tally.entry(entry.mood).or_default() += 1;
    }

    let mut digest = format!("Last {} journal entries by mood:\n", entries.len().min(30));
    let mut moods: Vec<_> = tally.into_iter().collect();
    moods.sort_by(|a, b| b.1.cmp(&a.1));
    for (mood, count) in moods {
        let _ = writeln!(digest, "- {:?}: {}", mood, count);
    }
    if let Some(latest) = entries.first() {
        let _ = writeln!(
            digest,
            "Most recent entry ({:?}): {}",
            latest.mood,
            snippet(&latest.content, 120)
        );
    }

    info!("Generating mood trend insight");
    phrase(
        ctx,
        "You are an empathetic wellness coach. Given this mood digest, describe the \
         user's recent emotional trend kindly and suggest one small wellbeing habit. \
         Keep it under 100 words.",
        &digest,
    )
    .await
}

/// Planning tips over the upcoming schedule.
pub async fn schedule_tips(ctx: &AssistantContext) -> Result<String> {
    let items = ctx.store.list_schedule_items().await?;
    let today = Utc::now().date_naive();
    let upcoming: Vec<_> = items.iter().filter(|item| item.date >= today).collect();

    if upcoming.is_empty() {
        return Ok(
            "Your schedule is clear. Add a few meetings or events and I'll help you \
             plan around them."
                .to_string(),
        );
    }

    let mut digest = format!("{} upcoming items:\n", upcoming.len());
    for item in upcoming.iter().take(10) {
        let _ = writeln!(digest, "- {} {} {}", item.date, item.time, item.title);
    }

    info!(upcoming = upcoming.len(), "Generating schedule insight");
    phrase(
        ctx,
        "You are a pragmatic productivity planner. Given this upcoming schedule, \
         point out crowded days or gaps and give one or two planning tips. Keep it \
         under 100 words.",
        &digest,
    )
    .await
}

/// Today's quote, shared with the tool path; a cached quote costs nothing.
pub async fn daily_quote(ctx: &AssistantContext) -> Result<String> {
    fetch_daily_quote(ctx).await
}

async fn phrase(ctx: &AssistantContext, instruction: &str, digest: &str) -> Result<String> {
    ctx.governor.acquire_permit().await?;
    let reply = ctx
        .transport
        .generate(ModelRequest {
            system_instruction: instruction.to_string(),
            tools: vec![],
            contents: vec![Content::user_text(digest.to_string())],
        })
        .await?;
    Ok(reply.text)
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{MockTransport, ModelTransport};
    use crate::governor::RateGovernor;
    use crate::models::{JournalEntry, Transaction};
    use crate::store::RecordStore;
    use std::sync::Arc;

    async fn context_with(
        script: Vec<Result<crate::gemini::ModelReply>>,
    ) -> (Arc<AssistantContext>, Arc<MockTransport>) {
        let store = Arc::new(RecordStore::in_memory());
        store.initialize().await.unwrap();
        let transport = Arc::new(MockTransport::new(script));
        let ctx = AssistantContext::new(
            store,
            Arc::new(RateGovernor::new()),
            Arc::clone(&transport) as Arc<dyn ModelTransport>,
        );
        (ctx, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_financial_health_empty_store_skips_model() {
        let (ctx, transport) = context_with(vec![]).await;

        let text = financial_health(&ctx).await.unwrap();
        assert!(text.contains("transactions"));
        assert!(transport.requests.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_financial_health_sends_monthly_digest() {
        let (ctx, transport) =
            context_with(vec![MockTransport::text_reply("Looking healthy!")]).await;

        ctx.store
            .insert_transaction(Transaction::new(
                3000.0,
                TransactionKind::Income,
                "Salary".to_string(),
                String::new(),
            ))
            .await
            .unwrap();
        ctx.store
            .insert_transaction(Transaction::new(
                250.0,
                TransactionKind::Expense,
                "Food".to_string(),
                "lunch".to_string(),
            ))
            .await
            .unwrap();

        let text = financial_health(&ctx).await.unwrap();
        assert_eq!(text, "Looking healthy!");

        let requests = transport.requests.lock().await;
        let digest = requests[0].contents[0].parts[0].text.as_ref().unwrap();
        assert!(digest.contains("income 3000.00"));
        assert!(digest.contains("expenses 250.00"));
        assert!(digest.contains("net 2750.00"));
        assert!(digest.contains("Food"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mood_trend_tallies_entries() {
        let (ctx, transport) =
            context_with(vec![MockTransport::text_reply("Mostly upbeat lately.")]).await;

        for mood in [Mood::Happy, Mood::Happy, Mood::Sad] {
            ctx.store
                .insert_journal_entry(JournalEntry::new("entry".to_string(), mood))
                .await
                .unwrap();
        }

        let text = mood_trend(&ctx).await.unwrap();
        assert_eq!(text, "Mostly upbeat lately.");

        let requests = transport.requests.lock().await;
        let digest = requests[0].contents[0].parts[0].text.as_ref().unwrap();
        assert!(digest.contains("Happy: 2"));
        assert!(digest.contains("Sad: 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_tips_empty_store_skips_model() {
        let (ctx, transport) = context_with(vec![]).await;

        let text = schedule_tips(&ctx).await.unwrap();
        assert!(text.contains("clear"));
        assert!(transport.requests.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_quote_uses_shared_cache() {
        let (ctx, transport) =
            context_with(vec![MockTransport::text_reply("Stay curious.")]).await;

        assert_eq!(daily_quote(&ctx).await.unwrap(), "Stay curious.");
        assert_eq!(daily_quote(&ctx).await.unwrap(), "Stay curious.");
        assert_eq!(transport.requests.lock().await.len(), 1);
    }
}
