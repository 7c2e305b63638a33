//! Orchestrator - the agentic tool-calling loop
//!
//! Drives a multi-round exchange with the model: send the utterance with the
//! tool catalog, execute any requested calls, feed the results back, repeat
//! until the model answers in plain text. Remote faults never reach the
//! caller raw; they are converted into user-facing replies at this boundary.

use crate::context::AssistantContext;
use crate::error::AssistantError;
use crate::execution::ToolExecutor;
use crate::gemini::{Content, FunctionResponse, ModelRequest};
use crate::governor::QUOTA_COOLDOWN;
use crate::models::{ChatMessage, ChatOutcome, ConversationTurn, Persona, TurnRole};
use crate::tools::declarations;
use crate::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A single turn may span several request/response rounds while the model
/// keeps requesting tool calls; chained calls must go through further rounds.
pub const MAX_TOOL_ROUNDS: u32 = 4;

pub struct Orchestrator {
    ctx: Arc<AssistantContext>,
    executor: ToolExecutor,
}

impl Orchestrator {
    pub fn new(ctx: Arc<AssistantContext>) -> Self {
        Self {
            executor: ToolExecutor::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub async fn send_message(
        &self,
        utterance: &str,
        persona: Persona,
        history: &[ConversationTurn],
    ) -> Result<ChatOutcome> {
        self.send_message_with_cancel(utterance, persona, history, &CancellationToken::new())
            .await
    }

    /// Run one orchestration turn. Transport, quota, and auth faults are
    /// degraded into explanatory replies; storage faults and cancellation
    /// propagate to the caller.
    pub async fn send_message_with_cancel(
        &self,
        utterance: &str,
        persona: Persona,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome> {
        info!(persona = persona.tag(), "Orchestrator: handling message");

        let outcome = match self.drive(utterance, persona, history, cancel).await {
            Ok(outcome) => outcome,
            Err(AssistantError::Cancelled) => return Err(AssistantError::Cancelled),
            Err(
                error @ (AssistantError::StorageUnavailable | AssistantError::StorageError(_)),
            ) => return Err(error),
            Err(error) => {
                return Ok(ChatOutcome {
                    text: self.degrade(error).await,
                    actions: vec![],
                })
            }
        };

        // Required side effect of a successful call; retention applies.
        self.ctx
            .store
            .insert_chat_message(ChatMessage::user(utterance.to_string(), persona))
            .await?;
        self.ctx
            .store
            .insert_chat_message(ChatMessage::assistant(outcome.text.clone(), persona))
            .await?;

        Ok(outcome)
    }

    async fn drive(
        &self,
        utterance: &str,
        persona: Persona,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome> {
        let normalized = normalize_history(history);
        let mut contents: Vec<Content> = normalized
            .iter()
            .map(|turn| match turn.role {
                TurnRole::User => Content::user_text(turn.text.clone()),
                TurnRole::Model => Content::model_text(turn.text.clone()),
            })
            .collect();
        contents.push(Content::user_text(utterance.to_string()));

        let system_instruction = build_system_instruction(persona, Utc::now());
        let tools = declarations();

        self.ctx.governor.acquire_permit_with_cancel(cancel).await?;
        let mut reply = self
            .ctx
            .transport
            .generate(ModelRequest {
                system_instruction: system_instruction.clone(),
                tools: tools.clone(),
                contents: contents.clone(),
            })
            .await?;

        let mut actions = Vec::new();
        let mut rounds = 0u32;

        while !reply.tool_calls.is_empty() {
            rounds += 1;
            if rounds > MAX_TOOL_ROUNDS {
                warn!(rounds, "Tool-call round limit reached; answering with last reply");
                break;
            }
            if cancel.is_cancelled() {
                return Err(AssistantError::Cancelled);
            }

            let requested = reply.tool_calls.clone();
            debug!(round = rounds, calls = requested.len(), "Executing tool-call round");

            // Calls within a round are independent; run them concurrently.
            // join_all keeps the outcomes in request order so the model can
            // correlate results to calls by position and name.
            let outcomes = join_all(requested.iter().map(|call| self.executor.execute(call))).await;

            let mut responses = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                if let Some(action) = outcome.action {
                    actions.push(action);
                }
                responses.push(FunctionResponse {
                    name: outcome.name,
                    response: json!({ "result": outcome.result }),
                });
            }

            contents.push(Content::model_calls(requested));
            contents.push(Content::function_responses(responses));

            self.ctx.governor.acquire_permit_with_cancel(cancel).await?;
            reply = self
                .ctx
                .transport
                .generate(ModelRequest {
                    system_instruction: system_instruction.clone(),
                    tools: tools.clone(),
                    contents: contents.clone(),
                })
                .await?;
        }

        Ok(ChatOutcome {
            text: reply.text,
            actions,
        })
    }

    /// Convert a remote fault into the user-facing reply. No retry happens
    /// here; a quota signal only installs the cooldown the next call waits on.
    async fn degrade(&self, error: AssistantError) -> String {
        match error {
            AssistantError::QuotaExhausted(detail) => {
                warn!(detail = %detail, "Quota exhausted; installing cooldown");
                self.ctx.governor.set_cooldown(QUOTA_COOLDOWN).await;
                "I've hit the request limit for the moment. Please wait a minute \
                 and try again."
                    .to_string()
            }
            AssistantError::AuthRejected(_) | AssistantError::MissingApiKey => {
                "The assistant isn't configured correctly: the model API key is \
                 missing or was rejected. Please check the GEMINI_API_KEY setting."
                    .to_string()
            }
            other => {
                warn!(error = %other, "Model request failed");
                format!(
                    "Sorry, I couldn't reach the assistant service ({}). Please try again.",
                    truncate(&other.to_string(), 120)
                )
            }
        }
    }
}

/// Repair a caller-supplied history: a valid exchange starts with a user
/// turn and strictly alternates. Offending turns are dropped, never rejected.
pub fn normalize_history(history: &[ConversationTurn]) -> Vec<ConversationTurn> {
    let mut normalized: Vec<ConversationTurn> = Vec::with_capacity(history.len());

    for turn in history {
        match normalized.last() {
            None => {
                if turn.role == TurnRole::User {
                    normalized.push(turn.clone());
                }
            }
            Some(previous) => {
                if previous.role != turn.role {
                    normalized.push(turn.clone());
                }
            }
        }
    }

    normalized
}

fn build_system_instruction(persona: Persona, now: DateTime<Utc>) -> String {
    format!(
        "{}\n\nCurrent date and time: {}.\n\
         Use the declared tools to read or change the user's records instead of \
         guessing. When a tool result comes back, answer with a short, friendly \
         confirmation of what was done.",
        persona.behavior_rules(),
        now.format("%A, %Y-%m-%d %H:%M UTC")
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
