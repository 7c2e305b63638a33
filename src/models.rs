//! Core data models for the personal assistant

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Calm,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Transaction,
    Schedule,
    Journal,
    Quote,
    Search,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// Named behavioral profile. Alters the system instruction given to the
/// model; never the tool catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    GeneralAssistant,
    FinancialAdvisor,
    WellnessCoach,
    ProductivityPlanner,
}

impl Persona {
    pub fn tag(&self) -> &'static str {
        match self {
            Persona::GeneralAssistant => "general_assistant",
            Persona::FinancialAdvisor => "financial_advisor",
            Persona::WellnessCoach => "wellness_coach",
            Persona::ProductivityPlanner => "productivity_planner",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "financial_advisor" | "financial-advisor" | "finance" => Persona::FinancialAdvisor,
            "wellness_coach" | "wellness-coach" | "wellness" => Persona::WellnessCoach,
            "productivity_planner" | "productivity-planner" | "productivity" => {
                Persona::ProductivityPlanner
            }
            _ => Persona::GeneralAssistant,
        }
    }

    /// Persona-specific behavioral rules injected into the system instruction.
    pub fn behavior_rules(&self) -> &'static str {
        match self {
            Persona::GeneralAssistant => {
                "You are a warm, practical personal assistant. Answer concisely \
                 and use the available tools whenever the user asks you to record \
                 or look up their personal data."
            }
            Persona::FinancialAdvisor => {
                "You are a careful financial advisor. Track income and expenses \
                 precisely, quote amounts with two decimals, and encourage \
                 budgeting discipline. Use the transaction and finance tools for \
                 anything money related."
            }
            Persona::WellnessCoach => {
                "You are a supportive wellness coach. Pay attention to the user's \
                 mood, suggest journaling, and keep an encouraging tone. Use the \
                 journal tools to record and review how the user feels."
            }
            Persona::ProductivityPlanner => {
                "You are an organized productivity planner. Keep the user's \
                 schedule tidy, confirm dates and times explicitly, and use the \
                 scheduling tools for every meeting or reminder request."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Persona::GeneralAssistant => "General Assistant",
            Persona::FinancialAdvisor => "Financial Advisor",
            Persona::WellnessCoach => "Wellness Coach",
            Persona::ProductivityPlanner => "Productivity Planner",
        };
        write!(f, "{}", s)
    }
}

/// Summary window token accepted by the aggregate-read tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    ThisWeek,
    ThisMonth,
    LastMonth,
    All,
}

impl Period {
    /// Parse a period token. Unknown tokens fall back to `All`.
    pub fn parse_token(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "today" => Period::Today,
            "this_week" | "week" => Period::ThisWeek,
            "this_month" | "month" => Period::ThisMonth,
            "last_month" => Period::LastMonth,
            _ => Period::All,
        }
    }

    /// Whether a timestamp falls inside this window relative to `now`.
    pub fn contains(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.contains_date(at.date_naive(), now.date_naive())
    }

    /// Whether a calendar date falls inside this window relative to `today`.
    pub fn contains_date(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Period::Today => date == today,
            Period::ThisWeek => {
                date.iso_week() == today.iso_week()
            }
            Period::ThisMonth => date.year() == today.year() && date.month() == today.month(),
            Period::LastMonth => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                date.year() == year && date.month() == month
            }
            Period::All => true,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Today => "today",
            Period::ThisWeek => "this_week",
            Period::ThisMonth => "this_month",
            Period::LastMonth => "last_month",
            Period::All => "all",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Persisted Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Always positive; the kind carries the sign.
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        amount: f64,
        kind: TransactionKind,
        category: String,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            kind,
            category,
            description,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    /// HH:MM within `date`.
    pub time: NaiveTime,
    /// Advisory only; never enforced by the store.
    pub reminder_lead_minutes: Option<u32>,
}

impl ScheduleItem {
    /// The single instant this item starts at.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub content: String,
    pub mood: Mood,
    pub occurred_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(content: String, mood: Mood) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            mood,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
    pub persona_tag: Option<String>,
}

impl ChatMessage {
    pub fn user(text: String, persona: Persona) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            from_user: true,
            timestamp: Utc::now(),
            persona_tag: Some(persona.tag().to_string()),
        }
    }

    pub fn assistant(text: String, persona: Persona) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            from_user: false,
            timestamp: Utc::now(),
            persona_tag: Some(persona.tag().to_string()),
        }
    }
}

//
// ================= Transient Types =================
//

/// One turn of prior conversation handed to `send_message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// Produced once per successfully interpreted tool call during one
/// orchestration turn; surfaced to the caller and then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticAction {
    pub kind: ActionKind,
    pub payload: serde_json::Value,
    pub executed: bool,
}

impl AgenticAction {
    pub fn executed(kind: ActionKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            executed: true,
        }
    }
}

/// Final result of one `send_message` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub text: String,
    pub actions: Vec<AgenticAction>,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_token_parsing() {
        assert_eq!(Period::parse_token("today"), Period::Today);
        assert_eq!(Period::parse_token("THIS_WEEK"), Period::ThisWeek);
        assert_eq!(Period::parse_token("last_month"), Period::LastMonth);
        assert_eq!(Period::parse_token("whenever"), Period::All);
        assert_eq!(Period::parse_token(""), Period::All);
    }

    #[test]
    fn test_last_month_wraps_year() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let december = NaiveDate::from_ymd_opt(2024, 12, 3).unwrap();
        let november = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();

        assert!(Period::LastMonth.contains_date(december, today));
        assert!(!Period::LastMonth.contains_date(november, today));
    }

    #[test]
    fn test_mood_serde_round_trip() {
        let json = serde_json::to_string(&Mood::Energetic).unwrap();
        assert_eq!(json, "\"energetic\"");
        let mood: Mood = serde_json::from_str("\"calm\"").unwrap();
        assert_eq!(mood, Mood::Calm);
    }

    #[test]
    fn test_schedule_item_instant() {
        let item = ScheduleItem {
            id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            reminder_lead_minutes: Some(15),
        };
        assert_eq!(item.starts_at().to_string(), "2025-03-10 09:30:00");
    }

    #[test]
    fn test_persona_from_tag_fallback() {
        assert_eq!(Persona::from_tag("financial_advisor"), Persona::FinancialAdvisor);
        assert_eq!(Persona::from_tag("unknown"), Persona::GeneralAssistant);
    }
}
