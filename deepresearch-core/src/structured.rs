//! Structured judgments requested from the text-generation provider.
//!
//! Each judgment type declares the field list appended to its prompt and a
//! fixed default used whenever the reply cannot be decoded. Decoding is strict:
//! the reply must be a JSON object and every declared field must be present
//! with the right JSON type. Unknown fields are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A schema the provider is asked to answer in JSON.
pub trait StructuredOutput: DeserializeOwned + Sized {
    /// Name used in logs.
    const NAME: &'static str;

    /// Field names and type descriptions listed in the prompt.
    fn schema() -> &'static [(&'static str, &'static str)];

    /// Safe value used when the reply is malformed or the call failed.
    fn fallback(prompt: &str) -> Self;
}

/// Whether the clarify stage needs more input from the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyWithUser {
    pub need_clarification: bool,
    pub question: String,
    pub verification: String,
}

impl StructuredOutput for ClarifyWithUser {
    const NAME: &'static str = "ClarifyWithUser";

    fn schema() -> &'static [(&'static str, &'static str)] {
        &[
            ("need_clarification", "boolean"),
            ("question", "string"),
            ("verification", "string"),
        ]
    }

    fn fallback(_prompt: &str) -> Self {
        Self {
            need_clarification: true,
            question: "Could you provide more details?".to_string(),
            verification: String::new(),
        }
    }
}

/// The research brief distilled from the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub research_brief: String,
    pub reasoning: String,
}

impl StructuredOutput for ResearchQuestion {
    const NAME: &'static str = "ResearchQuestion";

    fn schema() -> &'static [(&'static str, &'static str)] {
        &[("research_brief", "string"), ("reasoning", "string")]
    }

    fn fallback(prompt: &str) -> Self {
        Self {
            research_brief: prompt.to_string(),
            reasoning: String::new(),
        }
    }
}

/// Search queries and topics planned from the brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub search_queries: Vec<String>,
    pub key_topics: Vec<String>,
    pub planning_reasoning: String,
}

impl StructuredOutput for ResearchPlan {
    const NAME: &'static str = "ResearchPlan";

    fn schema() -> &'static [(&'static str, &'static str)] {
        &[
            ("search_queries", "list of strings"),
            ("key_topics", "list of strings"),
            ("planning_reasoning", "string"),
        ]
    }

    fn fallback(_prompt: &str) -> Self {
        Self {
            search_queries: vec!["general search".to_string()],
            key_topics: vec!["main topic".to_string()],
            planning_reasoning: String::new(),
        }
    }
}

/// The reviewer's verdict on a draft report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub needs_revision: bool,
    pub critique_reasoning: String,
    pub specific_issues: Vec<String>,
    pub improvements: Vec<String>,
}

impl StructuredOutput for Critique {
    const NAME: &'static str = "Critique";

    fn schema() -> &'static [(&'static str, &'static str)] {
        &[
            ("needs_revision", "boolean"),
            ("critique_reasoning", "string"),
            ("specific_issues", "list of strings"),
            ("improvements", "list of strings"),
        ]
    }

    fn fallback(_prompt: &str) -> Self {
        Self {
            needs_revision: false,
            critique_reasoning: String::new(),
            specific_issues: Vec::new(),
            improvements: Vec::new(),
        }
    }
}

impl Critique {
    /// Render the critique as feedback for the next writer pass.
    pub fn to_feedback(&self) -> String {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|item| format!("- {}", item))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Issues identified:\n{}\n\nImprovements needed:\n{}\n\nReasoning: {}",
            bullets(&self.specific_issues),
            bullets(&self.improvements),
            self.critique_reasoning
        )
    }
}

/// Append the JSON field list for `T` to a prompt.
pub fn schema_prompt<T: StructuredOutput>(prompt: &str) -> String {
    let fields = T::schema()
        .iter()
        .map(|(name, ty)| format!("- {}: {}", name, ty))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\n\nRespond in JSON format with these fields:\n{}",
        prompt, fields
    )
}

/// Pull the JSON payload out of a reply.
///
/// Prefers a ```` ```json ```` fence, then any ```` ``` ```` fence, then the whole text.
/// An unterminated fence runs to the end of the reply.
pub fn extract_json(text: &str) -> &str {
    let fenced = if let Some((_, rest)) = text.split_once("```json") {
        Some(rest)
    } else {
        text.split_once("```").map(|(_, rest)| rest)
    };

    match fenced {
        Some(rest) => rest.split("```").next().unwrap_or(rest).trim(),
        None => text.trim(),
    }
}

/// Strictly decode a reply as `T`.
///
/// Arrays and scalars are rejected even when their elements would line up with
/// the declared fields.
pub fn try_parse_structured<T: StructuredOutput>(text: &str) -> Result<T, serde_json::Error> {
    match serde_json::from_str::<serde_json::Value>(extract_json(text))? {
        serde_json::Value::Object(map) => serde_json::from_value(serde_json::Value::Object(map)),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Decode a reply as `T`, falling back to `T::fallback(prompt)` on any error.
pub fn parse_structured<T: StructuredOutput>(text: &str, prompt: &str) -> T {
    match try_parse_structured::<T>(text) {
        Ok(value) => {
            debug!(schema = T::NAME, fallback = false, "Parsed structured output");
            value
        }
        Err(e) => {
            warn!(
                schema = T::NAME,
                fallback = true,
                error = %e,
                "Malformed structured output, using default"
            );
            T::fallback(prompt)
        }
    }
}
