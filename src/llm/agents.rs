//! The three-role agent bundle driving the QA orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{LlmModel, SchemaSpec};
use super::prompts::{MAIN_SYSTEM_PROMPT, QUERY_RESEARCHER_SYSTEM_PROMPT, RESEARCHER_SYSTEM_PROMPT};

/// One atomic sub-question the researcher wants answered, with keywords to
/// steer retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubQuestion {
    /// The sub-question text.
    pub question_text: String,
    /// Keywords to append to the retrieval query for this sub-question.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The researcher's structured satisfaction decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearcherDecision {
    /// Component-by-component analysis backing `satisfied`.
    pub satisfied_reason: String,
    /// Whether the accumulated context fully answers the original question.
    pub satisfied: bool,
    /// Present when `satisfied` is false: the specific information gaps.
    #[serde(default)]
    pub reasoning: String,
    /// Present when `satisfied` is false: targeted follow-up sub-questions.
    #[serde(default)]
    pub questions: Vec<SubQuestion>,
}

impl ResearcherDecision {
    /// The JSON schema used to constrain the researcher's structured output.
    #[must_use]
    pub fn schema() -> SchemaSpec {
        SchemaSpec {
            name: "researcher_decision".to_string(),
            schema: researcher_decision_schema(),
        }
    }
}

fn researcher_decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "satisfied_reason": { "type": "string" },
            "satisfied": { "type": "boolean" },
            "reasoning": { "type": "string" },
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question_text": { "type": "string" },
                        "keywords": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["question_text", "keywords"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["satisfied_reason", "satisfied", "reasoning", "questions"],
        "additionalProperties": false
    })
}

/// The three LLM roles used by the QA orchestrator, each carrying its own
/// fixed system prompt.
#[derive(Clone)]
pub struct Agents {
    /// Produces the final user-visible answer.
    pub main: LlmModel,
    /// Decides satisfaction and proposes sub-questions.
    pub researcher: LlmModel,
    /// Answers a single sub-question from retrieved context.
    pub query_researcher: LlmModel,
}

impl Agents {
    /// Wraps three models into an `Agents` bundle, overwriting each one's
    /// system prompt with its fixed role prompt.
    #[must_use]
    pub fn new(mut main: LlmModel, mut researcher: LlmModel, mut query_researcher: LlmModel) -> Self {
        main.set_system_prompt(MAIN_SYSTEM_PROMPT);
        researcher.set_system_prompt(RESEARCHER_SYSTEM_PROMPT);
        query_researcher.set_system_prompt(QUERY_RESEARCHER_SYSTEM_PROMPT);
        Self {
            main,
            researcher,
            query_researcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_question_defaults_keywords_when_absent() {
        let parsed: SubQuestion = serde_json::from_str(r#"{"question_text": "what is x?"}"#).unwrap();
        assert!(parsed.keywords.is_empty());
    }

    #[test]
    fn researcher_decision_round_trips() {
        let decision = ResearcherDecision {
            satisfied_reason: "covers A but not B".to_string(),
            satisfied: false,
            reasoning: "B is undefined".to_string(),
            questions: vec![SubQuestion {
                question_text: "what is B?".to_string(),
                keywords: vec!["b".to_string()],
            }],
        };
        let json = serde_json::to_string(&decision).unwrap();
        let round_tripped: ResearcherDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, round_tripped);
    }

    #[test]
    fn schema_requires_core_fields() {
        let schema = ResearcherDecision::schema();
        let required = schema.schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "satisfied"));
        assert!(required.iter().any(|v| v == "questions"));
    }
}
