//! Iterative QA orchestrator: researcher/fan-out/synthesize loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::embedding::{DEFAULT_TOP_K, EmbeddingPort};
use crate::error::{ProviderError, Result};
use crate::llm::{Agents, LlmModel, ResearcherDecision, SubQuestion};
use crate::storage::{Distance, VectorRow, VectorStore};

/// Instruction wrapped around each sub-question before it is embedded for
/// retrieval.
const QUERY_INSTRUCTION: &str = "Represent this question for retrieving relevant document passages";

/// Upper bound on simultaneously in-flight sub-question research tasks.
/// Implementation-defined per the concurrency model, but fixed at a value
/// comfortably above the required minimum of two.
const FANOUT_CONCURRENCY: usize = 4;

/// Result of one complete `run()`.
#[derive(Debug, Clone)]
pub struct QAPipelineResult {
    /// One researcher decision per iteration, in order.
    pub satisfactions: Vec<ResearcherDecision>,
    /// Sub-question text mapped to its researched answer.
    pub questions: HashMap<String, String>,
    /// Every row retrieved across every fan-out, in no particular order.
    pub used_context: Vec<VectorRow>,
    /// Number of loops that performed a fan-out (i.e. ended "not satisfied").
    pub iterations: usize,
    /// Total cost in dollars across every researcher, query-researcher, and
    /// main-agent call.
    pub cost: f64,
    /// The synthesized final answer. Empty only if the run was cancelled.
    pub final_answer: String,
}

/// Drives the researcher/fan-out/synthesize loop described by the QA
/// orchestrator contract.
pub struct Orchestrator {
    agents: Agents,
    embedding: Arc<dyn EmbeddingPort>,
    store: Arc<dyn VectorStore>,
    global_context: Option<String>,
    max_iterations: usize,
}

impl Orchestrator {
    /// Builds an orchestrator. `max_iterations` must be at least 1.
    #[must_use]
    pub fn new(
        agents: Agents,
        embedding: Arc<dyn EmbeddingPort>,
        store: Arc<dyn VectorStore>,
        global_context: Option<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            agents,
            embedding,
            store,
            global_context,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Runs the researcher/fan-out/synthesize loop for `query`.
    ///
    /// # Errors
    ///
    /// Returns a `Provider` error if the researcher call or the final
    /// synthesis call fails; individual sub-question failures during
    /// fan-out are recovered locally and do not fail the run.
    pub async fn run(&self, query: &str) -> Result<QAPipelineResult> {
        let mut satisfactions = Vec::new();
        let mut questions: HashMap<String, String> = HashMap::new();
        let mut used_context = Vec::new();
        let mut transcript = String::new();
        let mut iterations = 0usize;
        let cost = Arc::new(Mutex::new(0.0_f64));

        loop {
            let prompt = build_researcher_prompt(self.global_context.as_deref(), &transcript, query);
            let decision: ResearcherDecision = self
                .agents
                .researcher
                .generate_structured(&prompt, &ResearcherDecision::schema())
                .await?;
            add_cost(&cost, self.agents.researcher.cost());
            let satisfied = decision.satisfied;
            let pending_questions = decision.questions.clone();
            satisfactions.push(decision);

            if satisfied {
                break;
            }

            iterations += 1;
            let answered = self.fan_out(pending_questions, &cost).await;
            for (question_text, answer, rows) in answered {
                transcript.push_str(&format!("---\nQuestion: {question_text}\nAnswer: {answer}\n---\n\n"));
                questions.insert(question_text, answer);
                used_context.extend(rows);
            }

            if iterations >= self.max_iterations {
                break;
            }
        }

        let synth_prompt = format!("{transcript}\n\nUser Query: {query}");
        let final_answer = self.agents.main.generate_text(&synth_prompt, &[]).await?;
        add_cost(&cost, self.agents.main.cost());

        let cost = *cost.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        Ok(QAPipelineResult {
            satisfactions,
            questions,
            used_context,
            iterations,
            cost,
            final_answer: final_answer.trim().to_string(),
        })
    }

    /// Researches every sub-question concurrently, bounded by
    /// [`FANOUT_CONCURRENCY`]. A sub-question whose task fails is logged
    /// and omitted; the caller's loop proceeds with the rest.
    async fn fan_out(
        &self,
        sub_questions: Vec<SubQuestion>,
        cost: &Arc<Mutex<f64>>,
    ) -> Vec<(String, String, Vec<VectorRow>)> {
        let semaphore = Arc::new(Semaphore::new(FANOUT_CONCURRENCY));
        let mut set = JoinSet::new();

        for sub_question in sub_questions {
            let semaphore = Arc::clone(&semaphore);
            let embedding = Arc::clone(&self.embedding);
            let store = Arc::clone(&self.store);
            let query_researcher = self.agents.query_researcher.checkout();

            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("fan-out semaphore is never closed");
                research_sub_question(sub_question, embedding, store, query_researcher).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((question_text, answer, rows, call_cost))) => {
                    add_cost(cost, call_cost);
                    results.push((question_text, answer, rows));
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "sub-question research failed; omitting from transcript");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "sub-question task did not complete");
                }
            }
        }

        results
    }
}

async fn research_sub_question(
    sub_question: SubQuestion,
    embedding: Arc<dyn EmbeddingPort>,
    store: Arc<dyn VectorStore>,
    query_researcher: LlmModel,
) -> Result<(String, String, Vec<VectorRow>, f64)> {
    let embed_text = format!("{} {}", sub_question.question_text, sub_question.keywords.join(" "));
    let mut embedded = embedding
        .embed(&[embed_text.as_str()], Some(QUERY_INSTRUCTION))
        .await?;
    let query_vector = embedded.pop().ok_or_else(|| ProviderError::SchemaViolation {
        provider: "embedding".to_string(),
        reason: "embed() returned no vector for a single input".to_string(),
    })?;

    let retrieved = store.query(&query_vector, DEFAULT_TOP_K, Distance::Cosine)?;
    let context = retrieved
        .iter()
        .map(|r| format!("source:{}\n{}", r.row.file_name, r.row.content))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!("**Context:**\n{context}\n\nResearched Question: {}", sub_question.question_text);
    let answer = query_researcher.generate_text(&prompt, &[]).await?;
    let rows = retrieved.into_iter().map(|r| r.row).collect();

    Ok((
        sub_question.question_text,
        answer.trim().to_string(),
        rows,
        query_researcher.cost(),
    ))
}

fn build_researcher_prompt(global_context: Option<&str>, transcript: &str, query: &str) -> String {
    let mut prompt = String::new();
    if let Some(ctx) = global_context {
        prompt.push_str(ctx);
        prompt.push('\n');
    }
    prompt.push_str(transcript);
    prompt.push_str("\noriginal_user_question: ");
    prompt.push_str(query);
    prompt
}

fn add_cost(cost: &Arc<Mutex<f64>>, amount: f64) {
    let mut guard = cost.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard += amount;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::FallbackEmbedder;
    use crate::storage::SqliteVectorStore;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 0,
            "model": "test",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    fn one_row_store() -> Arc<dyn VectorStore> {
        let mut store = SqliteVectorStore::in_memory("docs", 4).unwrap();
        store
            .insert(VectorRow {
                id: None,
                embedding: vec![1.0, 0.0, 0.0, 0.0],
                file_name: "a.md".to_string(),
                file_position: 0,
                content: "some content".to_string(),
                metadata: BTreeMap::new(),
                updated_at: None,
            })
            .unwrap();
        Arc::new(store)
    }

    fn build_agents(base_url: &str) -> Agents {
        let main = LlmModel::new("main-model", base_url, "key", "prompt", 1.0, 1.0);
        let researcher = LlmModel::new("researcher-model", base_url, "key", "prompt", 1.0, 1.0);
        let query_researcher = LlmModel::new("query-researcher-model", base_url, "key", "prompt", 1.0, 1.0);
        Agents::new(main, researcher, query_researcher)
    }

    #[tokio::test]
    async fn early_satisfaction_performs_no_fanout() {
        let mock_server = MockServer::start().await;

        let decision = json!({
            "satisfied_reason": "fully covered",
            "satisfied": true,
            "reasoning": "",
            "questions": []
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "researcher-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&decision)))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "main-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("final answer text")))
            .mount(&mock_server)
            .await;

        let agents = build_agents(&mock_server.uri());
        let embedding: Arc<dyn EmbeddingPort> = Arc::new(FallbackEmbedder::new(4));
        let orchestrator = Orchestrator::new(agents, embedding, one_row_store(), None, 3);

        let result = orchestrator.run("what is the capital?").await.unwrap();

        assert_eq!(result.iterations, 0);
        assert_eq!(result.satisfactions.len(), 1);
        assert!(result.questions.is_empty());
        assert_eq!(result.final_answer, "final answer text");
    }

    #[tokio::test]
    async fn iteration_cap_bounds_researcher_calls() {
        let mock_server = MockServer::start().await;

        let decision = json!({
            "satisfied_reason": "still missing details",
            "satisfied": false,
            "reasoning": "need more",
            "questions": [
                {"question_text": "what is A?", "keywords": ["a"]},
                {"question_text": "what is B?", "keywords": ["b"]}
            ]
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "researcher-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&decision)))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "query-researcher-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("partial answer")))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "main-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("synthesized answer")))
            .mount(&mock_server)
            .await;

        let agents = build_agents(&mock_server.uri());
        let embedding: Arc<dyn EmbeddingPort> = Arc::new(FallbackEmbedder::new(4));
        let orchestrator = Orchestrator::new(agents, embedding, one_row_store(), None, 1);

        let result = orchestrator.run("what is the capital?").await.unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.satisfactions.len(), 1);
        assert_eq!(result.questions.len(), 2);
        assert!(!result.final_answer.is_empty());
    }
}
