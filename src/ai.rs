//! AI orchestration layer.
//!
//! Translates user intents (expand a concept, extract concepts from text,
//! suggest relations, ask a question, summarize a selection) into requests to
//! an external text-generation service and normalizes the structured replies
//! into graph-model shapes.
//!
//! The layer validates inputs before dispatch, performs no retries, and
//! converts every downstream problem into a [`GenerationError`] so that
//! callers never see transport-level errors. Malformed replies (missing
//! required keys) are rejected here and never reach the graph model.

use crate::constants::{LAYOUT_COLUMN_SPACING, LAYOUT_ROW_SPACING, SUGGESTION_RING_RADIUS};
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Fixed reply for a summarization request with no content; returned without
/// contacting the generation service.
pub const EMPTY_SUMMARY_MESSAGE: &str = "No content provided for summarization.";

/// Failures originating at the text-generation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The request failed validation and was never dispatched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The external call itself failed (transport, non-success status).
    #[error("generation service failed: {0}")]
    ServiceFailure(String),
    /// The service replied, but the reply is missing required keys or has the
    /// wrong shape.
    #[error("malformed generation reply: {0}")]
    MalformedReply(String),
}

/// A typed request to the generation boundary: operation tag plus the
/// operation-specific payload, serialized as the wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GenerationRequest {
    /// Propose sub-concepts (and relations) around a single concept.
    ExpandConcept {
        /// Label of the concept to expand
        concept: String,
        /// Optional details giving the generator more context
        details: Option<String>,
    },
    /// Extract concepts and relations from free-text excerpts.
    ExtractConcepts {
        /// Non-empty list of text excerpts
        excerpts: Vec<String>,
    },
    /// Propose relations between already-known concepts.
    SuggestRelations {
        /// The concept to relate from
        concept: String,
        /// Optional free-text refinement of what kind of relations to find
        refinement: Option<String>,
        /// Labels of the concepts already on the map
        known_concepts: Vec<String>,
    },
    /// Ask a free-text question about one concept.
    AskQuestion {
        /// Label of the concept the question is about
        node_label: String,
        /// Optional details of that concept
        details: Option<String>,
        /// The question itself
        question: String,
    },
    /// Summarize a selection of node contents.
    Summarize {
        /// List of node content excerpts
        excerpts: Vec<String>,
    },
}

/// Successful payload of a completed generation, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPayload {
    /// Candidate nodes/edges ready for the staging buffer
    Candidates(MapData),
    /// Answer to a question
    Answer(String),
    /// Summary of a selection
    Summary(String),
}

/// The transport seam to the external text-generation service.
///
/// Implementations send the request in whatever wire format the service
/// expects and return the parsed JSON reply. They do not interpret the reply;
/// normalization happens in [`Orchestrator`].
pub trait TextGenerator: Send {
    /// Performs one generation call.
    fn generate(&mut self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// HTTP transport to a generation endpoint, native builds only.
///
/// Posts the request as JSON and expects a JSON reply. Uses a blocking client
/// because generation calls are dispatched on blocking worker tasks.
#[cfg(not(target_arch = "wasm32"))]
pub struct HttpTextGenerator {
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[cfg(not(target_arch = "wasm32"))]
impl HttpTextGenerator {
    /// Creates a generator posting to the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TextGenerator for HttpTextGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| GenerationError::ServiceFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GenerationError::ServiceFailure(format!(
                "endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<Value>()
            .map_err(|e| GenerationError::MalformedReply(e.to_string()))
    }
}

/// Request/response glue between user intents and the generation boundary.
pub struct Orchestrator {
    generator: Box<dyn TextGenerator>,
}

impl Orchestrator {
    /// Creates an orchestrator over the given transport.
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Proposes sub-concepts around `origin`, returning candidate nodes and
    /// edges positioned in a ring around the origin node.
    ///
    /// Reply contract: `{"concepts": [{"label", "details"?, "kind"?}, ...],
    /// "relations"?: [{"source", "target", "label"}, ...]}` where relation
    /// endpoints name concept labels (the origin's label included).
    pub fn expand_concept(&mut self, origin: &ConceptNode) -> Result<MapData, GenerationError> {
        if origin.label.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "concept label must not be empty".to_string(),
            ));
        }

        let request = GenerationRequest::ExpandConcept {
            concept: origin.label.clone(),
            details: origin.details.clone(),
        };
        let reply = self.generator.generate(&request)?;
        let concepts = parse_concepts(&reply)?;

        let mut candidates = MapData::new();
        let mut labels: HashMap<String, NodeId> = HashMap::new();
        labels.insert(origin.label.clone(), origin.id);

        let count = concepts.len().max(1);
        for (i, concept) in concepts.iter().enumerate() {
            let angle = std::f32::consts::TAU * i as f32 / count as f32;
            let position = (
                origin.position.0 + SUGGESTION_RING_RADIUS * angle.cos(),
                origin.position.1 + SUGGESTION_RING_RADIUS * angle.sin(),
            );
            let mut node = ConceptNode::new(concept.label.clone(), position, concept.kind.clone());
            node.details = concept.details.clone();
            labels.insert(node.label.clone(), node.id);
            candidates.nodes.insert(node.id, node);
        }

        // When the reply carries no explicit relations, anchor every proposed
        // concept to the origin so the expansion stays connected.
        match parse_relations(&reply)? {
            Some(relations) => {
                attach_relations(&mut candidates, &relations, &labels);
            }
            None => {
                let ids: Vec<NodeId> = candidates.nodes.keys().copied().collect();
                for id in ids {
                    let edge = ConceptEdge::new(origin.id, id, "relates to");
                    candidates.edges.insert(edge.id, edge);
                }
            }
        }

        Ok(candidates)
    }

    /// Extracts concepts and relations from free-text excerpts, positioning
    /// candidate nodes in a grid anchored at `anchor`.
    pub fn extract_concepts(
        &mut self,
        excerpts: &[String],
        anchor: (f32, f32),
    ) -> Result<MapData, GenerationError> {
        if excerpts.iter().all(|e| e.trim().is_empty()) {
            return Err(GenerationError::InvalidRequest(
                "at least one non-empty excerpt is required".to_string(),
            ));
        }

        let request = GenerationRequest::ExtractConcepts {
            excerpts: excerpts.to_vec(),
        };
        let reply = self.generator.generate(&request)?;
        let concepts = parse_concepts(&reply)?;

        let mut candidates = MapData::new();
        let mut labels: HashMap<String, NodeId> = HashMap::new();
        let columns = (concepts.len() as f32).sqrt().ceil().max(1.0) as usize;
        for (i, concept) in concepts.iter().enumerate() {
            let col = i % columns;
            let row = i / columns;
            let position = (
                anchor.0 + col as f32 * LAYOUT_COLUMN_SPACING,
                anchor.1 + row as f32 * LAYOUT_ROW_SPACING,
            );
            let mut node = ConceptNode::new(concept.label.clone(), position, concept.kind.clone());
            node.details = concept.details.clone();
            labels.insert(node.label.clone(), node.id);
            candidates.nodes.insert(node.id, node);
        }

        if let Some(relations) = parse_relations(&reply)? {
            attach_relations(&mut candidates, &relations, &labels);
        }

        Ok(candidates)
    }

    /// Proposes relations between concepts already on the map.
    ///
    /// Reply contract: `{"relations": [{"source", "target", "label"}, ...]}`
    /// with endpoints naming committed node labels. Relations whose endpoints
    /// match no committed label are dropped from the candidate set.
    pub fn suggest_relations(
        &mut self,
        concept: &str,
        refinement: Option<&str>,
        map: &MapData,
    ) -> Result<MapData, GenerationError> {
        if concept.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "concept label must not be empty".to_string(),
            ));
        }

        let known_concepts: Vec<String> = map.nodes.values().map(|n| n.label.clone()).collect();
        let request = GenerationRequest::SuggestRelations {
            concept: concept.to_string(),
            refinement: refinement.map(str::to_string),
            known_concepts,
        };
        let reply = self.generator.generate(&request)?;
        let relations = parse_relations(&reply)?.ok_or_else(|| {
            GenerationError::MalformedReply("missing required key 'relations'".to_string())
        })?;

        let labels: HashMap<String, NodeId> = map
            .nodes
            .values()
            .map(|n| (n.label.clone(), n.id))
            .collect();
        let mut candidates = MapData::new();
        attach_relations(&mut candidates, &relations, &labels);
        Ok(candidates)
    }

    /// Asks a free-text question about one concept; the reply must carry an
    /// `"answer"` string.
    pub fn ask_question(
        &mut self,
        node_label: &str,
        details: Option<&str>,
        question: &str,
    ) -> Result<String, GenerationError> {
        if question.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }
        if node_label.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "concept label must not be empty".to_string(),
            ));
        }

        let request = GenerationRequest::AskQuestion {
            node_label: node_label.to_string(),
            details: details.map(str::to_string),
            question: question.to_string(),
        };
        let reply = self.generator.generate(&request)?;
        string_field(&reply, "answer")
    }

    /// Summarizes a selection of node contents; the reply must carry a
    /// `"summary"` string.
    ///
    /// An empty excerpt list short-circuits to [`EMPTY_SUMMARY_MESSAGE`]
    /// without contacting the service.
    pub fn summarize(&mut self, excerpts: &[String]) -> Result<String, GenerationError> {
        if excerpts.is_empty() {
            return Ok(EMPTY_SUMMARY_MESSAGE.to_string());
        }

        let request = GenerationRequest::Summarize {
            excerpts: excerpts.to_vec(),
        };
        let reply = self.generator.generate(&request)?;
        string_field(&reply, "summary")
    }
}

/// A concept item parsed out of a generation reply.
struct ConceptItem {
    label: String,
    details: Option<String>,
    kind: String,
}

/// A relation item parsed out of a generation reply; endpoints are labels.
struct RelationItem {
    source: String,
    target: String,
    label: String,
}

fn string_field(value: &Value, key: &str) -> Result<String, GenerationError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::MalformedReply(format!("missing required key '{key}'"))
        })
}

fn parse_concepts(reply: &Value) -> Result<Vec<ConceptItem>, GenerationError> {
    let items = reply
        .get("concepts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            GenerationError::MalformedReply("missing required key 'concepts'".to_string())
        })?;

    items
        .iter()
        .map(|item| {
            let label = string_field(item, "label")?;
            if label.trim().is_empty() {
                return Err(GenerationError::MalformedReply(
                    "concept with empty label".to_string(),
                ));
            }
            Ok(ConceptItem {
                label,
                details: item.get("details").and_then(Value::as_str).map(str::to_string),
                kind: item
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or("concept")
                    .to_string(),
            })
        })
        .collect()
}

/// Parses the optional `"relations"` array. `Ok(None)` means the key was
/// absent; a present-but-malformed array is an error.
fn parse_relations(reply: &Value) -> Result<Option<Vec<RelationItem>>, GenerationError> {
    let Some(value) = reply.get("relations") else {
        return Ok(None);
    };
    let items = value.as_array().ok_or_else(|| {
        GenerationError::MalformedReply("'relations' must be an array".to_string())
    })?;

    items
        .iter()
        .map(|item| {
            Ok(RelationItem {
                source: string_field(item, "source")?,
                target: string_field(item, "target")?,
                label: string_field(item, "label")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Resolves relation endpoints through the label table and adds the edges
/// that resolve; relations naming unknown labels are dropped.
fn attach_relations(
    candidates: &mut MapData,
    relations: &[RelationItem],
    labels: &HashMap<String, NodeId>,
) {
    for relation in relations {
        let (Some(&source), Some(&target)) =
            (labels.get(&relation.source), labels.get(&relation.target))
        else {
            log::debug!(
                "dropping suggested relation '{}' -> '{}': unknown endpoint",
                relation.source,
                relation.target
            );
            continue;
        };
        let edge = ConceptEdge::new(source, target, relation.label.clone());
        candidates.edges.insert(edge.id, edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Generator returning canned replies; panics when called with none left,
    /// which the validation tests rely on to prove no dispatch happened.
    struct ScriptedGenerator {
        replies: Vec<Result<Value, GenerationError>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<Value, GenerationError>>) -> Self {
            Self { replies }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn generate(&mut self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
            self.replies.remove(0)
        }
    }

    fn orchestrator_with(reply: Value) -> Orchestrator {
        Orchestrator::new(Box::new(ScriptedGenerator::new(vec![Ok(reply)])))
    }

    #[test]
    fn test_summarize_empty_selection_returns_fixed_message_without_dispatch() {
        let generator = ScriptedGenerator::new(vec![]);
        let mut orchestrator = Orchestrator::new(Box::new(generator));

        let summary = orchestrator.summarize(&[]).unwrap();

        assert_eq!(summary, EMPTY_SUMMARY_MESSAGE);
        // An empty replies vec would have panicked on dispatch, so reaching
        // here proves the generator was never contacted.
    }

    #[test]
    fn test_summarize_extracts_summary_key() {
        let mut orchestrator = orchestrator_with(json!({"summary": "Three related ideas."}));
        let summary = orchestrator
            .summarize(&["first".to_string(), "second".to_string()])
            .unwrap();
        assert_eq!(summary, "Three related ideas.");
    }

    #[test]
    fn test_summarize_missing_key_is_malformed_reply() {
        let mut orchestrator = orchestrator_with(json!({"text": "wrong shape"}));
        let result = orchestrator.summarize(&["content".to_string()]);
        assert!(matches!(result, Err(GenerationError::MalformedReply(_))));
    }

    #[test]
    fn test_ask_question_round_trip() {
        let mut orchestrator = orchestrator_with(json!({"answer": "Because of move semantics."}));
        let answer = orchestrator
            .ask_question("Ownership", Some("rules about moves"), "Why does this fail?")
            .unwrap();
        assert_eq!(answer, "Because of move semantics.");
    }

    #[test]
    fn test_ask_question_rejects_empty_question() {
        let generator = ScriptedGenerator::new(vec![]);
        let mut orchestrator = Orchestrator::new(Box::new(generator));

        let result = orchestrator.ask_question("Ownership", None, "   ");

        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
    }

    #[test]
    fn test_expand_concept_builds_ring_of_candidates() {
        let origin = ConceptNode::new("Ownership", (100.0, 100.0), "concept");
        let mut orchestrator = orchestrator_with(json!({
            "concepts": [
                {"label": "Borrowing", "details": "shared refs", "kind": "concept"},
                {"label": "Moves"},
            ]
        }));

        let candidates = orchestrator.expand_concept(&origin).unwrap();

        assert_eq!(candidates.nodes.len(), 2);
        // No explicit relations: every concept is anchored to the origin.
        assert_eq!(candidates.edges.len(), 2);
        assert!(candidates.edges.values().all(|e| e.source == origin.id));
        let positions: Vec<(f32, f32)> =
            candidates.nodes.values().map(|n| n.position).collect();
        assert_ne!(positions[0], positions[1]);
        let borrowing = candidates
            .nodes
            .values()
            .find(|n| n.label == "Borrowing")
            .unwrap();
        assert_eq!(borrowing.details.as_deref(), Some("shared refs"));
        let moves = candidates.nodes.values().find(|n| n.label == "Moves").unwrap();
        assert_eq!(moves.kind, "concept");
    }

    #[test]
    fn test_expand_concept_uses_reply_relations_when_present() {
        let origin = ConceptNode::new("Async", (0.0, 0.0), "concept");
        let mut orchestrator = orchestrator_with(json!({
            "concepts": [{"label": "Futures"}, {"label": "Executors"}],
            "relations": [
                {"source": "Async", "target": "Futures", "label": "is built on"},
                {"source": "Executors", "target": "Futures", "label": "poll"},
            ]
        }));

        let candidates = orchestrator.expand_concept(&origin).unwrap();

        assert_eq!(candidates.edges.len(), 2);
        assert!(candidates
            .edges
            .values()
            .any(|e| e.source == origin.id && e.label == "is built on"));
    }

    #[test]
    fn test_expand_concept_missing_concepts_key_is_malformed() {
        let origin = ConceptNode::new("Async", (0.0, 0.0), "concept");
        let mut orchestrator = orchestrator_with(json!({"ideas": []}));

        let result = orchestrator.expand_concept(&origin);

        assert!(matches!(result, Err(GenerationError::MalformedReply(_))));
    }

    #[test]
    fn test_extract_concepts_rejects_empty_excerpts() {
        let generator = ScriptedGenerator::new(vec![]);
        let mut orchestrator = Orchestrator::new(Box::new(generator));

        let result = orchestrator.extract_concepts(&[], (0.0, 0.0));
        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));

        let result = orchestrator.extract_concepts(&["  ".to_string()], (0.0, 0.0));
        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
    }

    #[test]
    fn test_extract_concepts_places_grid_and_resolves_relations() {
        let mut orchestrator = orchestrator_with(json!({
            "concepts": [
                {"label": "Parser"},
                {"label": "Lexer"},
                {"label": "Tokens"},
            ],
            "relations": [
                {"source": "Lexer", "target": "Tokens", "label": "produces"},
                {"source": "Parser", "target": "Unknown", "label": "dropped"},
            ]
        }));

        let candidates = orchestrator
            .extract_concepts(&["fn main() {}".to_string()], (50.0, 60.0))
            .unwrap();

        assert_eq!(candidates.nodes.len(), 3);
        // Only the resolvable relation survives.
        assert_eq!(candidates.edges.len(), 1);
        assert_eq!(
            candidates.edges.values().next().unwrap().label,
            "produces"
        );
        // All grid positions are distinct and offset from the anchor.
        let mut positions: Vec<(f32, f32)> =
            candidates.nodes.values().map(|n| n.position).collect();
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
        positions.dedup();
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn test_suggest_relations_resolves_against_committed_labels() {
        let mut map = MapData::new();
        let a = ConceptNode::new("Heap", (0.0, 0.0), "concept");
        let b = ConceptNode::new("Stack", (100.0, 0.0), "concept");
        let (a_id, b_id) = (a.id, b.id);
        map.nodes.insert(a.id, a);
        map.nodes.insert(b.id, b);

        let mut orchestrator = orchestrator_with(json!({
            "relations": [
                {"source": "Heap", "target": "Stack", "label": "contrasts with"},
                {"source": "Heap", "target": "Nowhere", "label": "dropped"},
            ]
        }));

        let candidates = orchestrator
            .suggest_relations("Heap", Some("memory layout"), &map)
            .unwrap();

        assert!(candidates.nodes.is_empty());
        assert_eq!(candidates.edges.len(), 1);
        let edge = candidates.edges.values().next().unwrap();
        assert_eq!(edge.source, a_id);
        assert_eq!(edge.target, b_id);
    }

    #[test]
    fn test_suggest_relations_requires_relations_key() {
        let map = MapData::new();
        let mut orchestrator = orchestrator_with(json!({"concepts": []}));

        let result = orchestrator.suggest_relations("Heap", None, &map);

        assert!(matches!(result, Err(GenerationError::MalformedReply(_))));
    }

    #[test]
    fn test_service_failure_propagates() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::ServiceFailure(
            "connection refused".to_string(),
        ))]);
        let mut orchestrator = Orchestrator::new(Box::new(generator));

        let result = orchestrator.summarize(&["content".to_string()]);

        assert!(matches!(result, Err(GenerationError::ServiceFailure(_))));
    }

    #[test]
    fn test_request_wire_format_carries_operation_tag() {
        let request = GenerationRequest::Summarize {
            excerpts: vec!["a".to_string()],
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["operation"], "summarize");
        assert_eq!(wire["excerpts"][0], "a");
    }
}
