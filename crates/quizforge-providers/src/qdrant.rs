//! Qdrant similarity search over stored practice questions, via the REST API.
//!
//! Points are expected to carry a payload of
//! `{question, explanation?, type, grade}`; `content` is accepted in place of
//! `question`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use quizforge_core::model::QuestionType;
use quizforge_core::traits::{SearchFilter, SearchQuery, VectorHit, VectorSearch};

use crate::http::{build_client, check_status, parse_error, send_error};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct QdrantSearch {
    url: String,
    collection: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QdrantSearch {
    pub fn new(url: &str, collection: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
}

#[derive(Serialize)]
struct Filter {
    must: Vec<Condition>,
}

#[derive(Serialize)]
struct Condition {
    key: &'static str,
    #[serde(rename = "match")]
    matches: MatchValue,
}

#[derive(Serialize)]
struct MatchValue {
    value: Value,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

fn build_filter(filter: &SearchFilter) -> Option<Filter> {
    let mut must = Vec::new();
    if let Some(question_type) = filter.question_type {
        must.push(Condition {
            key: "type",
            matches: MatchValue {
                value: serde_json::to_value(question_type).unwrap_or(Value::Null),
            },
        });
    }
    if let Some(grade) = filter.grade {
        must.push(Condition {
            key: "grade",
            matches: MatchValue {
                value: Value::from(grade),
            },
        });
    }
    (!must.is_empty()).then_some(Filter { must })
}

fn payload_str(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Points without question text are skipped.
fn to_hit(point: ScoredPoint) -> Option<VectorHit> {
    let payload = point.payload?;
    let text = payload_str(&payload, "question").or_else(|| payload_str(&payload, "content"))?;
    Some(VectorHit {
        text,
        explanation: payload_str(&payload, "explanation"),
        question_type: payload
            .get("type")
            .and_then(|v| serde_json::from_value::<QuestionType>(v.clone()).ok()),
        score: point.score,
    })
}

#[async_trait]
impl VectorSearch for QdrantSearch {
    fn name(&self) -> &str {
        "qdrant"
    }

    #[instrument(skip(self, query), fields(collection = %self.collection, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VectorHit>> {
        let body = SearchBody {
            vector: &query.vector,
            limit: query.limit,
            with_payload: true,
            filter: build_filter(&query.filter),
        };

        let mut req = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.url, self.collection
            ))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS, &self.url))?;
        let response =
            check_status(response, || format!("collection '{}'", self.collection)).await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| parse_error("search response", e))?;
        let total = parsed.result.len();
        let hits: Vec<VectorHit> = parsed.result.into_iter().filter_map(to_hit).collect();
        debug!(total, kept = hits.len(), "qdrant search returned");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::error::ProviderError;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query() -> SearchQuery {
        SearchQuery {
            vector: vec![0.1, 0.2, 0.3],
            limit: 5,
            filter: SearchFilter {
                question_type: Some(QuestionType::Addition),
                grade: Some(3),
            },
        }
    }

    #[tokio::test]
    async fn search_with_filter_and_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/math_questions/points/search"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "limit": 5,
                "with_payload": true,
                "filter": {"must": [
                    {"key": "type", "match": {"value": "ADDITION"}},
                    {"key": "grade", "match": {"value": 3}}
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    {"id": 1, "score": 0.91, "payload": {
                        "question": "What is 4 + 5?",
                        "explanation": "Count on from 4.",
                        "type": "ADDITION",
                        "grade": 3
                    }},
                    {"id": 2, "score": 0.84, "payload": {"content": "Add 7 and 2.", "type": "ADDITION"}},
                    {"id": 3, "score": 0.80, "payload": {"grade": 3}},
                    {"id": 4, "score": 0.70}
                ],
                "status": "ok",
                "time": 0.001
            })))
            .mount(&server)
            .await;

        let search = QdrantSearch::new(&server.uri(), "math_questions", Some("secret".into())).unwrap();
        let hits = search.search(&query()).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "What is 4 + 5?");
        assert_eq!(hits[0].explanation.as_deref(), Some("Count on from 4."));
        assert_eq!(hits[0].question_type, Some(QuestionType::Addition));
        assert_eq!(hits[1].text, "Add 7 and 2.");
        assert!(hits[1].explanation.is_none());
    }

    #[test]
    fn no_filter_when_unset() {
        let body = SearchBody {
            vector: &[1.0],
            limit: 3,
            with_payload: true,
            filter: build_filter(&SearchFilter::default()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("filter").is_none());
    }

    #[tokio::test]
    async fn missing_collection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/nope/points/search"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
            .mount(&server)
            .await;

        let search = QdrantSearch::new(&server.uri(), "nope", None).unwrap();
        let err = search.search(&query()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::ModelNotFound(m)) if m.contains("nope")
        ));
    }
}
