//! In-memory [`SearchEngine`] for deterministic testing.
//!
//! Stores generations and alias bindings in maps and evaluates the subset of
//! the query DSL the planner emits: bool with must/should/filter,
//! multi_match, match, match_phrase, term/terms (including `.keyword`
//! sub-fields), match_all, min_score, sort, and offset pagination. Scoring is
//! simplified (weighted substring matching) but preserves the planner's
//! ordering properties, which is what the tests assert.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use joblens_core::{Error, Result, SearchEngine};

#[derive(Default)]
struct IndexData {
    mapping: JsonValue,
    docs: BTreeMap<String, JsonValue>,
}

#[derive(Default)]
struct EngineState {
    indices: HashMap<String, IndexData>,
    aliases: HashMap<String, String>,
}

/// In-memory search engine test double.
pub struct InMemorySearchEngine {
    alias: String,
    state: Mutex<EngineState>,
    fail_next_reindex: AtomicBool,
}

impl InMemorySearchEngine {
    /// Create an engine serving the given alias.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            state: Mutex::new(EngineState::default()),
            fail_next_reindex: AtomicBool::new(false),
        }
    }

    /// Make the next reindex call fail, for migration-cleanup tests.
    pub fn fail_next_reindex(&self) {
        self.fail_next_reindex.store(true, Ordering::SeqCst);
    }

    /// Names of all live indices (for assertions).
    pub fn index_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state.indices.keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve(state: &EngineState, name: &str) -> String {
        state
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn create_index(&self, name: &str, mapping: &JsonValue) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.indices.entry(name.to_string()).or_insert(IndexData {
            mapping: mapping.clone(),
            docs: BTreeMap::new(),
        });
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.indices.contains_key(name) || state.aliases.contains_key(name))
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let state = self.state.lock().unwrap();
        let index = Self::resolve(&state, &self.alias);
        Ok(state
            .indices
            .get(&index)
            .map(|data| data.docs.contains_key(&id.to_string()))
            .unwrap_or(false))
    }

    async fn index_document(
        &self,
        id: Uuid,
        document: &JsonValue,
        target: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = match target {
            Some(name) => name.to_string(),
            None => Self::resolve(&state, &self.alias),
        };
        state
            .indices
            .entry(index)
            .or_default()
            .docs
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn update_document(&self, id: Uuid, document: &JsonValue) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = Self::resolve(&state, &self.alias);
        let data = state
            .indices
            .get_mut(&index)
            .ok_or_else(|| Error::Search(format!("no such index: {index}")))?;
        let existing = data
            .docs
            .get_mut(&id.to_string())
            .ok_or_else(|| Error::NotFound(format!("document {id}")))?;

        // Shallow merge, matching the partial-update semantics of _update.
        if let (Some(existing), Some(incoming)) = (existing.as_object_mut(), document.as_object())
        {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        } else {
            *existing = document.clone();
        }
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = Self::resolve(&state, &self.alias);
        if let Some(data) = state.indices.get_mut(&index) {
            data.docs.remove(&id.to_string());
        }
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.indices.remove(name);
        state.aliases.retain(|_, target| target != name);
        Ok(())
    }

    async fn search(&self, query: &JsonValue) -> Result<JsonValue> {
        let state = self.state.lock().unwrap();
        let index = Self::resolve(&state, &self.alias);
        let docs: Vec<(String, JsonValue)> = state
            .indices
            .get(&index)
            .map(|data| {
                data.docs
                    .iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        drop(state);

        let clause = query.get("query").cloned().unwrap_or(json!({"match_all": {}}));
        let min_score = query.get("min_score").and_then(|v| v.as_f64());

        let mut hits: Vec<(String, f64, JsonValue)> = Vec::new();
        for (id, doc) in docs {
            if let Some(score) = eval_clause(&clause, &doc, &id) {
                if min_score.map(|min| score >= min).unwrap_or(true) {
                    hits.push((id, score, doc));
                }
            }
        }

        sort_hits(&mut hits, query.get("sort"));

        let total = hits.len() as i64;
        let from = query.get("from").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let size = query.get("size").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
        let page: Vec<JsonValue> = hits
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, score, doc)| {
                json!({
                    "_id": id,
                    "_score": score,
                    "_source": doc,
                })
            })
            .collect();

        Ok(json!({
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": page,
            }
        }))
    }

    async fn count(&self, index: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        let resolved = Self::resolve(&state, index);
        state
            .indices
            .get(&resolved)
            .map(|data| data.docs.len() as i64)
            .ok_or_else(|| Error::Search(format!("no such index: {index}")))
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<()> {
        if self.fail_next_reindex.swap(false, Ordering::SeqCst) {
            return Err(Error::Search("reindex failed (injected)".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let docs = state
            .indices
            .get(source)
            .ok_or_else(|| Error::Search(format!("no such index: {source}")))?
            .docs
            .clone();
        state.indices.entry(dest.to_string()).or_default().docs.extend(docs);
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.aliases.insert(alias.to_string(), index.to_string());
        Ok(())
    }

    async fn update_alias_atomic(
        &self,
        remove: (&str, &str),
        add: (&str, &str),
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.aliases.get(remove.1).map(String::as_str) == Some(remove.0) {
            state.aliases.remove(remove.1);
        }
        state.aliases.insert(add.1.to_string(), add.0.to_string());
        Ok(())
    }

    async fn get_alias_targets(&self, alias: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.aliases.get(alias).cloned().into_iter().collect())
    }

    async fn refresh(&self, _index: &str) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// QUERY EVALUATION
// =============================================================================

/// Evaluate one query clause against a document. `None` = no match;
/// `Some(score)` = match with the given score contribution.
fn eval_clause(clause: &JsonValue, doc: &JsonValue, doc_id: &str) -> Option<f64> {
    let obj = clause.as_object()?;
    let (kind, body) = obj.iter().next()?;
    match kind.as_str() {
        "match_all" => Some(1.0),
        "bool" => eval_bool(body, doc, doc_id),
        "multi_match" => eval_multi_match(body, doc),
        "match" => eval_match(body, doc),
        "match_phrase" => eval_match_phrase(body, doc),
        "term" => eval_term(body, doc, doc_id),
        "terms" => eval_terms(body, doc),
        _ => None,
    }
}

fn eval_bool(body: &JsonValue, doc: &JsonValue, doc_id: &str) -> Option<f64> {
    let empty = Vec::new();
    let musts = body.get("must").and_then(|v| v.as_array()).unwrap_or(&empty);
    let shoulds = body.get("should").and_then(|v| v.as_array()).unwrap_or(&empty);
    let filters = body.get("filter").and_then(|v| v.as_array()).unwrap_or(&empty);

    for filter in filters {
        eval_clause(filter, doc, doc_id)?;
    }

    let mut score = 0.0;
    for must in musts {
        score += eval_clause(must, doc, doc_id)?;
    }

    let mut should_matches = 0usize;
    for should in shoulds {
        if let Some(s) = eval_clause(should, doc, doc_id) {
            score += s;
            should_matches += 1;
        }
    }

    // ES semantics: with no must/filter clauses, at least one should must
    // match; an explicit minimum_should_match always wins.
    let default_msm = if musts.is_empty() && filters.is_empty() && !shoulds.is_empty() {
        1
    } else {
        0
    };
    let msm = body
        .get("minimum_should_match")
        .and_then(|v| v.as_u64())
        .unwrap_or(default_msm) as usize;
    if should_matches < msm {
        return None;
    }

    if musts.is_empty() && shoulds.is_empty() {
        return Some(0.0);
    }
    Some(score)
}

fn eval_multi_match(body: &JsonValue, doc: &JsonValue) -> Option<f64> {
    let query = body.get("query")?.as_str()?.to_lowercase();
    let fields = body.get("fields")?.as_array()?;

    let mut total = 0.0;
    let mut any = false;
    for term in query.split_whitespace() {
        let mut best = 0.0f64;
        for field in fields {
            let spec = field.as_str()?;
            let (path, weight) = match spec.split_once('^') {
                Some((path, boost)) => (path, boost.parse::<f64>().unwrap_or(1.0)),
                None => (spec, 1.0),
            };
            if field_text(doc, path).to_lowercase().contains(term) {
                best = best.max(weight);
            }
        }
        if best > 0.0 {
            total += best;
            any = true;
        }
    }
    if any {
        Some(total)
    } else {
        None
    }
}

fn eval_match(body: &JsonValue, doc: &JsonValue) -> Option<f64> {
    let (field, spec) = body.as_object()?.iter().next()?;
    let (query, boost) = match spec {
        JsonValue::String(s) => (s.clone(), 1.0),
        other => (
            other.get("query")?.as_str()?.to_string(),
            other.get("boost").and_then(|b| b.as_f64()).unwrap_or(1.0),
        ),
    };
    let text = field_text(doc, field).to_lowercase();
    let query = query.to_lowercase();
    // OR over terms, like an analyzed match query.
    if query.split_whitespace().any(|term| text.contains(term)) {
        Some(boost)
    } else {
        None
    }
}

fn eval_match_phrase(body: &JsonValue, doc: &JsonValue) -> Option<f64> {
    let (field, spec) = body.as_object()?.iter().next()?;
    let (query, boost) = match spec {
        JsonValue::String(s) => (s.clone(), 1.0),
        other => (
            other.get("query")?.as_str()?.to_string(),
            other.get("boost").and_then(|b| b.as_f64()).unwrap_or(1.0),
        ),
    };
    if field_text(doc, field)
        .to_lowercase()
        .contains(&query.to_lowercase())
    {
        Some(boost)
    } else {
        None
    }
}

fn eval_term(body: &JsonValue, doc: &JsonValue, doc_id: &str) -> Option<f64> {
    let (field, spec) = body.as_object()?.iter().next()?;
    let (value, boost) = match spec {
        JsonValue::Object(obj) => (
            obj.get("value")?.clone(),
            obj.get("boost").and_then(|b| b.as_f64()).unwrap_or(1.0),
        ),
        other => (other.clone(), 1.0),
    };
    if field == "_id" {
        return (value.as_str() == Some(doc_id)).then_some(boost);
    }
    field_values(doc, field)
        .iter()
        .any(|v| json_eq(v, &value))
        .then_some(boost)
}

fn eval_terms(body: &JsonValue, doc: &JsonValue) -> Option<f64> {
    let (field, values) = body.as_object()?.iter().next()?;
    let values = values.as_array()?;
    let doc_values = field_values(doc, field);
    values
        .iter()
        .any(|wanted| doc_values.iter().any(|v| json_eq(v, wanted)))
        .then_some(1.0)
}

/// Loose scalar equality: exact JSON equality, or string-vs-string.
fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    if a == b {
        return true;
    }
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Resolve a (possibly dotted, possibly `.keyword`-suffixed) field path to
/// the list of scalar values at that path.
fn field_values(doc: &JsonValue, path: &str) -> Vec<JsonValue> {
    let path = path.strip_suffix(".keyword").unwrap_or(path);
    let mut current = vec![doc.clone()];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                JsonValue::Array(items) => {
                    for item in items {
                        if let Some(v) = item.get(segment) {
                            next.push(v.clone());
                        }
                    }
                }
                other => {
                    if let Some(v) = other.get(segment) {
                        next.push(v.clone());
                    }
                }
            }
        }
        current = next;
    }
    // Flatten one array level so `skill_tags` yields its elements.
    current
        .into_iter()
        .flat_map(|v| match v {
            JsonValue::Array(items) => items,
            other => vec![other],
        })
        .collect()
}

/// Concatenated text of all values at a field path.
fn field_text(doc: &JsonValue, path: &str) -> String {
    field_values(doc, path)
        .iter()
        .filter_map(|v| match v {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn sort_hits(hits: &mut [(String, f64, JsonValue)], sort: Option<&JsonValue>) {
    let keys: Vec<SortKey> = sort
        .and_then(|v| v.as_array())
        .map(|entries| entries.iter().filter_map(parse_sort_key).collect())
        .unwrap_or_else(|| vec![SortKey::Score]);

    hits.sort_by(|a, b| {
        for key in &keys {
            let ordering = match key {
                SortKey::Score => b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal),
                SortKey::FieldDesc(field) => {
                    let av = field_text(&a.2, field);
                    let bv = field_text(&b.2, field);
                    bv.cmp(&av)
                }
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        a.0.cmp(&b.0)
    });
}

enum SortKey {
    Score,
    FieldDesc(String),
}

fn parse_sort_key(entry: &JsonValue) -> Option<SortKey> {
    match entry {
        JsonValue::String(s) if s == "_score" => Some(SortKey::Score),
        JsonValue::Object(obj) => {
            let (field, _) = obj.iter().next()?;
            Some(SortKey::FieldDesc(field.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, tags: &[&str]) -> JsonValue {
        json!({
            "id": id,
            "title": title,
            "full_description": format!("{title} description"),
            "skill_tags": tags,
            "expired": false,
            "company": {"id": id, "name": "Acme"},
        })
    }

    #[tokio::test]
    async fn test_alias_resolution_and_docs() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("jobs_1", &json!({})).await.unwrap();
        engine.put_alias("jobs_1", "jobs").await.unwrap();

        let id = Uuid::new_v4();
        engine
            .index_document(id, &doc(&id.to_string(), "Engineer", &["Go"]), None)
            .await
            .unwrap();

        assert!(engine.exists(id).await.unwrap());
        assert_eq!(engine.count("jobs_1").await.unwrap(), 1);
        assert_eq!(engine.count("jobs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_atomic_alias_swap() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("jobs_1", &json!({})).await.unwrap();
        engine.create_index("jobs_2", &json!({})).await.unwrap();
        engine.put_alias("jobs_1", "jobs").await.unwrap();

        engine
            .update_alias_atomic(("jobs_1", "jobs"), ("jobs_2", "jobs"))
            .await
            .unwrap();
        assert_eq!(
            engine.get_alias_targets("jobs").await.unwrap(),
            vec!["jobs_2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_multi_match_weights_order_hits() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("jobs_1", &json!({})).await.unwrap();
        engine.put_alias("jobs_1", "jobs").await.unwrap();

        let title_hit = Uuid::new_v4();
        let body_hit = Uuid::new_v4();
        engine
            .index_document(
                title_hit,
                &doc(&title_hit.to_string(), "Rust Engineer", &[]),
                None,
            )
            .await
            .unwrap();
        engine
            .index_document(
                body_hit,
                &json!({
                    "id": body_hit,
                    "title": "Software Developer",
                    "full_description": "must know rust",
                    "skill_tags": [],
                    "expired": false,
                }),
                None,
            )
            .await
            .unwrap();

        let response = engine
            .search(&json!({
                "query": {
                    "multi_match": {
                        "query": "rust",
                        "fields": ["title^3", "full_description^1"]
                    }
                },
                "sort": ["_score"],
                "size": 10
            }))
            .await
            .unwrap();

        let hits = response["hits"]["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["_id"], title_hit.to_string());
        assert!(hits[0]["_score"].as_f64() > hits[1]["_score"].as_f64());
    }

    #[tokio::test]
    async fn test_term_keyword_and_filter() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("jobs_1", &json!({})).await.unwrap();
        engine.put_alias("jobs_1", "jobs").await.unwrap();

        let id = Uuid::new_v4();
        engine
            .index_document(id, &doc(&id.to_string(), "Go Engineer", &["Go", "AWS"]), None)
            .await
            .unwrap();

        let response = engine
            .search(&json!({
                "query": {
                    "bool": {
                        "must": [
                            {"term": {"skill_tags.keyword": {"value": "Go", "boost": 3.0}}}
                        ],
                        "filter": [
                            {"term": {"expired": false}}
                        ]
                    }
                }
            }))
            .await
            .unwrap();
        assert_eq!(response["hits"]["total"]["value"], 1);

        let miss = engine
            .search(&json!({
                "query": {"term": {"skill_tags.keyword": {"value": "go"}}}
            }))
            .await
            .unwrap();
        assert_eq!(miss["hits"]["total"]["value"], 0, "keyword match is exact");
    }

    #[tokio::test]
    async fn test_min_score_excludes_low_scoring() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("jobs_1", &json!({})).await.unwrap();
        engine.put_alias("jobs_1", "jobs").await.unwrap();

        let id = Uuid::new_v4();
        engine
            .index_document(id, &doc(&id.to_string(), "Engineer", &[]), None)
            .await
            .unwrap();

        let response = engine
            .search(&json!({
                "query": {
                    "bool": {
                        "should": [{"match": {"full_description": "engineer"}}],
                        "minimum_should_match": 1
                    }
                },
                "min_score": 5.0
            }))
            .await
            .unwrap();
        assert_eq!(response["hits"]["total"]["value"], 0);
    }

    #[tokio::test]
    async fn test_reindex_failure_injection() {
        let engine = InMemorySearchEngine::new("jobs");
        engine.create_index("a", &json!({})).await.unwrap();
        engine.create_index("b", &json!({})).await.unwrap();
        engine.fail_next_reindex();
        assert!(engine.reindex("a", "b").await.is_err());
        // Flag resets after one failure.
        assert!(engine.reindex("a", "b").await.is_ok());
    }
}
