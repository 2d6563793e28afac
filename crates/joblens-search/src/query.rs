//! Search query planner: compiles a structured request into a ranked engine
//! query and decodes hits back into typed results.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tracing::{debug, instrument};
use uuid::Uuid;

use joblens_core::{
    defaults, Error, JobHit, Result, SearchDocument, SearchEngine, SearchRequest, SearchResponse,
    SortMode,
};

/// Weighted fields for the free-text clause. Title dominates, then skills,
/// company name, summary, and finally the full description.
const MULTI_MATCH_FIELDS: [&str; 5] = [
    "title^3",
    "skill_tags^2",
    "company.name^1.5",
    "summary^1.2",
    "full_description^1",
];

/// Search query planner over a [`SearchEngine`].
pub struct SearchPlanner {
    engine: Arc<dyn SearchEngine>,
    /// Score floor under date sort; keeps date-ordered results relevant.
    date_sort_min_score: f64,
}

impl SearchPlanner {
    /// Create a planner with the default date-sort score floor.
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            engine,
            date_sort_min_score: defaults::DATE_SORT_MIN_SCORE,
        }
    }

    /// Override the date-sort minimum score.
    pub fn with_date_sort_min_score(mut self, min_score: f64) -> Self {
        self.date_sort_min_score = min_score;
        self
    }

    /// Plan, execute, and decode one search.
    #[instrument(skip(self, request), fields(query = request.q.as_deref().unwrap_or("")))]
    pub async fn search_jobs(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let query = build_search_query(request, self.date_sort_min_score)?;
        debug!(
            subsystem = "search",
            component = "planner",
            op = "search",
            "Executing planned query"
        );
        let response = self.engine.search(&query).await?;
        decode_search_response(&response, request)
    }

    /// Look up one job document by id. Unknown ids surface as
    /// [`Error::JobNotFound`].
    pub async fn job_detail(&self, job_id: Uuid) -> Result<SearchDocument> {
        let query = json!({
            "query": { "term": { "_id": job_id.to_string() } }
        });
        let response = self.engine.search(&query).await?;
        let hit = response["hits"]["hits"]
            .as_array()
            .and_then(|hits| hits.first())
            .ok_or(Error::JobNotFound(job_id))?;
        let document: SearchDocument = serde_json::from_value(hit["_source"].clone())?;
        Ok(document)
    }
}

/// Compile a [`SearchRequest`] into the engine's query DSL.
///
/// An empty or whitespace-only `q` is rejected before any collaborator is
/// touched; it is never treated as match-all.
pub fn build_search_query(request: &SearchRequest, date_sort_min_score: f64) -> Result<JsonValue> {
    if let Some(q) = &request.q {
        if q.trim().is_empty() {
            return Err(Error::InvalidInput(
                "search query must not be empty".to_string(),
            ));
        }
    }
    if request.page < 1 {
        return Err(Error::InvalidInput(format!(
            "page must be >= 1, got {}",
            request.page
        )));
    }
    let per_page = request
        .per_page
        .clamp(1, defaults::SEARCH_PER_PAGE_MAX);

    let mut must = Vec::new();
    let mut should = Vec::new();
    let mut filter = vec![json!({ "term": { "expired": false } })];
    let mut minimum_should_match = None;
    let mut min_score = None;

    if let Some(q) = request.q.as_deref() {
        let text_clause = json!({
            "multi_match": {
                "query": q,
                "fields": MULTI_MATCH_FIELDS,
                "type": "best_fields",
                "tie_breaker": 0.3,
                "fuzziness": "AUTO",
                "operator": "or"
            }
        });

        // Relevance sort demands a match; date sort demotes the clause to
        // scoring signal but keeps a floor so completely irrelevant
        // documents are still excluded.
        match request.sort {
            SortMode::Relevance => must.push(text_clause),
            SortMode::Date => {
                should.push(text_clause);
                minimum_should_match = Some(1);
                min_score = Some(date_sort_min_score);
            }
        }

        // Phrase proximity boosts.
        should.push(json!({
            "match_phrase": { "title": { "query": q, "boost": 2, "slop": 1 } }
        }));
        should.push(json!({
            "match_phrase": { "summary": { "query": q, "boost": 1.5, "slop": 2 } }
        }));
        should.push(json!({
            "match_phrase": { "skill_tags": { "query": q, "boost": 1.5 } }
        }));

        // Exact keyword boosts.
        should.push(json!({
            "term": { "title.keyword": { "value": q, "boost": 4 } }
        }));
        should.push(json!({
            "term": { "skill_tags.keyword": { "value": q, "boost": 3 } }
        }));
    }

    if let Some(location) = &request.location {
        filter.push(json!({ "match": { "location": location } }));
    }
    if !request.employment_types.is_empty() {
        filter.push(json!({ "terms": { "employment_type": request.employment_types } }));
    }
    if let Some(is_remote) = request.is_remote {
        filter.push(json!({ "term": { "is_remote": is_remote } }));
    }
    if !request.company_ids.is_empty() {
        filter.push(json!({ "terms": { "company.id": request.company_ids } }));
    }
    if !request.experience_levels.is_empty() {
        filter.push(json!({ "terms": { "experience_level": request.experience_levels } }));
    }

    let mut bool_query = json!({
        "must": must,
        "should": should,
        "filter": filter,
    });
    if let Some(msm) = minimum_should_match {
        bool_query["minimum_should_match"] = json!(msm);
    }

    let sort = match request.sort {
        SortMode::Relevance => json!(["_score", { "posted_date": { "order": "desc" } }]),
        SortMode::Date => json!([{ "posted_date": { "order": "desc" } }, "_score"]),
    };

    let mut query = json!({
        "query": { "bool": bool_query },
        "from": (request.page - 1) * per_page,
        "size": per_page,
        "sort": sort,
    });
    if let Some(min_score) = min_score {
        query["min_score"] = json!(min_score);
    }

    Ok(query)
}

/// Decode the engine's raw response into typed results.
pub fn decode_search_response(
    response: &JsonValue,
    request: &SearchRequest,
) -> Result<SearchResponse> {
    let hits = &response["hits"];
    let total = hits["total"]["value"].as_i64().unwrap_or(0);

    let mut results = Vec::new();
    for hit in hits["hits"].as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let source = &hit["_source"];
        let score = hit["_score"].as_f64().unwrap_or(0.0);
        results.push(decode_hit(source, score)?);
    }

    Ok(SearchResponse {
        total,
        page: request.page,
        per_page: request.per_page.clamp(1, defaults::SEARCH_PER_PAGE_MAX),
        results,
    })
}

fn decode_hit(source: &JsonValue, score: f64) -> Result<JobHit> {
    // Round-trip through the document shape so vocabulary fields decode
    // strictly, then attach the engine-assigned score.
    let document: SearchDocument = serde_json::from_value(source.clone())
        .map_err(|e| Error::Search(format!("undecodable hit source: {e}")))?;

    Ok(JobHit {
        id: document.id,
        title: document.title,
        company: document.company,
        location: document.location,
        employment_type: document.employment_type,
        posted_date: document.posted_date,
        is_remote: document.is_remote,
        url: Some(document.url),
        skill_tags: document.skill_tags,
        summary: document.summary,
        salary_range: document.salary_range,
        experience_level: document.experience_level,
        expired: document.expired,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblens_core::ExperienceLevel;

    fn base_request(q: &str) -> SearchRequest {
        SearchRequest::new(q)
    }

    #[test]
    fn test_empty_query_rejected() {
        let mut request = base_request("");
        let err = build_search_query(&request, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        request.q = Some("   ".to_string());
        let err = build_search_query(&request, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_page_must_be_positive() {
        let mut request = base_request("rust");
        request.page = 0;
        assert!(matches!(
            build_search_query(&request, 1.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_query_builds_filter_only_browse() {
        let query = build_search_query(&SearchRequest::browse(), 1.0).unwrap();
        let bool_query = &query["query"]["bool"];
        assert!(bool_query["must"].as_array().unwrap().is_empty());
        assert!(bool_query["should"].as_array().unwrap().is_empty());
        assert_eq!(bool_query["filter"][0]["term"]["expired"], false);
        assert!(query.get("min_score").is_none());
    }

    #[test]
    fn test_relevance_sort_puts_text_clause_in_must() {
        let query = build_search_query(&base_request("python engineer"), 1.0).unwrap();
        let bool_query = &query["query"]["bool"];

        let must = bool_query["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        let mm = &must[0]["multi_match"];
        assert_eq!(mm["query"], "python engineer");
        assert_eq!(mm["fields"][0], "title^3");
        assert_eq!(mm["fields"][3], "summary^1.2");
        assert_eq!(mm["fuzziness"], "AUTO");
        assert_eq!(mm["operator"], "or");

        assert!(query.get("min_score").is_none());
        assert_eq!(query["sort"][0], "_score");
    }

    #[test]
    fn test_date_sort_demotes_text_clause_with_floor() {
        let request = base_request("python engineer").with_sort(SortMode::Date);
        let query = build_search_query(&request, 1.5).unwrap();
        let bool_query = &query["query"]["bool"];

        assert!(bool_query["must"].as_array().unwrap().is_empty());
        let should = bool_query["should"].as_array().unwrap();
        assert!(should[0].get("multi_match").is_some());
        assert_eq!(bool_query["minimum_should_match"], 1);
        assert_eq!(query["min_score"], 1.5);
        assert_eq!(query["sort"][0]["posted_date"]["order"], "desc");
    }

    #[test]
    fn test_boost_clauses_always_present_with_query() {
        for sort in [SortMode::Relevance, SortMode::Date] {
            let request = base_request("rust").with_sort(sort);
            let query = build_search_query(&request, 1.0).unwrap();
            let should = query["query"]["bool"]["should"].as_array().unwrap().clone();

            let phrase_title = should
                .iter()
                .find(|c| c.get("match_phrase").and_then(|m| m.get("title")).is_some())
                .expect("title phrase boost");
            assert_eq!(phrase_title["match_phrase"]["title"]["boost"], 2);
            assert_eq!(phrase_title["match_phrase"]["title"]["slop"], 1);

            let phrase_summary = should
                .iter()
                .find(|c| c.get("match_phrase").and_then(|m| m.get("summary")).is_some())
                .expect("summary phrase boost");
            assert_eq!(phrase_summary["match_phrase"]["summary"]["boost"], 1.5);
            assert_eq!(phrase_summary["match_phrase"]["summary"]["slop"], 2);

            let exact_title = should
                .iter()
                .find(|c| c.get("term").and_then(|t| t.get("title.keyword")).is_some())
                .expect("exact title boost");
            assert_eq!(exact_title["term"]["title.keyword"]["boost"], 4);

            let exact_tags = should
                .iter()
                .find(|c| {
                    c.get("term")
                        .and_then(|t| t.get("skill_tags.keyword"))
                        .is_some()
                })
                .expect("exact skill tag boost");
            assert_eq!(exact_tags["term"]["skill_tags.keyword"]["boost"], 3);
        }
    }

    #[test]
    fn test_filters_are_non_scoring_constraints() {
        let mut request = base_request("rust");
        request.location = Some("Berlin".to_string());
        request.employment_types = vec!["FULL_TIME".to_string(), "CONTRACT".to_string()];
        request.is_remote = Some(true);
        request.company_ids = vec![Uuid::nil()];
        request.experience_levels = vec![ExperienceLevel::Senior, ExperienceLevel::Lead];

        let query = build_search_query(&request, 1.0).unwrap();
        let filter = query["query"]["bool"]["filter"].as_array().unwrap();

        assert_eq!(filter[0]["term"]["expired"], false);
        assert_eq!(filter[1]["match"]["location"], "Berlin");
        assert_eq!(filter[2]["terms"]["employment_type"][1], "CONTRACT");
        assert_eq!(filter[3]["term"]["is_remote"], true);
        assert_eq!(filter[4]["terms"]["company.id"][0], Uuid::nil().to_string());
        assert_eq!(filter[5]["terms"]["experience_level"][0], "SENIOR");
    }

    #[test]
    fn test_expired_filter_always_enforced() {
        for request in [base_request("rust"), SearchRequest::browse()] {
            let query = build_search_query(&request, 1.0).unwrap();
            let filter = query["query"]["bool"]["filter"].as_array().unwrap();
            assert!(filter
                .iter()
                .any(|f| f["term"]["expired"] == JsonValue::Bool(false)));
        }
    }

    #[test]
    fn test_offset_pagination() {
        let request = base_request("rust").with_page(3, 20);
        let query = build_search_query(&request, 1.0).unwrap();
        assert_eq!(query["from"], 40);
        assert_eq!(query["size"], 20);
    }

    #[test]
    fn test_per_page_clamped() {
        let request = base_request("rust").with_page(1, 10_000);
        let query = build_search_query(&request, 1.0).unwrap();
        assert_eq!(query["size"], defaults::SEARCH_PER_PAGE_MAX);
    }

    #[test]
    fn test_decode_response_defaults_score_to_zero() {
        let response = json!({
            "hits": {
                "total": { "value": 1 },
                "hits": [{
                    "_id": "x",
                    "_source": {
                        "id": Uuid::nil(),
                        "title": "Engineer",
                        "full_description": "text",
                        "url": "https://example.com",
                        "company": { "id": Uuid::nil(), "name": "Acme", "icon_url": null },
                        "location": null,
                        "employment_type": null,
                        "is_remote": false,
                        "expired": false,
                        "skill_tags": ["Go"],
                        "summary": null,
                        "experience_level": "SENIOR"
                    }
                }]
            }
        });

        let decoded = decode_search_response(&response, &base_request("go")).unwrap();
        assert_eq!(decoded.total, 1);
        let hit = &decoded.results[0];
        assert_eq!(hit.score, 0.0);
        assert_eq!(hit.experience_level, Some(ExperienceLevel::Senior));
        assert_eq!(hit.skill_tags, vec!["Go"]);
        assert_eq!(hit.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_decode_empty_response() {
        let response = json!({ "hits": { "total": { "value": 0 }, "hits": [] } });
        let decoded = decode_search_response(&response, &base_request("go")).unwrap();
        assert_eq!(decoded.total, 0);
        assert!(decoded.results.is_empty());
    }
}
