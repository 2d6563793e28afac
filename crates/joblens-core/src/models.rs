//! Core data models for joblens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// VOCABULARIES
// =============================================================================

/// Lifecycle status of a job's analysis.
///
/// Transitions are `pending → processing → completed|failed`; `failed`
/// re-enters the eligible pool, and a crashed worker's `processing` rows are
/// forced back to `failed` on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Database/string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Parse from the database representation. Unknown strings map to
    /// `Pending` so a corrupted row re-enters the eligible pool rather than
    /// wedging the scheduler.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "pending" => AnalysisStatus::Pending,
            "processing" => AnalysisStatus::Processing,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            _ => AnalysisStatus::Pending,
        }
    }
}

/// Experience level vocabulary, ordered from most junior to most senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    /// Canonical string form, as stored and indexed.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "ENTRY",
            ExperienceLevel::Mid => "MID",
            ExperienceLevel::Senior => "SENIOR",
            ExperienceLevel::Lead => "LEAD",
            ExperienceLevel::Executive => "EXECUTIVE",
        }
    }

    /// Case-insensitive parse against the fixed vocabulary. Returns `None`
    /// for anything outside it; callers must treat that as a hard failure,
    /// never a guess.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRY" => Some(ExperienceLevel::Entry),
            "MID" => Some(ExperienceLevel::Mid),
            "SENIOR" => Some(ExperienceLevel::Senior),
            "LEAD" => Some(ExperienceLevel::Lead),
            "EXECUTIVE" => Some(ExperienceLevel::Executive),
            _ => None,
        }
    }
}

/// Salary period vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SalaryPeriod {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl SalaryPeriod {
    /// Canonical string form, as stored and indexed.
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryPeriod::Hour => "HOUR",
            SalaryPeriod::Day => "DAY",
            SalaryPeriod::Week => "WEEK",
            SalaryPeriod::Month => "MONTH",
            SalaryPeriod::Year => "YEAR",
        }
    }

    /// Case-insensitive parse against the fixed vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOUR" => Some(SalaryPeriod::Hour),
            "DAY" => Some(SalaryPeriod::Day),
            "WEEK" => Some(SalaryPeriod::Week),
            "MONTH" => Some(SalaryPeriod::Month),
            "YEAR" => Some(SalaryPeriod::Year),
            _ => None,
        }
    }
}

// =============================================================================
// STORED ENTITIES
// =============================================================================

/// Minimal company view carried with a job and into the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyBrief {
    pub id: Uuid,
    pub name: String,
    pub icon_url: Option<String>,
}

/// A scraped job posting as stored by the relational store.
///
/// Scraped fields are immutable here; this core only reads them and attaches
/// an [`Analysis`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub full_description: String,
    pub company: CompanyBrief,
    pub location: Option<String>,
    /// Employment-type code as scraped (site-specific vocabulary).
    pub employment_type: Option<String>,
    pub is_remote: bool,
    /// Raw scraped date text; canonicalized only at document-build time.
    pub posted_date: Option<String>,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
}

/// A structured location attached to an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// AI-derived attributes for one job. One-to-one with [`JobRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub job_id: Uuid,
    pub status: AnalysisStatus,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_fixed: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<SalaryPeriod>,
    pub is_salary_estimated: bool,
    /// Comma-delimited stored form; insertion order preserved for display.
    pub skill_tags: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub summary: Option<String>,
    pub locations: Option<Vec<JobLocation>>,
    pub updated_at: DateTime<Utc>,
}

impl Analysis {
    /// Fresh pending analysis for a newly stored job.
    pub fn pending(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: AnalysisStatus::Pending,
            salary_min: None,
            salary_max: None,
            salary_fixed: None,
            salary_currency: None,
            salary_period: None,
            is_salary_estimated: true,
            skill_tags: None,
            experience_level: None,
            summary: None,
            locations: None,
            updated_at: Utc::now(),
        }
    }

    /// Split the stored delimited skill tags into a display list.
    pub fn skill_tag_list(&self) -> Vec<String> {
        match &self.skill_tags {
            Some(tags) if !tags.trim().is_empty() => tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether any salary field is populated.
    pub fn has_salary(&self) -> bool {
        self.salary_min.is_some()
            || self.salary_max.is_some()
            || self.salary_fixed.is_some()
            || self.salary_currency.is_some()
            || self.salary_period.is_some()
    }
}

/// Successfully parsed enrichment output, ready to persist on `complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_fixed: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<SalaryPeriod>,
    pub is_salary_estimated: bool,
    /// Comma-delimited stored form, already joined from the model's list.
    pub skill_tags: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub summary: Option<String>,
    pub locations: Option<Vec<JobLocation>>,
}

/// Per-status analysis counts for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

// =============================================================================
// SEARCH DOCUMENT
// =============================================================================

/// Salary sub-object of a search document. Members not present in the
/// analysis serialize as `null`; the whole object is omitted from the
/// document when no field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub fixed: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<SalaryPeriod>,
}

/// The canonical searchable projection of a job and its completed analysis.
///
/// Disposable: never mutated independently, always rebuilt from the source
/// pair and replaced wholesale in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: Uuid,
    pub title: String,
    pub full_description: String,
    pub url: String,
    pub company: CompanyBrief,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    /// Canonical `YYYY-MM-DDTHH:MM:SS`; omitted when the raw date was
    /// unparseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    pub is_remote: bool,
    pub expired: bool,
    pub skill_tags: Vec<String>,
    pub summary: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<SalaryRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<JobLocation>>,
}

// =============================================================================
// SEARCH REQUEST / RESPONSE
// =============================================================================

/// Result ordering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Relevance-first; the free-text clause is mandatory.
    #[default]
    Relevance,
    /// Newest-first; the free-text clause still gates out irrelevant
    /// documents via a minimum-score floor.
    Date,
}

/// A structured search request against the job index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query. `None` browses by filters alone; empty or
    /// whitespace-only text is a validation error.
    pub q: Option<String>,
    pub location: Option<String>,
    pub employment_types: Vec<String>,
    pub experience_levels: Vec<ExperienceLevel>,
    pub company_ids: Vec<Uuid>,
    pub is_remote: Option<bool>,
    pub sort: SortMode,
    pub page: i64,
    pub per_page: i64,
}

impl SearchRequest {
    /// New request with default pagination.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            page: 1,
            per_page: crate::defaults::SEARCH_PER_PAGE,
            ..Default::default()
        }
    }

    /// Filter-only browse request (no free text).
    pub fn browse() -> Self {
        Self {
            q: None,
            sort: SortMode::Date,
            page: 1,
            per_page: crate::defaults::SEARCH_PER_PAGE,
            ..Default::default()
        }
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: i64, per_page: i64) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }
}

/// One decoded search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHit {
    pub id: Uuid,
    pub title: String,
    pub company: CompanyBrief,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub posted_date: Option<String>,
    pub is_remote: bool,
    pub url: Option<String>,
    pub skill_tags: Vec<String>,
    pub summary: Option<String>,
    pub salary_range: Option<SalaryRange>,
    pub experience_level: Option<ExperienceLevel>,
    pub expired: bool,
    /// Engine-assigned relevance score; 0.0 when the engine omits it.
    pub score: f64,
}

/// Paged search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub results: Vec<JobHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_status_round_trip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::from_str_lossy(status.as_str()), status);
        }
    }

    #[test]
    fn test_analysis_status_unknown_falls_back_to_pending() {
        assert_eq!(
            AnalysisStatus::from_str_lossy("indexed"),
            AnalysisStatus::Pending
        );
        assert_eq!(AnalysisStatus::from_str_lossy(""), AnalysisStatus::Pending);
    }

    #[test]
    fn test_experience_level_ordering() {
        assert!(ExperienceLevel::Entry < ExperienceLevel::Mid);
        assert!(ExperienceLevel::Mid < ExperienceLevel::Senior);
        assert!(ExperienceLevel::Senior < ExperienceLevel::Lead);
        assert!(ExperienceLevel::Lead < ExperienceLevel::Executive);
    }

    #[test]
    fn test_experience_level_parse_case_insensitive() {
        assert_eq!(
            ExperienceLevel::parse("senior"),
            Some(ExperienceLevel::Senior)
        );
        assert_eq!(
            ExperienceLevel::parse("SENIOR"),
            Some(ExperienceLevel::Senior)
        );
        assert_eq!(
            ExperienceLevel::parse("  Lead "),
            Some(ExperienceLevel::Lead)
        );
    }

    #[test]
    fn test_experience_level_parse_out_of_vocabulary() {
        assert_eq!(ExperienceLevel::parse("PRINCIPAL"), None);
        assert_eq!(ExperienceLevel::parse(""), None);
        assert_eq!(ExperienceLevel::parse("senior-ish"), None);
    }

    #[test]
    fn test_salary_period_parse() {
        assert_eq!(SalaryPeriod::parse("year"), Some(SalaryPeriod::Year));
        assert_eq!(SalaryPeriod::parse("HOUR"), Some(SalaryPeriod::Hour));
        assert_eq!(SalaryPeriod::parse("fortnight"), None);
    }

    #[test]
    fn test_experience_level_serde_uppercase() {
        let json = serde_json::to_string(&ExperienceLevel::Senior).unwrap();
        assert_eq!(json, "\"SENIOR\"");
        let back: ExperienceLevel = serde_json::from_str("\"LEAD\"").unwrap();
        assert_eq!(back, ExperienceLevel::Lead);
    }

    #[test]
    fn test_skill_tag_list_splits_stored_form() {
        let mut analysis = Analysis::pending(Uuid::new_v4());
        analysis.skill_tags = Some("Go, Kubernetes, PostgreSQL".to_string());
        assert_eq!(
            analysis.skill_tag_list(),
            vec!["Go", "Kubernetes", "PostgreSQL"]
        );
    }

    #[test]
    fn test_skill_tag_list_empty() {
        let mut analysis = Analysis::pending(Uuid::new_v4());
        assert!(analysis.skill_tag_list().is_empty());
        analysis.skill_tags = Some("   ".to_string());
        assert!(analysis.skill_tag_list().is_empty());
    }

    #[test]
    fn test_has_salary() {
        let mut analysis = Analysis::pending(Uuid::new_v4());
        assert!(!analysis.has_salary());
        analysis.salary_currency = Some("USD".to_string());
        assert!(analysis.has_salary());
    }

    #[test]
    fn test_search_document_omits_empty_salary_range() {
        let doc = SearchDocument {
            id: Uuid::new_v4(),
            title: "Platform Engineer".to_string(),
            full_description: "Build platforms".to_string(),
            url: "https://example.com/jobs/1".to_string(),
            company: CompanyBrief {
                id: Uuid::new_v4(),
                name: "Acme".to_string(),
                icon_url: None,
            },
            location: None,
            employment_type: None,
            posted_date: None,
            is_remote: false,
            expired: false,
            skill_tags: vec![],
            summary: None,
            experience_level: None,
            salary_range: None,
            locations: None,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("salary_range").is_none());
        assert!(json.get("posted_date").is_none());
    }

    #[test]
    fn test_search_document_salary_members_null_when_partial() {
        let range = SalaryRange {
            min: Some(100_000.0),
            max: Some(130_000.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&range).unwrap();
        assert_eq!(json["min"], 100_000.0);
        assert!(json["fixed"].is_null());
        assert!(json["currency"].is_null());
    }

    #[test]
    fn test_search_request_builders() {
        let req = SearchRequest::new("rust engineer")
            .with_sort(SortMode::Date)
            .with_page(2, 25);
        assert_eq!(req.q.as_deref(), Some("rust engineer"));
        assert_eq!(req.sort, SortMode::Date);
        assert_eq!(req.page, 2);
        assert_eq!(req.per_page, 25);
    }

    #[test]
    fn test_browse_request_has_no_query() {
        let req = SearchRequest::browse();
        assert!(req.q.is_none());
        assert_eq!(req.sort, SortMode::Date);
    }
}
