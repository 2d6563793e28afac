//! Enrichment worker: prompt construction and strict response parsing.
//!
//! Given one job record, produces structured analysis fields by invoking the
//! rate-limited call gate, then validates the model's JSON against the fixed
//! vocabularies. Anything outside the vocabulary fails the job; values are
//! never guessed.

use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use joblens_core::{
    EnrichmentOutcome, Error, ExperienceLevel, JobLocation, JobRecord, Result, SalaryPeriod,
};

use crate::gate::CallGate;

/// System prompt for every enrichment call.
const SYSTEM_PROMPT: &str = "You are a job analysis assistant. Extract or estimate structured \
     information from job postings.";

/// Enrichment worker over a call gate.
pub struct Enricher {
    gate: CallGate,
}

impl Enricher {
    /// Create an enricher over the given gate.
    pub fn new(gate: CallGate) -> Self {
        Self { gate }
    }

    /// Enrich one job: build the prompt, call the gate, parse strictly.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn enrich(&self, job: &JobRecord) -> Result<EnrichmentOutcome> {
        let prompt = build_analysis_prompt(job);
        let raw = self.gate.complete(SYSTEM_PROMPT, &prompt).await?;

        let value: JsonValue = serde_json::from_str(raw.trim())
            .map_err(|e| Error::Enrichment(format!("model returned malformed JSON: {e}")))?;

        let outcome = parse_outcome(&value)?;
        debug!(
            subsystem = "enrich",
            component = "extractor",
            op = "enrich",
            "Parsed enrichment outcome"
        );
        Ok(outcome)
    }
}

/// Build the user prompt from the job's title, description, company, and
/// location.
pub fn build_analysis_prompt(job: &JobRecord) -> String {
    format!(
        r#"Analyze the following job posting and extract or estimate key information in JSON format:

Title: {title}
Description: {description}
Company Name: {company}
Location: {location}

Please extract and return a JSON object with the following structure:
{{
    "salary_min": number or null,      // Minimum salary amount
    "salary_max": number or null,      // Maximum salary amount
    "salary_fixed": number or null,    // Fixed/exact salary amount
    "salary_currency": string or null, // Currency code (e.g., "USD", "EUR", "GBP")
    "salary_period": string or null,   // One of: "HOUR", "DAY", "WEEK", "MONTH", "YEAR"
    "is_salary_estimated": boolean,    // IMPORTANT: Must be true if salary is estimated
    "skill_tags": [                    // List of 3-7 MOST important required skills
        string,                        // Focus on core technical skills and key technologies
        ...                            // e.g., ["Python", "AWS", "React"]
    ],
    "experience_level": string,        // One of: "ENTRY", "MID", "SENIOR", "LEAD", "EXECUTIVE"
    "summary": string,                 // 2-3 concise sentences summarizing key responsibilities
    "locations": [                     // Structured work locations, when stated
        {{"city": string or null, "state": string or null, "country": string or null}}
    ]
}}

IMPORTANT SALARY GUIDELINES:
1. First, carefully search for EXPLICIT salary information in the job description:
   - Look for specific numbers with currency symbols ($, €, £, etc.)
   - Look for phrases like "salary range", "compensation", "pay", etc.
   - Only set is_salary_estimated = false if you find EXPLICIT salary information

2. If NO EXPLICIT salary information is found:
   - You MUST set is_salary_estimated = true
   - Estimate salary based on:
     * Job title and seniority level
     * Location and local market rates
     * Company size and industry
     * Required skills and experience
   - Use USD for estimates unless location suggests otherwise
   - Provide a reasonable range (min/max) rather than fixed amount

3. Double check before responding:
   - If you're providing estimated values, verify is_salary_estimated = true
   - If you found explicit salary in the text, verify is_salary_estimated = false

Return only the JSON object, no additional text."#,
        title = job.title,
        description = job.full_description,
        company = job.company.name,
        location = job.location.as_deref().unwrap_or("Not specified"),
    )
}

/// Parse the model's JSON object into an [`EnrichmentOutcome`], enforcing
/// the fixed vocabularies. Out-of-vocabulary values fail the call.
pub fn parse_outcome(value: &JsonValue) -> Result<EnrichmentOutcome> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Enrichment("model response is not a JSON object".to_string()))?;

    let experience_level = match obj.get("experience_level") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(ExperienceLevel::parse(s).ok_or_else(|| {
            Error::Enrichment(format!("experience_level outside vocabulary: {s:?}"))
        })?),
        Some(other) => {
            return Err(Error::Enrichment(format!(
                "experience_level must be a string, got {other}"
            )))
        }
    };

    let salary_period = match obj.get("salary_period") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(SalaryPeriod::parse(s).ok_or_else(|| {
            Error::Enrichment(format!("salary_period outside vocabulary: {s:?}"))
        })?),
        Some(other) => {
            return Err(Error::Enrichment(format!(
                "salary_period must be a string, got {other}"
            )))
        }
    };

    let skill_tags = match obj.get("skill_tags") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::Array(items)) => {
            let mut tags = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(tag) if !tag.trim().is_empty() => tags.push(tag.trim().to_string()),
                    Some(_) => {}
                    None => {
                        return Err(Error::Enrichment(format!(
                            "skill_tags entries must be strings, got {item}"
                        )))
                    }
                }
            }
            if tags.is_empty() {
                None
            } else {
                Some(tags.join(", "))
            }
        }
        Some(other) => {
            return Err(Error::Enrichment(format!(
                "skill_tags must be a list, got {other}"
            )))
        }
    };

    let locations = match obj.get("locations") {
        None | Some(JsonValue::Null) => None,
        Some(value) => {
            let parsed: Vec<JobLocation> = serde_json::from_value(value.clone())
                .map_err(|e| Error::Enrichment(format!("locations malformed: {e}")))?;
            let normalized: Vec<JobLocation> =
                parsed.into_iter().map(normalize_location).collect();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            }
        }
    };

    Ok(EnrichmentOutcome {
        salary_min: number_field(obj, "salary_min")?,
        salary_max: number_field(obj, "salary_max")?,
        salary_fixed: number_field(obj, "salary_fixed")?,
        salary_currency: string_field(obj, "salary_currency")?,
        salary_period,
        // Missing flag is read as estimated: the model only omits it when it
        // failed to follow the explicit-salary instructions.
        is_salary_estimated: match obj.get("is_salary_estimated") {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::Bool(b)) => *b,
            Some(other) => {
                return Err(Error::Enrichment(format!(
                    "is_salary_estimated must be a boolean, got {other}"
                )))
            }
        },
        skill_tags,
        experience_level,
        summary: string_field(obj, "summary")?,
        locations,
    })
}

fn number_field(obj: &serde_json::Map<String, JsonValue>, key: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(Error::Enrichment(format!(
            "{key} must be a number, got {other}"
        ))),
    }
}

fn string_field(obj: &serde_json::Map<String, JsonValue>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::Enrichment(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

/// Post-process one structured location.
///
/// A city reading "remote"/"remotely" is cleared while any stated country is
/// kept; country codes are canonicalized to full names for US and UK. All
/// other values pass through unchanged.
pub fn normalize_location(mut location: JobLocation) -> JobLocation {
    if let Some(city) = &location.city {
        if matches!(
            city.trim().to_ascii_lowercase().as_str(),
            "remote" | "remotely"
        ) {
            location.city = None;
        }
    }

    if let Some(country) = &location.country {
        location.country = Some(canonical_country(country));
    }

    location
}

/// Canonicalize well-known country codes to full names.
fn canonical_country(country: &str) -> String {
    match country.trim().to_ascii_uppercase().as_str() {
        "US" | "USA" => "United States".to_string(),
        "UK" | "GB" => "United Kingdom".to_string(),
        _ => country.to_string(),
    }
}
