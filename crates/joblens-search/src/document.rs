//! Document builder: pure projection of a job plus its completed analysis
//! into the canonical search document.

use chrono::{NaiveDate, NaiveDateTime};

use joblens_core::{Analysis, JobRecord, SalaryRange, SearchDocument};

/// Build the search document for a job and its analysis.
///
/// Callers only build for `completed` analyses; this function does not check
/// the status. The document is disposable and always rebuilt wholesale from
/// the source pair.
pub fn build_document(job: &JobRecord, analysis: &Analysis) -> SearchDocument {
    let salary_range = if analysis.has_salary() {
        Some(SalaryRange {
            min: analysis.salary_min,
            max: analysis.salary_max,
            fixed: analysis.salary_fixed,
            currency: analysis.salary_currency.clone(),
            period: analysis.salary_period,
        })
    } else {
        None
    };

    SearchDocument {
        id: job.id,
        title: job.title.clone(),
        full_description: job.full_description.clone(),
        url: job.url.clone(),
        company: job.company.clone(),
        location: job.location.clone(),
        employment_type: job.employment_type.clone(),
        posted_date: job.posted_date.as_deref().and_then(format_posted_date),
        is_remote: job.is_remote,
        expired: job.expired,
        skill_tags: analysis.skill_tag_list(),
        summary: analysis.summary.clone(),
        experience_level: analysis.experience_level,
        salary_range,
        locations: analysis.locations.clone(),
    }
}

/// Canonicalize a raw scraped date to `YYYY-MM-DDTHH:MM:SS`.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` and bare `YYYY-MM-DD`; anything else is
/// dropped rather than indexed as an unparseable date.
pub fn format_posted_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(
            date.and_hms_opt(0, 0, 0)?
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
        );
    }
    None
}
