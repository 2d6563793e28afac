//! Index mapping for the job search document.

use serde_json::{json, Value as JsonValue};

/// Current mapping for job documents.
///
/// `title`, `company.name`, and `skill_tags` carry `.keyword` sub-fields so
/// exact matches can be boosted above analyzed-text matches.
pub fn job_mapping() -> JsonValue {
    json!({
        "mappings": {
            "properties": {
                "id": {"type": "keyword"},
                "title": {
                    "type": "text",
                    "analyzer": "standard",
                    "fields": {
                        "keyword": {"type": "keyword"}
                    }
                },
                "full_description": {
                    "type": "text",
                    "analyzer": "standard"
                },
                "url": {"type": "keyword"},
                "company": {
                    "properties": {
                        "id": {"type": "keyword"},
                        "name": {
                            "type": "text",
                            "fields": {
                                "keyword": {"type": "keyword"}
                            }
                        },
                        "icon_url": {"type": "keyword"}
                    }
                },
                "skill_tags": {
                    "type": "text",
                    "fields": {
                        "keyword": {"type": "keyword"}
                    }
                },
                "summary": {"type": "text"},
                "experience_level": {"type": "keyword"},
                "location": {"type": "text"},
                "locations": {
                    "properties": {
                        "city": {"type": "keyword"},
                        "state": {"type": "keyword"},
                        "country": {"type": "keyword"}
                    }
                },
                "employment_type": {"type": "keyword"},
                "posted_date": {
                    "type": "date",
                    "format": "strict_date_optional_time||date_optional_time"
                },
                "is_remote": {"type": "boolean"},
                "expired": {"type": "boolean"},
                "salary_range": {
                    "properties": {
                        "min": {"type": "double"},
                        "max": {"type": "double"},
                        "fixed": {"type": "double"},
                        "currency": {"type": "keyword"},
                        "period": {"type": "keyword"}
                    }
                }
            }
        }
    })
}
