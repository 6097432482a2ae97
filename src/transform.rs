//! Transform phase: coerce semi-structured scraper entries into the fixed
//! [`JournalRecord`] schema.
//!
//! Missing fields become empty strings / false. An entry that cannot be
//! coerced at all is counted as a transformation error and excluded; the run
//! continues.
use crate::extract::RawEntry;
use crate::model::{JournalRecord, RunStats};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument, warn};

static PROFILE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/profile/(\d+)").expect("valid profile id regex"));
static P_ISSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"P-ISSN\s*:\s*(\d+)").expect("valid p-issn regex"));
static E_ISSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E-ISSN\s*:\s*(\d+)").expect("valid e-issn regex"));
static SUBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Subject Area\s*:\s*([^|]+)").expect("valid subject regex"));
static ACCREDITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(S\d+)").expect("valid accreditation regex"));

/// Transform raw entries into records. Errors are tallied in `stats`.
#[instrument(skip_all)]
pub fn transform_entries(
    entries: &[RawEntry],
    started_at: DateTime<Local>,
    stats: &mut RunStats,
) -> Vec<JournalRecord> {
    let extracted_at = started_at.to_rfc3339();
    let mut records = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        match coerce_entry(entry, (idx + 1) as u32, &extracted_at) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(file = %entry.source_file, index = idx + 1, reason, "entry failed transformation");
                stats.record_error(format!(
                    "transform {} entry #{}: {reason}",
                    entry.source_file,
                    idx + 1
                ));
                stats.transformation_errors += 1;
            }
        }
    }

    stats.records_transformed = records.len() as u32;
    info!(
        transformed = records.len(),
        errors = stats.transformation_errors,
        "transform complete"
    );
    records
}

fn coerce_entry(
    entry: &RawEntry,
    extraction_index: u32,
    extracted_at: &str,
) -> Result<JournalRecord, &'static str> {
    let obj = entry.value.as_object().ok_or("entry is not a JSON object")?;

    let journal_name = string_field(obj.get("journal_name"));
    let profile_url = string_field(obj.get("profile_url"));

    // The stable identifier: explicit field first, else derived from the
    // profile URL.
    let mut journal_id = string_field(obj.get("journal_id"));
    if journal_id.is_empty() {
        if let Some(caps) = PROFILE_ID_RE.captures(&profile_url) {
            journal_id = caps[1].to_string();
        }
    }

    if journal_name.is_empty() && journal_id.is_empty() {
        return Err("entry has neither a journal name nor an identifier");
    }

    // ISSN and subject area: direct fields win; otherwise parse the combined
    // profile text blob the scraper captures verbatim.
    let profile_text = string_field(obj.get("profile_text"));
    let p_issn = non_empty_or(string_field(obj.get("p_issn")), || {
        capture(&P_ISSN_RE, &profile_text)
    });
    let e_issn = non_empty_or(string_field(obj.get("e_issn")), || {
        capture(&E_ISSN_RE, &profile_text)
    });
    let subject_area = non_empty_or(string_field(obj.get("subject_area")), || {
        capture(&SUBJECT_RE, &profile_text).trim().to_string()
    });
    let accreditation = non_empty_or(string_field(obj.get("accreditation")), || {
        capture(&ACCREDITATION_RE, &profile_text)
    });

    let garuda_url = string_field(obj.get("garuda_url"));
    let is_garuda_indexed = bool_field(obj.get("is_garuda_indexed")) || !garuda_url.is_empty();

    Ok(JournalRecord {
        journal_id,
        journal_name,
        profile_url,
        google_scholar_url: string_field(obj.get("google_scholar_url")),
        website_url: string_field(obj.get("website_url")),
        editor_url: string_field(obj.get("editor_url")),
        affiliation: string_field(obj.get("affiliation")),
        affiliation_url: string_field(obj.get("affiliation_url")),
        p_issn,
        e_issn,
        subject_area,
        accreditation,
        is_scopus_indexed: bool_field(obj.get("is_scopus_indexed")),
        is_garuda_indexed,
        garuda_url,
        impact_score: string_field(obj.get("impact_score")),
        h5_index: string_field(obj.get("h5_index")),
        citations_5yr: string_field(obj.get("citations_5yr")),
        citations_total: string_field(obj.get("citations_total")),
        cover_image_url: string_field(obj.get("cover_image_url")),
        source_file: entry.source_file.clone(),
        extraction_index,
        extracted_at: extracted_at.to_string(),
    })
}

/// Coerce a JSON value to a string field: strings pass through, numbers are
/// formatted, everything else is the empty marker.
fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn bool_field(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn non_empty_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        fallback()
    } else {
        value
    }
}

fn capture(re: &Regex, haystack: &str) -> String {
    re.captures(haystack)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry(value: Value) -> RawEntry {
        RawEntry {
            source_file: "page1.json".into(),
            value,
        }
    }

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 12, 6, 5, 9).unwrap()
    }

    #[test]
    fn full_entry_maps_all_fields() {
        let raw = entry(json!({
            "journal_name": "Jurnal Informatika",
            "profile_url": "https://sinta.example/journals/profile/12345",
            "google_scholar_url": "https://scholar.google.com/x",
            "affiliation": "Universitas Contoh",
            "p_issn": "20881234",
            "e_issn": "25021234",
            "subject_area": "Computer Science",
            "accreditation": "S2",
            "is_scopus_indexed": true,
            "impact_score": "1.25",
            "h5_index": 14,
        }));

        let mut stats = RunStats::default();
        let records = transform_entries(&[raw], ts(), &mut stats);

        assert_eq!(stats.transformation_errors, 0);
        let r = &records[0];
        assert_eq!(r.journal_id, "12345");
        assert_eq!(r.journal_name, "Jurnal Informatika");
        assert_eq!(r.h5_index, "14");
        assert!(r.is_scopus_indexed);
        assert_eq!(r.extraction_index, 1);
        assert_eq!(r.source_file, "page1.json");
    }

    #[test]
    fn issn_and_accreditation_parsed_from_profile_text() {
        let raw = entry(json!({
            "journal_name": "Jurnal Teknik",
            "profile_text": "P-ISSN : 14111111 | E-ISSN : 22222222 | Subject Area : Engineering | Accredited S3",
        }));

        let mut stats = RunStats::default();
        let records = transform_entries(&[raw], ts(), &mut stats);

        let r = &records[0];
        assert_eq!(r.p_issn, "14111111");
        assert_eq!(r.e_issn, "22222222");
        assert_eq!(r.subject_area, "Engineering");
        assert_eq!(r.accreditation, "S3");
    }

    #[test]
    fn missing_fields_become_empty_markers() {
        let raw = entry(json!({"journal_name": "Bare"}));
        let mut stats = RunStats::default();
        let records = transform_entries(&[raw], ts(), &mut stats);
        let r = &records[0];
        assert_eq!(r.journal_id, "");
        assert_eq!(r.p_issn, "");
        assert!(!r.is_scopus_indexed);
    }

    #[test]
    fn garuda_url_implies_indexed() {
        let raw = entry(json!({
            "journal_name": "G",
            "garuda_url": "https://garuda.example/journal/1",
        }));
        let mut stats = RunStats::default();
        let records = transform_entries(&[raw], ts(), &mut stats);
        assert!(records[0].is_garuda_indexed);
    }

    #[test]
    fn malformed_entries_are_counted_and_excluded() {
        let entries = vec![
            entry(json!({"journal_name": "Keep"})),
            entry(json!("just a string")),
            entry(json!({"impact_score": "0.5"})),
        ];
        let mut stats = RunStats::default();
        let records = transform_entries(&entries, ts(), &mut stats);

        assert_eq!(records.len(), 1);
        assert_eq!(stats.records_transformed, 1);
        assert_eq!(stats.transformation_errors, 2);
        assert_eq!(stats.errors.len(), 2);
    }
}
