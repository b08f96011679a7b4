// Report generation from lookup results

use serde::Serialize;
use serde_json::{Map, Value, json};
use squatwatch_scanner::{SearchResult, SquatRecord};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column order of the CSV export.
pub const CSV_FIELDS: [&str; 6] = [
    "domain",
    "country_code",
    "ip",
    "web_server",
    "email_server",
    "registry_info",
];

/// Current UTC time in the format used by the JSON export.
pub fn report_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One CSV line per record across all searches.
pub fn generate_csv_report(results: &[SearchResult]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(CSV_FIELDS)?;
    for record in results.iter().flat_map(|r| r.results.iter()) {
        writer.write_record(csv_row(record)?)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn csv_row(record: &SquatRecord) -> Result<[String; 6], csv::Error> {
    let registry = serde_json::to_string(&record.registry_info)
        .map_err(|e| csv::Error::from(std::io::Error::other(e)))?;

    Ok([
        record.domain.clone(),
        record.country_code.clone().unwrap_or_default(),
        record.ip.clone().unwrap_or_default(),
        record.web_server.to_string(),
        record.email_server.to_string(),
        registry,
    ])
}

/// `{"all_results": [...], "timestamp": ...}` with sorted keys and
/// four-space indentation.
pub fn generate_json_report(
    results: &[SearchResult],
    timestamp: &str,
) -> Result<String, serde_json::Error> {
    let document = sort_keys(json!({
        "timestamp": timestamp,
        "all_results": serde_json::to_value(results)?,
    }));

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Rebuilds objects in key order, whatever map backend serde_json was built with.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Console summary of a run
pub fn generate_text_report(results: &[SearchResult]) -> String {
    let total_records: usize = results.iter().map(|r| r.results.len()).sum();
    let web_servers = results
        .iter()
        .flat_map(|r| r.results.iter())
        .filter(|r| r.web_server)
        .count();
    let email_servers = results
        .iter()
        .flat_map(|r| r.results.iter())
        .filter(|r| r.email_server)
        .count();

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Domains searched: {}\n", results.len()));
    report.push_str(&format!("  Squatting domains found: {}\n", total_records));
    report.push_str(&format!("  With web server: {}\n", web_servers));
    report.push_str(&format!("  With email server: {}\n", email_servers));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for result in results {
        report.push_str(&format!("## {}\n", result.domain));
        if let Some(ref id) = result.search_id {
            report.push_str(&format!("  search id: {}\n", id));
        }
        report.push_str(&format!("  {} squatting domains\n\n", result.results.len()));

        for record in &result.results {
            let mut line = format!("  {}", record.domain);
            if let Some(ref cc) = record.country_code {
                line.push_str(&format!(" [{}]", cc));
            }
            if let Some(ref ip) = record.ip {
                line.push_str(&format!(" {}", ip));
            }
            if record.web_server {
                line.push_str(" web");
            }
            if record.email_server {
                line.push_str(" mail");
            }
            if let Some(registrar) = record.registry_info.get("Registrar") {
                line.push_str(&format!(" ({})", registrar));
            }
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
