//! Shape check for a finished evidence directory.
//!
//! Only presence and JSON types are checked; values are not interpreted.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::evidence::{ENV_FILE, REPORT_FILE, RESULTS_FILE};
use crate::manifest::MANIFEST_FILE;

pub const REQUIRED_FILES: [&str; 4] = [ENV_FILE, RESULTS_FILE, REPORT_FILE, MANIFEST_FILE];

const MIN_REPORT_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonKind {
    String,
    Number,
    Object,
    Array,
}

impl JsonKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

const RESULTS_SCHEMA: &[(&str, JsonKind)] = &[
    ("/schema_version", JsonKind::String),
    ("/data_status", JsonKind::String),
    ("/baseline", JsonKind::Object),
    ("/baseline/name", JsonKind::String),
    ("/baseline/version", JsonKind::String),
    ("/baseline/quant_profile", JsonKind::String),
    ("/baseline/backend", JsonKind::String),
    ("/device", JsonKind::Object),
    ("/device/os", JsonKind::String),
    ("/device/cpu", JsonKind::String),
    ("/device/ram_gb", JsonKind::String),
    ("/metrics", JsonKind::Object),
    ("/metrics/load_time_ms_p50", JsonKind::Number),
    ("/metrics/load_time_ms_p95", JsonKind::Number),
    ("/metrics/peak_memory_mb", JsonKind::Number),
    ("/metrics/long_run_minutes", JsonKind::Number),
    ("/metrics/crash_count", JsonKind::Number),
];

const ENV_SCHEMA: &[(&str, JsonKind)] = &[
    ("/schema_version", JsonKind::String),
    ("/generated_at_utc", JsonKind::String),
    ("/platform", JsonKind::Object),
    ("/platform/os", JsonKind::String),
    ("/platform/arch", JsonKind::String),
];

const MANIFEST_SCHEMA: &[(&str, JsonKind)] = &[
    ("/schema_version", JsonKind::String),
    ("/files", JsonKind::Array),
];

const MANIFEST_ENTRY_SCHEMA: &[(&str, JsonKind)] = &[
    ("/path", JsonKind::String),
    ("/sha256", JsonKind::String),
    ("/size_bytes", JsonKind::Number),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub problems: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Never fails: every defect becomes a line in the report.
#[must_use]
pub fn validate_pack(dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    let missing: Vec<&str> = REQUIRED_FILES
        .iter()
        .copied()
        .filter(|name| !dir.join(name).is_file())
        .collect();
    if !missing.is_empty() {
        report.problems.extend(
            missing
                .into_iter()
                .map(|name| format!("missing required artifact: {}", dir.join(name).display())),
        );
        return report;
    }

    for (file, schema) in [
        (ENV_FILE, ENV_SCHEMA),
        (RESULTS_FILE, RESULTS_SCHEMA),
        (MANIFEST_FILE, MANIFEST_SCHEMA),
    ] {
        let Some(value) = load_json(&dir.join(file), &mut report) else {
            continue;
        };
        check_schema(file, "", &value, schema, &mut report);
        if file == MANIFEST_FILE
            && let Some(entries) = value.get("files").and_then(Value::as_array)
        {
            for (index, entry) in entries.iter().enumerate() {
                if !entry.is_object() {
                    report
                        .problems
                        .push(format!("{file}: /files/{index} must be an object"));
                    continue;
                }
                check_schema(file, &format!("/files/{index}"), entry, MANIFEST_ENTRY_SCHEMA, &mut report);
            }
        }
    }

    match std::fs::read_to_string(dir.join(REPORT_FILE)) {
        Ok(text) if text.trim().chars().count() < MIN_REPORT_CHARS => report
            .problems
            .push(format!("{REPORT_FILE} is too short to be a report")),
        Ok(_) => {}
        Err(error) => report.problems.push(format!("{REPORT_FILE}: {error}")),
    }

    report
}

fn load_json(path: &Path, report: &mut ValidationReport) -> Option<Value> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            report.problems.push(format!("{name}: {error}"));
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            report.problems.push(format!("{name}: invalid JSON: {error}"));
            None
        }
    }
}

fn check_schema(
    file: &str,
    prefix: &str,
    value: &Value,
    schema: &[(&str, JsonKind)],
    report: &mut ValidationReport,
) {
    for (pointer, kind) in schema {
        match value.pointer(pointer) {
            None => report
                .problems
                .push(format!("{file}: missing {prefix}{pointer}")),
            Some(found) if !kind.matches(found) => report.problems.push(format!(
                "{file}: {prefix}{pointer} expected {}",
                kind.name()
            )),
            Some(_) => {}
        }
    }
}
