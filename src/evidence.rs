//! Result record, report document and environment fingerprint.
//!
//! Everything here renders to strings first; [`write_documents`] is only
//! called once the whole pack has been computed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PackError, PackResult};
use crate::metrics::VariantMetrics;
use crate::model::{Asset, ComparisonFrame, EncodeOutput, RunConfig};

pub const RESULTS_SCHEMA_VERSION: &str = "0.1";
pub const ENV_SCHEMA_VERSION: &str = "0.1";
pub const RESULTS_FILE: &str = "results.json";
pub const REPORT_FILE: &str = "report.md";
pub const ENV_FILE: &str = "env.json";

const BASELINE_NAME: &str = "av1_fgs_evidence";
const BASELINE_VERSION: &str = "0.1";
const BACKEND: &str = "ffmpeg+libsvtav1+libvmaf";
const NOTES: &str = "Compares AV1 CRF-only against AV1 with film grain synthesis. \
Synthesized grain can lower pixel-fidelity metrics (PSNR/SSIM) while improving \
perceptual ones (VMAF). No claims beyond the artifacts in this directory.";

// ---------------------------------------------------------------------------
// Result record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub schema_version: String,
    pub data_status: String,
    pub baseline: Baseline,
    pub device: Device,
    pub metrics: Metrics,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub name: String,
    pub version: String,
    pub quant_profile: String,
    pub backend: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub os: String,
    pub cpu: String,
    pub ram_gb: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub load_time_ms_p50: f64,
    pub load_time_ms_p95: f64,
    pub peak_memory_mb: f64,
    pub long_run_minutes: f64,
    pub crash_count: u32,
    #[serde(flatten)]
    pub extras: BTreeMap<String, f64>,
}

/// Everything the assembler reads. Borrowed; the assembler owns nothing.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceInputs<'a> {
    pub config: &'a RunConfig,
    pub asset: &'a Asset,
    pub plain: &'a EncodeOutput,
    pub fgs: &'a EncodeOutput,
    pub plain_metrics: &'a VariantMetrics,
    pub fgs_metrics: &'a VariantMetrics,
    pub comparison: Option<&'a ComparisonFrame>,
}

impl EvidenceInputs<'_> {
    fn total_encode_ms(&self) -> f64 {
        self.plain.encode_ms.saturating_add(self.fgs.encode_ms) as f64
    }
}

/// `input / max(output, 1)`.
#[must_use]
pub fn compression_ratio(input_bytes: u64, output_bytes: u64) -> f64 {
    input_bytes as f64 / output_bytes.max(1) as f64
}

#[must_use]
pub fn build_record(inputs: &EvidenceInputs<'_>) -> ResultRecord {
    let total_ms = inputs.total_encode_ms();
    let mut extras = BTreeMap::new();

    let input_size = inputs.asset.size_bytes;
    extras.insert("input_size_bytes".to_owned(), input_size as f64);
    extras.insert("plain_size_bytes".to_owned(), inputs.plain.size_bytes as f64);
    extras.insert("fgs_size_bytes".to_owned(), inputs.fgs.size_bytes as f64);
    extras.insert(
        "plain_compression_ratio".to_owned(),
        compression_ratio(input_size, inputs.plain.size_bytes),
    );
    extras.insert(
        "fgs_compression_ratio".to_owned(),
        compression_ratio(input_size, inputs.fgs.size_bytes),
    );
    extras.insert("encode_plain_s".to_owned(), inputs.plain.encode_secs());
    extras.insert("encode_fgs_s".to_owned(), inputs.fgs.encode_secs());
    extras.insert(
        "audit_frames_limit".to_owned(),
        f64::from(inputs.config.frames),
    );
    extras.insert(
        "audit_vmaf_n_subsample".to_owned(),
        f64::from(inputs.config.n_subsample),
    );

    for (name, metrics) in [("plain", inputs.plain_metrics), ("fgs", inputs.fgs_metrics)] {
        insert_variant_extras(&mut extras, name, metrics);
    }

    ResultRecord {
        schema_version: RESULTS_SCHEMA_VERSION.to_owned(),
        data_status: "measured".to_owned(),
        baseline: Baseline {
            name: BASELINE_NAME.to_owned(),
            version: BASELINE_VERSION.to_owned(),
            quant_profile: inputs.config.quant_profile(),
            backend: BACKEND.to_owned(),
        },
        device: Device {
            os: std::env::consts::OS.to_owned(),
            cpu: processor_name(),
            ram_gb: "unknown".to_owned(),
        },
        metrics: Metrics {
            load_time_ms_p50: total_ms,
            load_time_ms_p95: total_ms,
            peak_memory_mb: 0.0,
            long_run_minutes: total_ms / 60_000.0,
            crash_count: 0,
            extras,
        },
        notes: NOTES.to_owned(),
    }
}

/// Processor model string, `"unknown"` when the host does not expose one.
fn processor_name() -> String {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .as_deref()
        .and_then(parse_cpu_model)
        .unwrap_or_else(|| "unknown".to_owned())
}

/// First `model name` (x86) or `Processor` / `Hardware` (ARM) entry.
fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (matches!(key.trim(), "model name" | "Processor" | "Hardware") && !value.is_empty())
            .then(|| value.to_owned())
    })
}

fn insert_variant_extras(extras: &mut BTreeMap<String, f64>, name: &str, metrics: &VariantMetrics) {
    extras.extend([
        (format!("psnr_{name}_mean_db"), metrics.psnr.mean_db),
        (format!("ssim_{name}_mean"), metrics.ssim.mean),
        (format!("vmaf_{name}_mean"), metrics.vmaf.mean),
        (format!("psnr_{name}_first_n"), metrics.psnr.first.n as f64),
        (format!("psnr_{name}_first_avg_db"), metrics.psnr.first.psnr_avg_db),
        (format!("ssim_{name}_first_n"), metrics.ssim.first.n as f64),
        (format!("ssim_{name}_first_all"), metrics.ssim.first.ssim_all),
        (format!("vmaf_{name}_first_frameNum"), metrics.vmaf.first.frame_num as f64),
        (format!("vmaf_{name}_first"), metrics.vmaf.first.vmaf),
    ]);
}

// ---------------------------------------------------------------------------
// Template merge
// ---------------------------------------------------------------------------

/// Template must be a JSON object.
pub fn load_template(path: &Path) -> PackResult<Value> {
    let raw = std::fs::read_to_string(path)?;
    let template: Value = serde_json::from_str(&raw)?;
    if !template.is_object() {
        return Err(PackError::InvalidRequest(format!(
            "result template `{}` must be a JSON object",
            path.display()
        )));
    }
    Ok(template)
}

/// Recursively overlay `computed` onto `base`. Objects merge key by key;
/// any other value in `computed` replaces what `base` had.
pub fn deep_merge(base: &mut Value, computed: Value) {
    match (base, computed) {
        (Value::Object(base_map), Value::Object(computed_map)) => {
            for (key, value) in computed_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// The record as written to `results.json`, merged over `template` if given.
pub fn record_value(record: &ResultRecord, template: Option<Value>) -> PackResult<Value> {
    let computed = serde_json::to_value(record)?;
    Ok(match template {
        Some(mut base) => {
            deep_merge(&mut base, computed);
            base
        }
        None => computed,
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[must_use]
pub fn render_report(inputs: &EvidenceInputs<'_>) -> String {
    let config = inputs.config;
    let asset = inputs.asset;
    let variants = [("plain", inputs.plain_metrics), ("fgs", inputs.fgs_metrics)];
    let probe_json = serde_json::to_string_pretty(&asset.probe).unwrap_or_else(|_| "{}".to_owned());
    let frames_line = if config.frames > 0 {
        format!("- Frames limit: {} (smoke test)", config.frames)
    } else {
        "- Frames limit: 0 (full)".to_owned()
    };

    let mut lines = vec![
        "# AV1 film grain synthesis evidence (measured)".to_owned(),
        String::new(),
        "## Summary".to_owned(),
        "- Goal: compare size and audit metrics of AV1 CRF-only against AV1 with standard film grain synthesis.".to_owned(),
        format!(
            "- Evidence: the MP4 encodes, PSNR/SSIM/VMAF logs and `{RESULTS_FILE}` in this directory."
        ),
        String::new(),
        "## Setup".to_owned(),
        "- Input: `<user_provided_video>` (name and path withheld)".to_owned(),
        format!("- CRF: {}, preset: {}", config.crf, config.preset),
        format!("- FGS: level={}, denoise={}", config.fgs_level, config.fgs_denoise),
        frames_line,
        format!("- VMAF model: `{}`", config.vmaf_model),
        format!("- VMAF n_subsample: {}", config.n_subsample),
        String::new(),
        "## Input info (ffprobe)".to_owned(),
        format!("- Size: {} bytes", asset.size_bytes),
        format!("- Resolution: {}", describe_resolution(asset)),
        format!("- Frame rate: {}", describe_optional(asset.frame_rate, 3, " fps")),
        format!("- Duration: {}", describe_optional(asset.duration_sec, 3, " s")),
        String::new(),
        "```json".to_owned(),
        probe_json,
        "```".to_owned(),
        String::new(),
        "## Size / Compression ratio".to_owned(),
        String::new(),
        "| output | size (bytes) | ratio (input/output) |".to_owned(),
        "|---|---:|---:|".to_owned(),
    ];
    lines.extend([inputs.plain, inputs.fgs].into_iter().map(|encode| {
        format!(
            "| {} | {} | {:.2}x |",
            encode.variant,
            encode.size_bytes,
            compression_ratio(asset.size_bytes, encode.size_bytes)
        )
    }));

    lines.extend([
        String::new(),
        "## Audit metrics (mean)".to_owned(),
        String::new(),
        "| output | PSNR (dB) | SSIM | VMAF |".to_owned(),
        "|---|---:|---:|---:|".to_owned(),
    ]);
    lines.extend(variants.iter().map(|(name, metrics)| {
        format!(
            "| {name} | {:.2} | {:.4} | {:.2} |",
            metrics.psnr.mean_db, metrics.ssim.mean, metrics.vmaf.mean
        )
    }));

    lines.extend([
        String::new(),
        "## Frame 0 comparison + first-sample metrics".to_owned(),
        String::new(),
    ]);
    if let Some(frame) = inputs.comparison {
        let name = frame.file_name();
        lines.extend([
            "Panels, left to right: source | plain | fgs.".to_owned(),
            String::new(),
            format!("![{}]({name})", name.trim_end_matches(".png")),
            String::new(),
        ]);
    }
    lines.extend([
        "| output | PSNR (first n) | SSIM (first n) | VMAF (first frameNum) |".to_owned(),
        "|---|---:|---:|---:|".to_owned(),
    ]);
    lines.extend(variants.iter().map(|(name, metrics)| {
        format!(
            "| {name} | {:.2} (n={}) | {:.4} (n={}) | {:.2} (frameNum={}) |",
            metrics.psnr.first.psnr_avg_db,
            metrics.psnr.first.n,
            metrics.ssim.first.ssim_all,
            metrics.ssim.first.n,
            metrics.vmaf.first.vmaf,
            metrics.vmaf.first.frame_num
        )
    }));

    lines.extend([
        String::new(),
        "## Notes".to_owned(),
        "- FGS is standard AV1 side information; synthesized texture can lower PSNR/SSIM.".to_owned(),
        "- VMAF leans perceptual; on some content FGS may match the original look more closely.".to_owned(),
        "- No input footage is published; every conclusion rests on the files in this directory.".to_owned(),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn describe_resolution(asset: &Asset) -> String {
    match (asset.width, asset.height) {
        (Some(width), Some(height)) => format!("{width}x{height}"),
        _ => "unknown".to_owned(),
    }
}

fn describe_optional(value: Option<f64>, precision: usize, unit: &str) -> String {
    value.map_or_else(
        || "unknown".to_owned(),
        |value| format!("{value:.precision$}{unit}"),
    )
}

// ---------------------------------------------------------------------------
// Environment fingerprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvFingerprint {
    pub schema_version: String,
    pub generated_at_utc: String,
    pub run_id: String,
    pub ffmpeg_version: String,
    pub ffprobe_version: String,
    pub platform: PlatformInfo,
    pub fgs_evidence_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub family: String,
}

#[must_use]
pub fn build_env_fingerprint(
    run_id: &str,
    ffmpeg_version: &str,
    ffprobe_version: &str,
) -> EnvFingerprint {
    EnvFingerprint {
        schema_version: ENV_SCHEMA_VERSION.to_owned(),
        generated_at_utc: chrono::Utc::now().to_rfc3339(),
        run_id: run_id.to_owned(),
        ffmpeg_version: ffmpeg_version.to_owned(),
        ffprobe_version: ffprobe_version.to_owned(),
        platform: PlatformInfo {
            os: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            family: std::env::consts::FAMILY.to_owned(),
        },
        fgs_evidence_version: env!("CARGO_PKG_VERSION").to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Fully rendered pack documents, ready to be written.
#[derive(Debug, Clone)]
pub struct EvidenceDocuments {
    pub results: String,
    pub report: String,
}

/// Render both documents in memory. Nothing touches disk.
pub fn assemble(
    inputs: &EvidenceInputs<'_>,
    template: Option<Value>,
) -> PackResult<EvidenceDocuments> {
    let record = build_record(inputs);
    let value = record_value(&record, template)?;
    Ok(EvidenceDocuments {
        results: serde_json::to_string_pretty(&value)?,
        report: render_report(inputs),
    })
}

/// Returns `(results_path, report_path)`.
pub fn write_documents(out_dir: &Path, documents: &EvidenceDocuments) -> PackResult<(PathBuf, PathBuf)> {
    let results_path = out_dir.join(RESULTS_FILE);
    let report_path = out_dir.join(REPORT_FILE);
    std::fs::write(&results_path, &documents.results)?;
    std::fs::write(&report_path, &documents.report)?;
    Ok((results_path, report_path))
}

pub fn write_env(out_dir: &Path, env: &EnvFingerprint) -> PackResult<PathBuf> {
    let path = out_dir.join(ENV_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(env)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{Value, json};

    use super::{
        EvidenceInputs, ResultRecord, assemble, build_env_fingerprint, build_record,
        compression_ratio, deep_merge, load_template, parse_cpu_model, record_value,
        render_report, write_documents,
    };
    use crate::error::PackError;
    use crate::metrics::{
        PsnrFrameSample, PsnrSummary, SsimFrameSample, SsimSummary, VariantMetrics,
        VmafFrameSample, VmafSummary,
    };
    use crate::model::{Asset, CompareMode, ComparisonFrame, EncodeOutput, RunConfig, Variant};

    struct Fixture {
        config: RunConfig,
        asset: Asset,
        plain: EncodeOutput,
        fgs: EncodeOutput,
        plain_metrics: VariantMetrics,
        fgs_metrics: VariantMetrics,
        comparison: ComparisonFrame,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = RunConfig::with_defaults("/v/in.y4m", "/out");
            config.frames = 5;
            Self {
                config,
                asset: Asset {
                    path: PathBuf::from("/v/in.y4m"),
                    size_bytes: 1_000_000,
                    duration_sec: Some(0.4),
                    width: Some(64),
                    height: Some(48),
                    frame_rate: Some(25.0),
                    probe: json!({"streams": [{"width": 64, "height": 48}]}),
                },
                plain: EncodeOutput {
                    variant: Variant::Plain,
                    path: PathBuf::from("/out/base_plain.mp4"),
                    size_bytes: 4_000,
                    encode_ms: 1_500,
                    cached: false,
                },
                fgs: EncodeOutput {
                    variant: Variant::Fgs,
                    path: PathBuf::from("/out/base_fgs.mp4"),
                    size_bytes: 3_000,
                    encode_ms: 2_500,
                    cached: false,
                },
                plain_metrics: metrics(31.5, 0.91, 80.25, 0),
                fgs_metrics: metrics(29.75, 0.88, 83.5, 0),
                comparison: ComparisonFrame {
                    mode: CompareMode::Redacted,
                    path: PathBuf::from("/out/frame0_compare_redacted.png"),
                    cached: false,
                },
            }
        }

        fn inputs(&self, with_comparison: bool) -> EvidenceInputs<'_> {
            EvidenceInputs {
                config: &self.config,
                asset: &self.asset,
                plain: &self.plain,
                fgs: &self.fgs,
                plain_metrics: &self.plain_metrics,
                fgs_metrics: &self.fgs_metrics,
                comparison: with_comparison.then_some(&self.comparison),
            }
        }
    }

    fn metrics(psnr: f64, ssim: f64, vmaf: f64, vmaf_frame: u64) -> VariantMetrics {
        VariantMetrics {
            psnr: PsnrSummary {
                mean_db: psnr,
                first: PsnrFrameSample {
                    n: 1,
                    psnr_avg_db: psnr - 1.0,
                    ..PsnrFrameSample::default()
                },
            },
            ssim: SsimSummary {
                mean: ssim,
                first: SsimFrameSample {
                    n: 1,
                    ssim_all: ssim - 0.01,
                    ..SsimFrameSample::default()
                },
            },
            vmaf: VmafSummary {
                mean: vmaf,
                first: VmafFrameSample {
                    frame_num: vmaf_frame,
                    vmaf: vmaf + 1.0,
                },
            },
        }
    }

    #[test]
    fn compression_ratio_guards_zero_output() {
        assert_eq!(compression_ratio(1000, 250), 4.0);
        assert_eq!(compression_ratio(1000, 0), 1000.0);
    }

    #[test]
    fn record_required_fields() {
        let fixture = Fixture::new();
        let record = build_record(&fixture.inputs(false));
        assert_eq!(record.data_status, "measured");
        assert_eq!(record.baseline.backend, "ffmpeg+libsvtav1+libvmaf");
        assert_eq!(record.device.ram_gb, "unknown");
        assert_eq!(record.metrics.load_time_ms_p50, 4000.0);
        assert_eq!(record.metrics.load_time_ms_p95, 4000.0);
        assert_eq!(record.metrics.peak_memory_mb, 0.0);
        assert!((record.metrics.long_run_minutes - 4000.0 / 60_000.0).abs() < 1e-12);
        assert_eq!(record.metrics.crash_count, 0);
    }

    #[test]
    fn record_extras_cover_sizes_ratios_and_metrics() {
        let fixture = Fixture::new();
        let extras = build_record(&fixture.inputs(false)).metrics.extras;
        assert_eq!(extras["input_size_bytes"], 1_000_000.0);
        assert_eq!(extras["fgs_compression_ratio"], 1_000_000.0 / 3_000.0);
        assert_eq!(extras["plain_compression_ratio"], 250.0);
        assert_eq!(extras["encode_plain_s"], 1.5);
        assert_eq!(extras["encode_fgs_s"], 2.5);
        assert_eq!(extras["audit_frames_limit"], 5.0);
        assert_eq!(extras["audit_vmaf_n_subsample"], 2.0);
        assert_eq!(extras["psnr_plain_mean_db"], 31.5);
        assert_eq!(extras["ssim_fgs_mean"], 0.88);
        assert_eq!(extras["vmaf_fgs_mean"], 83.5);
        assert_eq!(extras["psnr_fgs_first_n"], 1.0);
        assert_eq!(extras["vmaf_plain_first"], 81.25);
        assert_eq!(extras["vmaf_fgs_first_frameNum"], 0.0);
    }

    #[test]
    fn extras_are_flattened_into_metrics() {
        let fixture = Fixture::new();
        let value = record_value(&build_record(&fixture.inputs(false)), None).expect("value");
        let metrics = value["metrics"].as_object().expect("metrics object");
        assert!(metrics.contains_key("crash_count"));
        assert!(metrics.contains_key("fgs_compression_ratio"));
        assert!(!metrics.contains_key("extras"));
        let back: ResultRecord = serde_json::from_value(value).expect("round trip");
        assert_eq!(back.metrics.extras.len(), 27);
    }

    #[test]
    fn deep_merge_keeps_unknown_template_keys_and_computed_wins() {
        let mut base = json!({
            "schema_version": "template",
            "owner": "lab",
            "baseline": {"name": "placeholder", "license": "CC-BY"},
            "metrics": {"throughput_tokens_per_s_p50": 0.0}
        });
        deep_merge(
            &mut base,
            json!({"schema_version": "0.1", "baseline": {"name": "real"}, "metrics": {"crash_count": 0}}),
        );
        assert_eq!(base["schema_version"], "0.1");
        assert_eq!(base["owner"], "lab");
        assert_eq!(base["baseline"]["name"], "real");
        assert_eq!(base["baseline"]["license"], "CC-BY");
        assert_eq!(base["metrics"]["crash_count"], 0);
        assert_eq!(base["metrics"]["throughput_tokens_per_s_p50"], 0.0);
    }

    #[test]
    fn deep_merge_replaces_mismatched_shapes() {
        let mut base = json!({"device": "n/a"});
        deep_merge(&mut base, json!({"device": {"os": "linux"}}));
        assert_eq!(base, json!({"device": {"os": "linux"}}));
    }

    #[test]
    fn template_must_be_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("template.json");
        std::fs::write(&path, "[1, 2]").expect("write");
        let err = load_template(&path).expect_err("array template");
        assert!(matches!(err, PackError::InvalidRequest(_)), "{err:?}");

        std::fs::write(&path, r#"{"extra": true}"#).expect("write");
        assert_eq!(load_template(&path).expect("object")["extra"], Value::Bool(true));
    }

    #[test]
    fn report_has_every_section_and_both_tables() {
        let fixture = Fixture::new();
        let report = render_report(&fixture.inputs(true));
        for heading in [
            "## Summary",
            "## Setup",
            "## Input info (ffprobe)",
            "## Size / Compression ratio",
            "## Audit metrics (mean)",
            "## Frame 0 comparison + first-sample metrics",
            "## Notes",
        ] {
            assert!(report.contains(heading), "missing {heading}");
        }
        assert!(report.contains("| plain | 4000 | 250.00x |"), "{report}");
        assert!(report.contains("| fgs | 3000 | 333.33x |"), "{report}");
        assert!(report.contains("| plain | 31.50 | 0.9100 | 80.25 |"), "{report}");
        assert!(report.contains("| fgs | 29.75 | 0.8800 | 83.50 |"), "{report}");
        assert!(report.contains("![frame0_compare_redacted](frame0_compare_redacted.png)"));
        assert!(report.contains("(frameNum=0)"));
        assert!(report.contains("- Frames limit: 5 (smoke test)"));
        assert!(report.contains("- Resolution: 64x48"));
        assert!(!report.contains("/v/in.y4m"), "input path must be withheld");
    }

    #[test]
    fn report_sections_are_ordered_and_newline_terminated() {
        let fixture = Fixture::new();
        let report = render_report(&fixture.inputs(true));
        assert!(report.starts_with("# AV1 film grain synthesis evidence (measured)\n\n## Summary\n"));
        assert!(report.ends_with("rests on the files in this directory.\n"));
        let positions: Vec<usize> = [
            "## Setup",
            "## Input info (ffprobe)",
            "```json",
            "## Size / Compression ratio",
            "## Audit metrics (mean)",
            "![frame0_compare_redacted]",
            "| output | PSNR (first n) |",
            "## Notes",
        ]
        .iter()
        .map(|needle| report.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{positions:?}");
        assert!(report.contains("|---|---:|---:|\n| plain | 4000 | 250.00x |\n| fgs | 3000 |"));
    }

    #[test]
    fn report_without_comparison_has_no_image() {
        let fixture = Fixture::new();
        let report = render_report(&fixture.inputs(false));
        assert!(!report.contains("!["));
        assert!(report.contains("| output | PSNR (first n) |"));
    }

    #[test]
    fn report_is_deterministic() {
        let fixture = Fixture::new();
        assert_eq!(
            render_report(&fixture.inputs(true)),
            render_report(&fixture.inputs(true))
        );
    }

    #[test]
    fn assemble_then_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = Fixture::new();
        let documents =
            assemble(&fixture.inputs(true), Some(json!({"custom": 1}))).expect("assemble");
        let (results_path, report_path) = write_documents(dir.path(), &documents).expect("write");
        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(results_path).expect("read")).expect("json");
        assert_eq!(value["custom"], 1);
        assert_eq!(value["data_status"], "measured");
        assert!(std::fs::read_to_string(report_path).expect("read").starts_with("# AV1"));
    }

    #[test]
    fn env_fingerprint_fields() {
        let env = build_env_fingerprint("run-1", "ffmpeg version 7.1", "ffprobe version 7.1");
        assert_eq!(env.run_id, "run-1");
        assert_eq!(env.schema_version, "0.1");
        assert!(!env.platform.os.is_empty());
        assert!(!env.platform.family.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&env.generated_at_utc).is_ok());
        assert!(!env.fgs_evidence_version.is_empty());
    }

    #[test]
    fn cpu_model_comes_from_cpuinfo_not_arch() {
        let x86 = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Core(TM) i7-1185G7 @ 3.00GHz\nprocessor\t: 1\nmodel name\t: ignored\n";
        assert_eq!(
            parse_cpu_model(x86).as_deref(),
            Some("Intel(R) Core(TM) i7-1185G7 @ 3.00GHz")
        );
        let arm = "processor\t: 0\nBogoMIPS\t: 108.00\nHardware\t: BCM2835\n";
        assert_eq!(parse_cpu_model(arm).as_deref(), Some("BCM2835"));
        assert_eq!(parse_cpu_model("model name\t:   \n"), None);
        assert_eq!(parse_cpu_model(""), None);
    }
}
