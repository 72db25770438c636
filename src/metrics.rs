//! Parsers for the three metric artifacts written by ffmpeg's `psnr`, `ssim`
//! and `libvmaf` filters.
//!
//! Each log yields an aggregate mean and a first-sample record. Log formats
//! drift across ffmpeg/libvmaf builds, so every recognized shape is listed
//! explicitly and tried in a fixed order; extraction itself never fails and
//! degrades to zero. Only reading the file (and decoding VMAF JSON) can fail.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PackResult;

static FRAME_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bn:([0-9]+)\b").expect("valid regex"));
static PSNR_AVERAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\baverage:([0-9.]+)").expect("valid regex"));
static PSNR_AVG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpsnr_avg:([0-9.]+)").expect("valid regex"));
static PSNR_Y_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpsnr_y:([0-9.]+)").expect("valid regex"));
static PSNR_U_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpsnr_u:([0-9.]+)").expect("valid regex"));
static PSNR_V_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpsnr_v:([0-9.]+)").expect("valid regex"));
static SSIM_ALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAll:([0-9.]+)").expect("valid regex"));
static SSIM_Y_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bY:([0-9.]+)").expect("valid regex"));
static SSIM_U_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bU:([0-9.]+)").expect("valid regex"));
static SSIM_V_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bV:([0-9.]+)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Recognized shapes
// ---------------------------------------------------------------------------

/// Where a text-log aggregate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextShape {
    /// A trailing summary line (`average:` for PSNR, a frame-less `All:` line for SSIM).
    Summary,
    /// The last per-frame value in the log.
    LastFrame,
}

impl TextShape {
    pub const FALLBACK_ORDER: [Self; 2] = [Self::Summary, Self::LastFrame];
}

/// Recognized libvmaf JSON layouts for the pooled score, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmafShape {
    /// `pooled_metrics.vmaf.mean`
    PooledMean,
    /// `pooled_metrics.vmaf.harmonic_mean`
    PooledHarmonicMean,
    /// `aggregate.VMAF_score` (libvmaf 1.x)
    AggregateScore,
}

impl VmafShape {
    pub const FALLBACK_ORDER: [Self; 3] = [
        Self::PooledMean,
        Self::PooledHarmonicMean,
        Self::AggregateScore,
    ];

    /// `Some` when the shape's key is present. A present but non-numeric
    /// value coerces to zero rather than falling through.
    #[must_use]
    pub fn extract(self, root: &Value) -> Option<f64> {
        match self {
            Self::PooledMean => pooled_vmaf(root)?.get("mean").map(coerce_f64),
            Self::PooledHarmonicMean => pooled_vmaf(root)?.get("harmonic_mean").map(coerce_f64),
            Self::AggregateScore => root.get("aggregate")?.get("VMAF_score").map(coerce_f64),
        }
    }
}

/// `vmaf` wins only when it holds a non-empty object; otherwise `VMAF`.
fn pooled_vmaf(root: &Value) -> Option<&serde_json::Map<String, Value>> {
    let pooled = root.get("pooled_metrics")?;
    ["vmaf", "VMAF"]
        .into_iter()
        .filter_map(|key| pooled.get(key).and_then(Value::as_object))
        .find(|metrics| !metrics.is_empty())
}

/// Aggregate value plus the shape that produced it (`None` = defaulted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate<S> {
    pub value: f64,
    pub shape: Option<S>,
}

impl<S> Aggregate<S> {
    const fn missing() -> Self {
        Self {
            value: 0.0,
            shape: None,
        }
    }
}

// ---------------------------------------------------------------------------
// First-sample records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PsnrFrameSample {
    pub n: u64,
    pub psnr_avg_db: f64,
    pub psnr_y_db: f64,
    pub psnr_u_db: f64,
    pub psnr_v_db: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SsimFrameSample {
    pub n: u64,
    pub ssim_all: f64,
    pub ssim_y: f64,
    pub ssim_u: f64,
    pub ssim_v: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VmafFrameSample {
    pub frame_num: u64,
    pub vmaf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PsnrSummary {
    pub mean_db: f64,
    pub first: PsnrFrameSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SsimSummary {
    pub mean: f64,
    pub first: SsimFrameSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VmafSummary {
    pub mean: f64,
    pub first: VmafFrameSample,
}

/// All six parsed values for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub psnr: PsnrSummary,
    pub ssim: SsimSummary,
    pub vmaf: VmafSummary,
}

// ---------------------------------------------------------------------------
// PSNR
// ---------------------------------------------------------------------------

#[must_use]
pub fn psnr_aggregate(text: &str) -> Aggregate<TextShape> {
    TextShape::FALLBACK_ORDER
        .iter()
        .find_map(|&shape| {
            let value = match shape {
                TextShape::Summary => text
                    .lines()
                    .rev()
                    .find_map(|line| capture_f64(&PSNR_AVERAGE_RE, line)),
                TextShape::LastFrame => last_capture_f64(&PSNR_AVG_RE, text),
            }?;
            Some(Aggregate {
                value,
                shape: Some(shape),
            })
        })
        .unwrap_or_else(Aggregate::missing)
}

#[must_use]
pub fn psnr_mean(text: &str) -> f64 {
    psnr_aggregate(text).value
}

#[must_use]
pub fn psnr_first_sample(text: &str) -> PsnrFrameSample {
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (Some(n), Some(avg)) = (frame_index(line), capture_f64(&PSNR_AVG_RE, line)) else {
            continue;
        };
        return PsnrFrameSample {
            n,
            psnr_avg_db: avg,
            psnr_y_db: capture_f64(&PSNR_Y_RE, line).unwrap_or(0.0),
            psnr_u_db: capture_f64(&PSNR_U_RE, line).unwrap_or(0.0),
            psnr_v_db: capture_f64(&PSNR_V_RE, line).unwrap_or(0.0),
        };
    }
    PsnrFrameSample::default()
}

#[must_use]
pub fn summarize_psnr(text: &str) -> PsnrSummary {
    let aggregate = psnr_aggregate(text);
    if aggregate.shape.is_none() {
        tracing::debug!(metric = "psnr", "no recognized PSNR aggregate; defaulting to 0");
    }
    PsnrSummary {
        mean_db: aggregate.value,
        first: psnr_first_sample(text),
    }
}

// ---------------------------------------------------------------------------
// SSIM
// ---------------------------------------------------------------------------

#[must_use]
pub fn ssim_aggregate(text: &str) -> Aggregate<TextShape> {
    TextShape::FALLBACK_ORDER
        .iter()
        .find_map(|&shape| {
            let value = match shape {
                TextShape::Summary => text
                    .lines()
                    .rev()
                    .filter(|line| frame_index(line).is_none())
                    .find_map(|line| capture_f64(&SSIM_ALL_RE, line)),
                TextShape::LastFrame => text
                    .lines()
                    .rev()
                    .filter(|line| frame_index(line).is_some())
                    .find_map(|line| capture_f64(&SSIM_ALL_RE, line)),
            }?;
            Some(Aggregate {
                value,
                shape: Some(shape),
            })
        })
        .unwrap_or_else(Aggregate::missing)
}

#[must_use]
pub fn ssim_mean(text: &str) -> f64 {
    ssim_aggregate(text).value
}

#[must_use]
pub fn ssim_first_sample(text: &str) -> SsimFrameSample {
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (Some(n), Some(all)) = (frame_index(line), capture_f64(&SSIM_ALL_RE, line)) else {
            continue;
        };
        return SsimFrameSample {
            n,
            ssim_all: all,
            ssim_y: capture_f64(&SSIM_Y_RE, line).unwrap_or(0.0),
            ssim_u: capture_f64(&SSIM_U_RE, line).unwrap_or(0.0),
            ssim_v: capture_f64(&SSIM_V_RE, line).unwrap_or(0.0),
        };
    }
    SsimFrameSample::default()
}

#[must_use]
pub fn summarize_ssim(text: &str) -> SsimSummary {
    let aggregate = ssim_aggregate(text);
    if aggregate.shape.is_none() {
        tracing::debug!(metric = "ssim", "no recognized SSIM aggregate; defaulting to 0");
    }
    SsimSummary {
        mean: aggregate.value,
        first: ssim_first_sample(text),
    }
}

// ---------------------------------------------------------------------------
// VMAF
// ---------------------------------------------------------------------------

#[must_use]
pub fn vmaf_aggregate(root: &Value) -> Aggregate<VmafShape> {
    VmafShape::FALLBACK_ORDER
        .iter()
        .find_map(|&shape| {
            shape.extract(root).map(|value| Aggregate {
                value,
                shape: Some(shape),
            })
        })
        .unwrap_or_else(Aggregate::missing)
}

#[must_use]
pub fn vmaf_mean(root: &Value) -> f64 {
    vmaf_aggregate(root).value
}

/// Prefer the frame with `frameNum == 0`, else the first array element.
#[must_use]
pub fn vmaf_first_sample(root: &Value) -> VmafFrameSample {
    let Some(frames) = root.get("frames").and_then(Value::as_array) else {
        return VmafFrameSample::default();
    };
    let picked = frames
        .iter()
        .find(|frame| frame.get("frameNum").and_then(Value::as_f64) == Some(0.0))
        .or_else(|| frames.first());
    let Some(frame) = picked.filter(|frame| frame.is_object()) else {
        return VmafFrameSample::default();
    };

    VmafFrameSample {
        frame_num: frame.get("frameNum").map_or(0, |v| coerce_f64(v) as u64),
        vmaf: frame
            .get("metrics")
            .and_then(Value::as_object)
            .and_then(|metrics| metrics.get("vmaf"))
            .map_or(0.0, coerce_f64),
    }
}

#[must_use]
pub fn summarize_vmaf(root: &Value) -> VmafSummary {
    let aggregate = vmaf_aggregate(root);
    if aggregate.shape.is_none() {
        tracing::debug!(metric = "vmaf", "no recognized VMAF pooled shape; defaulting to 0");
    }
    VmafSummary {
        mean: aggregate.value,
        first: vmaf_first_sample(root),
    }
}

// ---------------------------------------------------------------------------
// File loading (the only fallible part)
// ---------------------------------------------------------------------------

pub fn load_psnr_log(path: &Path) -> PackResult<PsnrSummary> {
    Ok(summarize_psnr(&read_lossy(path)?))
}

pub fn load_ssim_log(path: &Path) -> PackResult<SsimSummary> {
    Ok(summarize_ssim(&read_lossy(path)?))
}

/// Malformed JSON is fatal here; an unrecognized but valid shape is not.
pub fn load_vmaf_log(path: &Path) -> PackResult<VmafSummary> {
    let root: Value = serde_json::from_str(&read_lossy(path)?)?;
    Ok(summarize_vmaf(&root))
}

fn read_lossy(path: &Path) -> PackResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

fn frame_index(line: &str) -> Option<u64> {
    let raw = FRAME_INDEX_RE.captures(line)?.get(1)?.as_str();
    Some(raw.parse::<u64>().unwrap_or(0))
}

fn capture_f64(re: &Regex, line: &str) -> Option<f64> {
    let raw = re.captures(line)?.get(1)?.as_str();
    Some(parse_f64_or_zero(raw))
}

fn last_capture_f64(re: &Regex, text: &str) -> Option<f64> {
    let raw = re.captures_iter(text).last()?.get(1)?.as_str();
    Some(parse_f64_or_zero(raw))
}

fn parse_f64_or_zero(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Numbers pass through, numeric strings are parsed, anything else is zero.
#[must_use]
pub fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => parse_f64_or_zero(text),
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => 0.0,
    }
}
