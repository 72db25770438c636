use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// External binaries the pipeline shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_owned(),
            ffprobe: "ffprobe".to_owned(),
        }
    }
}

/// Immutable configuration for one evidence run.
///
/// Built once at the entry point and passed by reference to every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub crf: u32,
    pub preset: u32,
    pub fgs_level: u32,
    pub fgs_denoise: u32,
    /// 0 = encode every frame.
    pub frames: u32,
    pub n_subsample: u32,
    pub vmaf_model: String,
    /// `None` skips the comparison image entirely.
    pub compare: Option<CompareMode>,
    pub force: bool,
    pub template: Option<PathBuf>,
    pub scratch_dir: PathBuf,
    pub tools: ToolPaths,
}

impl RunConfig {
    /// Defaults matching the CLI for a given input and output directory.
    #[must_use]
    pub fn with_defaults(input: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            out_dir: out_dir.into(),
            crf: 60,
            preset: 8,
            fgs_level: 25,
            fgs_denoise: 1,
            frames: 0,
            n_subsample: 2,
            vmaf_model: DEFAULT_VMAF_MODEL.to_owned(),
            compare: Some(CompareMode::Raw),
            force: false,
            template: None,
            scratch_dir: std::env::temp_dir().join("fgs_evidence"),
            tools: ToolPaths::default(),
        }
    }

    #[must_use]
    pub fn encode_params(&self, variant: Variant) -> EncodeParams {
        let grain = match variant {
            Variant::Plain => None,
            Variant::Fgs => Some(GrainParams {
                level: self.fgs_level,
                denoise: self.fgs_denoise,
            }),
        };
        EncodeParams {
            crf: self.crf,
            preset: self.preset,
            grain,
            frame_limit: (self.frames > 0).then_some(self.frames),
        }
    }

    #[must_use]
    pub fn encode_path(&self, variant: Variant) -> PathBuf {
        self.out_dir.join(variant.encode_file_name())
    }

    #[must_use]
    pub fn metric_log_path(&self, variant: Variant, kind: MetricKind) -> PathBuf {
        self.out_dir.join(kind.log_file_name(variant))
    }

    /// Human-readable parameter string recorded as `baseline.quant_profile`.
    #[must_use]
    pub fn quant_profile(&self) -> String {
        format!(
            "crf={}, preset={}, fgs={}, denoise={}, vmaf_model={}, n_subsample={}",
            self.crf,
            self.preset,
            self.fgs_level,
            self.fgs_denoise,
            self.vmaf_model,
            self.n_subsample
        )
    }
}

pub const DEFAULT_VMAF_MODEL: &str = "version=vmaf_v0.6.1";

// ---------------------------------------------------------------------------
// Variants and metric kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// CRF-only AV1 encode.
    Plain,
    /// AV1 with film-grain synthesis.
    Fgs,
}

impl Variant {
    pub const ALL: [Self; 2] = [Self::Plain, Self::Fgs];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Fgs => "fgs",
        }
    }

    #[must_use]
    pub fn encode_file_name(self) -> String {
        format!("base_{}.mp4", self.as_str())
    }

    #[must_use]
    pub fn timing_file_name(self) -> String {
        format!("{}.encode.json", self.as_str())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Psnr,
    Ssim,
    Vmaf,
}

impl MetricKind {
    pub const ALL: [Self; 3] = [Self::Psnr, Self::Ssim, Self::Vmaf];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Psnr => "psnr",
            Self::Ssim => "ssim",
            Self::Vmaf => "vmaf",
        }
    }

    #[must_use]
    pub fn log_file_name(self, variant: Variant) -> String {
        match self {
            Self::Psnr | Self::Ssim => format!("{}_{}.log", self.as_str(), variant.as_str()),
            Self::Vmaf => format!("vmaf_{}.json", variant.as_str()),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Center crop + pixelation, for inputs that must not be shown.
    Redacted,
    /// Plain Lanczos downscale.
    Raw,
}

impl CompareMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redacted => "redacted",
            Self::Raw => "raw",
        }
    }

    #[must_use]
    pub fn file_name(self) -> String {
        format!("frame0_compare_{}.png", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stage inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrainParams {
    pub level: u32,
    pub denoise: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeParams {
    pub crf: u32,
    pub preset: u32,
    pub grain: Option<GrainParams>,
    pub frame_limit: Option<u32>,
}

/// Source video, probed once at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_sec: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    /// Raw prober output, reproduced in the report.
    pub probe: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOutput {
    pub variant: Variant,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub encode_ms: u64,
    pub cached: bool,
}

impl EncodeOutput {
    #[must_use]
    pub fn encode_secs(&self) -> f64 {
        self.encode_ms as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricLog {
    pub variant: Variant,
    pub kind: MetricKind,
    pub path: PathBuf,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonFrame {
    pub mode: CompareMode,
    pub path: PathBuf,
    pub cached: bool,
}

impl ComparisonFrame {
    /// File name relative to the output directory, used by the report.
    #[must_use]
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub subject: Option<String>,
    pub cached: bool,
    /// `true` when the stage spawned an external tool in this run.
    pub tool_invoked: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub out_dir: PathBuf,
    pub stages: Vec<StageRecord>,
    pub results_path: PathBuf,
    pub report_path: PathBuf,
    pub manifest_path: PathBuf,
    pub comparison_path: Option<PathBuf>,
}

impl RunSummary {
    /// Number of stages that spawned an external tool.
    #[must_use]
    pub fn invoked_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|record| record.tool_invoked)
            .count()
    }

    /// Number of stages satisfied from a cached artifact.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.stages.iter().filter(|record| record.cached).count()
    }
}
