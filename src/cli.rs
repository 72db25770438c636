use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{PackError, PackResult};
use crate::model::{CompareMode, DEFAULT_VMAF_MODEL, RunConfig, ToolPaths};

pub const FFMPEG_BIN_ENV: &str = "FGS_EVIDENCE_FFMPEG_BIN";
pub const FFPROBE_BIN_ENV: &str = "FGS_EVIDENCE_FFPROBE_BIN";

#[derive(Debug, Parser)]
#[command(name = "fgs_evidence")]
#[command(version)]
#[command(about = "AV1 film grain synthesis evidence packs via ffmpeg, libsvtav1 and libvmaf")]
pub struct Cli {
    /// Debug-level logs (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encode, audit and assemble an evidence pack.
    Run(Box<RunArgs>),
    /// Re-hash the files listed in a manifest.
    Verify(VerifyArgs),
    /// Check that an artifacts directory has the required files and shapes.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Source video.
    #[arg(long)]
    pub input: PathBuf,

    /// Output artifacts directory.
    #[arg(long, default_value = "artifacts")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 60)]
    pub crf: u32,

    #[arg(long, default_value_t = 8)]
    pub preset: u32,

    /// Film grain synthesis level for the fgs variant.
    #[arg(long, default_value_t = 25)]
    pub fgs_level: u32,

    #[arg(long, default_value_t = 1)]
    pub fgs_denoise: u32,

    /// Limit encoded frames (0 = full input).
    #[arg(long, default_value_t = 0)]
    pub frames: u32,

    /// libvmaf n_subsample (1 = every frame).
    #[arg(long, default_value_t = 2)]
    pub n_subsample: u32,

    /// libvmaf model string, e.g. version=vmaf_4k_v0.6.1.
    #[arg(long, default_value = DEFAULT_VMAF_MODEL)]
    pub vmaf_model: String,

    /// Skip the frame-0 comparison image.
    #[arg(long)]
    pub no_compare: bool,

    #[arg(long, value_enum, default_value_t = CompareMode::Raw)]
    pub compare_mode: CompareMode,

    /// Regenerate encodes, logs and image even if present.
    #[arg(long)]
    pub force: bool,

    /// JSON object merged under the computed result record.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Where libvmaf logs and renders land before being copied.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    #[arg(long)]
    pub ffmpeg_bin: Option<String>,

    #[arg(long)]
    pub ffprobe_bin: Option<String>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// The only place that reads the environment.
    pub fn to_config(&self) -> PackResult<RunConfig> {
        if self.n_subsample == 0 {
            return Err(PackError::InvalidRequest(
                "--n-subsample must be at least 1".to_owned(),
            ));
        }
        if self.vmaf_model.trim().is_empty() {
            return Err(PackError::InvalidRequest(
                "--vmaf-model must not be empty".to_owned(),
            ));
        }

        let scratch_dir = match &self.scratch_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join("fgs_evidence"),
        };

        Ok(RunConfig {
            input: std::path::absolute(&self.input)?,
            out_dir: std::path::absolute(&self.out)?,
            crf: self.crf,
            preset: self.preset,
            fgs_level: self.fgs_level,
            fgs_denoise: self.fgs_denoise,
            frames: self.frames,
            n_subsample: self.n_subsample,
            vmaf_model: self.vmaf_model.clone(),
            compare: (!self.no_compare).then_some(self.compare_mode),
            force: self.force,
            template: self.template.clone(),
            scratch_dir: std::path::absolute(scratch_dir)?,
            tools: ToolPaths {
                ffmpeg: resolve_bin(self.ffmpeg_bin.as_deref(), FFMPEG_BIN_ENV, "ffmpeg"),
                ffprobe: resolve_bin(self.ffprobe_bin.as_deref(), FFPROBE_BIN_ENV, "ffprobe"),
            },
        })
    }
}

/// Flag, then environment, then the bare program name.
fn resolve_bin(flag: Option<&str>, env_key: &str, fallback: &str) -> String {
    flag.map(str::to_owned)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            std::env::var(env_key)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| fallback.to_owned())
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Path to manifest.json.
    #[arg(long)]
    pub manifest: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Artifacts directory holding env.json, results.json, report.md and manifest.json.
    #[arg(long)]
    pub artifacts: PathBuf,

    #[arg(long)]
    pub json: bool,
}
