//! AV1 encode stage: one `libsvtav1` encode per [`Variant`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{ArtifactProbe, StageCache, remove_stale};
use crate::error::{PackError, PackResult};
use crate::model::{EncodeOutput, EncodeParams, RunConfig, Variant};
use crate::process::run_command;

/// Sidecar persisted next to each encode so cache hits report the original
/// wall-clock duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTiming {
    pub elapsed_ms: u64,
}

#[must_use]
pub fn encode_args(input: &Path, output: &Path, params: &EncodeParams) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-c:v".to_owned(),
        "libsvtav1".to_owned(),
        "-preset".to_owned(),
        params.preset.to_string(),
        "-crf".to_owned(),
        params.crf.to_string(),
    ];
    if let Some(grain) = params.grain {
        args.push("-svtav1-params".to_owned());
        args.push(format!(
            "film-grain={}:film-grain-denoise={}",
            grain.level, grain.denoise
        ));
    }
    args.extend([
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-an".to_owned(),
    ]);
    if let Some(limit) = params.frame_limit {
        args.push("-frames:v".to_owned());
        args.push(limit.to_string());
    }
    args.push(output.display().to_string());
    args
}

/// Produce (or reuse) the encode for `variant`.
pub fn ensure_encode<P: ArtifactProbe>(
    config: &RunConfig,
    cache: &StageCache<P>,
    variant: Variant,
) -> PackResult<EncodeOutput> {
    let output = config.encode_path(variant);
    let timing_path = config.out_dir.join(variant.timing_file_name());
    let decision = cache.decide(&output);

    let encode_ms = if decision.should_run() {
        remove_stale(&output)?;
        remove_stale(&timing_path)?;
        let args = encode_args(&config.input, &output, &config.encode_params(variant));
        let run = run_command(&config.tools.ffmpeg, &args, None)?;
        if !output.is_file() {
            return Err(PackError::MissingArtifact(output));
        }
        let timing = EncodeTiming {
            elapsed_ms: run.elapsed_ms(),
        };
        write_timing(&timing_path, timing)?;
        timing.elapsed_ms
    } else {
        read_timing(&timing_path)
    };

    let size_bytes = std::fs::metadata(&output)?.len();
    tracing::info!(
        stage = "encode",
        variant = %variant,
        cached = decision.is_cached(),
        size_bytes,
        encode_ms,
        "encode ready"
    );

    Ok(EncodeOutput {
        variant,
        path: output,
        size_bytes,
        encode_ms,
        cached: decision.is_cached(),
    })
}

fn write_timing(path: &Path, timing: EncodeTiming) -> PackResult<()> {
    std::fs::write(path, serde_json::to_string_pretty(&timing)?)?;
    Ok(())
}

/// Missing or unreadable sidecar degrades to zero.
#[must_use]
pub fn read_timing(path: &Path) -> u64 {
    let parsed = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<EncodeTiming>(&raw).ok());
    match parsed {
        Some(timing) => timing.elapsed_ms,
        None => {
            tracing::debug!(path = %path.display(), "no usable encode timing sidecar");
            0
        }
    }
}
