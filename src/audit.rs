//! Quality-metric stage: PSNR, SSIM and VMAF logs for one encode against the
//! source asset.
//!
//! PSNR and SSIM write their stats file straight into the output directory.
//! libvmaf writes into the scratch directory first (it cannot always open
//! non-ASCII paths) and the log is copied over only once it exists.

use std::path::{Path, PathBuf};

use crate::cache::{ArtifactProbe, StageCache, remove_stale};
use crate::error::{PackError, PackResult};
use crate::escape::escape_filter_path;
use crate::model::{EncodeOutput, MetricKind, MetricLog, RunConfig};
use crate::process::run_command;

/// The `-lavfi` value for `kind` writing its log to `log_path`.
#[must_use]
pub fn metric_filter(kind: MetricKind, log_path: &Path, config: &RunConfig) -> String {
    let escaped = escape_filter_path(log_path);
    match kind {
        MetricKind::Psnr => format!("psnr=stats_file={escaped}:shortest=1"),
        MetricKind::Ssim => format!("ssim=stats_file={escaped}:shortest=1"),
        MetricKind::Vmaf => format!(
            "libvmaf=log_path={escaped}:log_fmt=json:model={}:n_subsample={}:shortest=1",
            config.vmaf_model, config.n_subsample
        ),
    }
}

/// Distorted input first, reference second.
#[must_use]
pub fn metric_args(distorted: &Path, reference: &Path, filter: String) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        distorted.display().to_string(),
        "-i".to_owned(),
        reference.display().to_string(),
        "-lavfi".to_owned(),
        filter,
        "-f".to_owned(),
        "null".to_owned(),
        "-".to_owned(),
    ]
}

/// Where the tool itself is told to write. Differs from the final path only
/// for VMAF.
#[must_use]
pub fn tool_log_path(config: &RunConfig, encode: &EncodeOutput, kind: MetricKind) -> PathBuf {
    match kind {
        MetricKind::Vmaf => config.scratch_dir.join(kind.log_file_name(encode.variant)),
        MetricKind::Psnr | MetricKind::Ssim => config.metric_log_path(encode.variant, kind),
    }
}

/// Produce (or reuse) the `kind` log for `encode`.
pub fn ensure_metric_log<P: ArtifactProbe>(
    config: &RunConfig,
    cache: &StageCache<P>,
    encode: &EncodeOutput,
    kind: MetricKind,
) -> PackResult<MetricLog> {
    let target = config.metric_log_path(encode.variant, kind);
    let decision = cache.decide(&target);

    if decision.should_run() {
        let written = tool_log_path(config, encode, kind);
        if written != target {
            std::fs::create_dir_all(&config.scratch_dir)?;
            remove_stale(&written)?;
        }
        remove_stale(&target)?;

        let args = metric_args(
            &encode.path,
            &config.input,
            metric_filter(kind, &written, config),
        );
        run_command(&config.tools.ffmpeg, &args, Some(&config.out_dir))?;

        if !written.is_file() {
            return Err(PackError::MissingArtifact(written));
        }
        if written != target {
            std::fs::copy(&written, &target)?;
        }
    }

    tracing::info!(
        stage = "audit",
        variant = %encode.variant,
        metric = %kind,
        cached = decision.is_cached(),
        path = %target.display(),
        "metric log ready"
    );

    Ok(MetricLog {
        variant: encode.variant,
        kind,
        path: target,
        cached: decision.is_cached(),
    })
}
