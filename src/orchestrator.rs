//! Sequences the evidence run: preflight, probe, two encodes, six metric
//! logs, parsing, optional comparison image, assembly and sealing.
//!
//! Single-threaded and strictly sequential. Each stage blocks on its child
//! process; the first error aborts the run and leaves whatever was already
//! on disk in place.

use std::fmt;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::audit::ensure_metric_log;
use crate::cache::{ArtifactProbe, FsProbe, StageCache};
use crate::compare::ensure_comparison;
use crate::encode::ensure_encode;
use crate::error::{PackError, PackResult};
use crate::evidence::{
    EvidenceInputs, assemble, build_env_fingerprint, load_template, write_documents, write_env,
};
use crate::manifest::write_manifest;
use crate::metrics::{VariantMetrics, load_psnr_log, load_ssim_log, load_vmaf_log};
use crate::model::{
    Asset, ComparisonFrame, EncodeOutput, MetricKind, MetricLog, RunConfig, RunSummary,
    StageRecord, Variant,
};
use crate::probe::probe_asset;
use crate::process::{command_exists, saturating_duration_ms, tool_version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Tool lookup, input check and template load. Nothing is written.
    Preflight,
    /// ffprobe the source asset.
    Probe,
    /// One AV1 encode per variant.
    Encode,
    /// PSNR / SSIM / VMAF logs per variant.
    Audit,
    /// Re-parse all six logs.
    Parse,
    /// Frame-0 comparison image.
    Compare,
    /// Result record, report and environment fingerprint.
    Assemble,
    /// Content-hash manifest.
    Seal,
}

impl PipelineStage {
    pub const ALL: [Self; 8] = [
        Self::Preflight,
        Self::Probe,
        Self::Encode,
        Self::Audit,
        Self::Parse,
        Self::Compare,
        Self::Assemble,
        Self::Seal,
    ];

    /// The stage label used in logs and the run summary.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Probe => "probe",
            Self::Encode => "encode",
            Self::Audit => "audit",
            Self::Parse => "parse",
            Self::Compare => "compare",
            Self::Assemble => "assemble",
            Self::Seal => "seal",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of [`preflight`].
#[derive(Debug, Clone)]
pub struct Preflight {
    pub ffmpeg_version: String,
    pub ffprobe_version: String,
    pub template: Option<Value>,
}

/// Precondition checks. Runs before the output directory is created.
pub fn preflight(config: &RunConfig) -> PackResult<Preflight> {
    if config.n_subsample == 0 {
        return Err(PackError::InvalidRequest(
            "n_subsample must be at least 1".to_owned(),
        ));
    }
    for tool in [&config.tools.ffmpeg, &config.tools.ffprobe] {
        if !command_exists(tool) {
            return Err(PackError::CommandMissing {
                command: tool.clone(),
            });
        }
    }
    if !config.input.is_file() {
        return Err(PackError::InputMissing(config.input.clone()));
    }

    let template = config.template.as_deref().map(load_template).transpose()?;
    Ok(Preflight {
        ffmpeg_version: tool_version(&config.tools.ffmpeg)?,
        ffprobe_version: tool_version(&config.tools.ffprobe)?,
        template,
    })
}

/// Stage bookkeeping for the run summary.
struct StageLog {
    records: Vec<StageRecord>,
}

impl StageLog {
    fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    fn push(
        &mut self,
        stage: PipelineStage,
        subject: Option<String>,
        cached: bool,
        tool_invoked: bool,
        started: Instant,
    ) {
        self.records.push(StageRecord {
            stage: stage.label().to_owned(),
            subject,
            cached,
            tool_invoked,
            elapsed_ms: saturating_duration_ms(started.elapsed()),
        });
    }
}

fn stage_failed(stage: PipelineStage) -> impl Fn(&PackError) {
    move |error| {
        tracing::error!(
            stage = stage.label(),
            error_code = error.error_code(),
            error = %error,
            "stage failed"
        );
    }
}

/// Everything produced before assembly, kept for the evidence inputs.
struct PipelineIntermediate {
    asset: Asset,
    encodes: Vec<EncodeOutput>,
    logs: Vec<MetricLog>,
    metrics: Vec<(Variant, VariantMetrics)>,
    comparison: Option<ComparisonFrame>,
}

impl PipelineIntermediate {
    fn encode(&self, variant: Variant) -> PackResult<&EncodeOutput> {
        self.encodes
            .iter()
            .find(|encode| encode.variant == variant)
            .ok_or_else(|| PackError::MissingArtifact(variant.encode_file_name().into()))
    }

    fn metrics(&self, variant: Variant) -> VariantMetrics {
        self.metrics
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, metrics)| *metrics)
            .unwrap_or_default()
    }
}

pub struct EvidencePipeline<P = FsProbe> {
    config: RunConfig,
    cache: StageCache<P>,
}

impl EvidencePipeline<FsProbe> {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let cache = StageCache::new(config.force);
        Self { config, cache }
    }
}

impl<P: ArtifactProbe> EvidencePipeline<P> {
    pub fn with_cache(config: RunConfig, cache: StageCache<P>) -> Self {
        Self { config, cache }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self) -> PackResult<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let config = &self.config;
        tracing::info!(
            run_id = %run_id,
            input = %config.input.display(),
            out_dir = %config.out_dir.display(),
            force = config.force,
            "starting evidence run"
        );
        let mut log = StageLog::new();

        let started = Instant::now();
        let checked = preflight(config).inspect_err(stage_failed(PipelineStage::Preflight))?;
        log.push(PipelineStage::Preflight, None, false, true, started);
        std::fs::create_dir_all(&config.out_dir)?;

        let started = Instant::now();
        let asset = probe_asset(&config.tools.ffprobe, &config.input)
            .inspect_err(stage_failed(PipelineStage::Probe))?;
        log.push(PipelineStage::Probe, None, false, true, started);
        tracing::info!(
            stage = "probe",
            size_bytes = asset.size_bytes,
            width = asset.width,
            height = asset.height,
            "input probed"
        );

        let mut state = PipelineIntermediate {
            asset,
            encodes: Vec::with_capacity(Variant::ALL.len()),
            logs: Vec::with_capacity(Variant::ALL.len() * MetricKind::ALL.len()),
            metrics: Vec::with_capacity(Variant::ALL.len()),
            comparison: None,
        };

        self.encode_stage(&mut state, &mut log)?;
        self.audit_stage(&mut state, &mut log)?;
        parse_stage(&mut state, &mut log)?;
        self.compare_stage(&mut state, &mut log)?;

        let started = Instant::now();
        let plain = state.encode(Variant::Plain)?;
        let fgs = state.encode(Variant::Fgs)?;
        let plain_metrics = state.metrics(Variant::Plain);
        let fgs_metrics = state.metrics(Variant::Fgs);
        let inputs = EvidenceInputs {
            config,
            asset: &state.asset,
            plain,
            fgs,
            plain_metrics: &plain_metrics,
            fgs_metrics: &fgs_metrics,
            comparison: state.comparison.as_ref(),
        };
        let documents =
            assemble(&inputs, checked.template).inspect_err(stage_failed(PipelineStage::Assemble))?;
        let env = build_env_fingerprint(&run_id, &checked.ffmpeg_version, &checked.ffprobe_version);
        let (results_path, report_path) = write_documents(&config.out_dir, &documents)
            .inspect_err(stage_failed(PipelineStage::Assemble))?;
        write_env(&config.out_dir, &env).inspect_err(stage_failed(PipelineStage::Assemble))?;
        log.push(PipelineStage::Assemble, None, false, false, started);

        let started = Instant::now();
        let manifest_path =
            write_manifest(&config.out_dir).inspect_err(stage_failed(PipelineStage::Seal))?;
        log.push(PipelineStage::Seal, None, false, false, started);

        let summary = RunSummary {
            run_id,
            out_dir: config.out_dir.clone(),
            stages: log.records,
            results_path,
            report_path,
            manifest_path,
            comparison_path: state.comparison.map(|frame| frame.path),
        };
        tracing::info!(
            run_id = %summary.run_id,
            invoked = summary.invoked_count(),
            cached = summary.cached_count(),
            "evidence run complete"
        );
        Ok(summary)
    }

    fn encode_stage(&self, state: &mut PipelineIntermediate, log: &mut StageLog) -> PackResult<()> {
        for variant in Variant::ALL {
            let started = Instant::now();
            let encode = ensure_encode(&self.config, &self.cache, variant)
                .inspect_err(stage_failed(PipelineStage::Encode))?;
            log.push(
                PipelineStage::Encode,
                Some(variant.to_string()),
                encode.cached,
                !encode.cached,
                started,
            );
            state.encodes.push(encode);
        }
        Ok(())
    }

    fn audit_stage(&self, state: &mut PipelineIntermediate, log: &mut StageLog) -> PackResult<()> {
        for encode in &state.encodes {
            for kind in MetricKind::ALL {
                let started = Instant::now();
                let metric_log = ensure_metric_log(&self.config, &self.cache, encode, kind)
                    .inspect_err(stage_failed(PipelineStage::Audit))?;
                log.push(
                    PipelineStage::Audit,
                    Some(format!("{kind}_{}", encode.variant)),
                    metric_log.cached,
                    !metric_log.cached,
                    started,
                );
                state.logs.push(metric_log);
            }
        }
        Ok(())
    }

    fn compare_stage(&self, state: &mut PipelineIntermediate, log: &mut StageLog) -> PackResult<()> {
        let Some(mode) = self.config.compare else {
            tracing::info!(stage = "compare", "comparison image disabled");
            return Ok(());
        };
        let started = Instant::now();
        let frame = ensure_comparison(
            &self.config,
            &self.cache,
            &state.encode(Variant::Plain)?.path,
            &state.encode(Variant::Fgs)?.path,
            mode,
        )
        .inspect_err(stage_failed(PipelineStage::Compare))?;
        log.push(
            PipelineStage::Compare,
            Some(mode.as_str().to_owned()),
            frame.cached,
            !frame.cached,
            started,
        );
        state.comparison = Some(frame);
        Ok(())
    }
}

/// Parsed values are never cached, even when the logs were.
fn parse_stage(state: &mut PipelineIntermediate, log: &mut StageLog) -> PackResult<()> {
    for variant in Variant::ALL {
        let started = Instant::now();
        let mut metrics = VariantMetrics::default();
        for metric_log in state.logs.iter().filter(|l| l.variant == variant) {
            let parsed = match metric_log.kind {
                MetricKind::Psnr => load_psnr_log(&metric_log.path).map(|s| metrics.psnr = s),
                MetricKind::Ssim => load_ssim_log(&metric_log.path).map(|s| metrics.ssim = s),
                MetricKind::Vmaf => load_vmaf_log(&metric_log.path).map(|s| metrics.vmaf = s),
            };
            parsed.inspect_err(stage_failed(PipelineStage::Parse))?;
        }
        tracing::info!(
            stage = "parse",
            variant = %variant,
            psnr_mean_db = metrics.psnr.mean_db,
            ssim_mean = metrics.ssim.mean,
            vmaf_mean = metrics.vmaf.mean,
            "metrics parsed"
        );
        log.push(
            PipelineStage::Parse,
            Some(variant.to_string()),
            false,
            false,
            started,
        );
        state.metrics.push((variant, metrics));
    }
    Ok(())
}

/// Build and run the default pipeline for `config`.
pub fn run_pipeline(config: RunConfig) -> PackResult<RunSummary> {
    EvidencePipeline::new(config).run()
}
