//! Side-by-side frame-0 comparison image: `[source | plain | fgs]`.

use std::path::Path;

use crate::cache::{ArtifactProbe, StageCache, remove_stale};
use crate::error::{PackError, PackResult};
use crate::model::{CompareMode, ComparisonFrame, RunConfig};
use crate::process::run_command;

const FIRST_FRAME: &str = r"select=eq(n\,0),setpts=N/FRAME_RATE/TB";
const STREAM_LABELS: [&str; 3] = ["a", "b", "c"];

/// Per-stream transform applied after frame selection.
#[must_use]
pub const fn stream_transform(mode: CompareMode) -> &'static str {
    match mode {
        CompareMode::Redacted => concat!(
            "crop=iw/2:ih/2:iw/4:ih/4,",
            "scale=iw/24:ih/24:flags=neighbor,",
            "scale=iw*24:ih*24:flags=neighbor,",
            "scale=640:-2:flags=neighbor"
        ),
        CompareMode::Raw => "scale=640:-2:flags=lanczos",
    }
}

/// Full `-filter_complex` graph over inputs 0..3, output label `[out]`.
#[must_use]
pub fn comparison_filter_graph(mode: CompareMode) -> String {
    let transform = stream_transform(mode);
    let chains: String = STREAM_LABELS
        .iter()
        .enumerate()
        .map(|(index, label)| format!("[{index}:v]{FIRST_FRAME},{transform}[{label}];"))
        .collect();
    chains + "[a][b][c]hstack=inputs=3[out]"
}

#[must_use]
pub fn comparison_args(
    source: &Path,
    plain: &Path,
    fgs: &Path,
    mode: CompareMode,
    render: &Path,
) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        source.display().to_string(),
        "-i".to_owned(),
        plain.display().to_string(),
        "-i".to_owned(),
        fgs.display().to_string(),
        "-filter_complex".to_owned(),
        comparison_filter_graph(mode),
        "-map".to_owned(),
        "[out]".to_owned(),
        "-frames:v".to_owned(),
        "1".to_owned(),
        render.display().to_string(),
    ]
}

/// Render (or reuse) the comparison image for `mode`.
pub fn ensure_comparison<P: ArtifactProbe>(
    config: &RunConfig,
    cache: &StageCache<P>,
    plain: &Path,
    fgs: &Path,
    mode: CompareMode,
) -> PackResult<ComparisonFrame> {
    let target = config.out_dir.join(mode.file_name());
    let decision = cache.decide(&target);

    if decision.should_run() {
        std::fs::create_dir_all(&config.scratch_dir)?;
        let render = config.scratch_dir.join(mode.file_name());
        remove_stale(&render)?;
        remove_stale(&target)?;

        let args = comparison_args(&config.input, plain, fgs, mode, &render);
        run_command(&config.tools.ffmpeg, &args, None)?;
        if !render.is_file() {
            return Err(PackError::MissingArtifact(render));
        }
        std::fs::copy(&render, &target)?;
    }

    tracing::info!(
        stage = "compare",
        mode = mode.as_str(),
        cached = decision.is_cached(),
        "comparison frame ready"
    );

    Ok(ComparisonFrame {
        mode,
        path: target,
        cached: decision.is_cached(),
    })
}
