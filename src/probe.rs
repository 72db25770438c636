//! `ffprobe` wrapper producing the immutable [`Asset`] reference.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{PackError, PackResult};
use crate::model::Asset;
use crate::process::run_command;

/// Subset of `ffprobe -of json` output requested by [`probe_args`].
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: Option<FfprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FfprobeStream {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
    pub nb_frames: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub size: Option<String>,
    pub duration: Option<String>,
}

#[must_use]
pub fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_owned(),
        "error".to_owned(),
        "-select_streams".to_owned(),
        "v:0".to_owned(),
        "-show_entries".to_owned(),
        "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration".to_owned(),
        "-show_entries".to_owned(),
        "format=size,duration".to_owned(),
        "-of".to_owned(),
        "json".to_owned(),
        input.display().to_string(),
    ]
}

/// Probe `input` and build the [`Asset`]. Unparsable prober output is fatal.
pub fn probe_asset(ffprobe: &str, input: &Path) -> PackResult<Asset> {
    if !input.is_file() {
        return Err(PackError::InputMissing(input.to_path_buf()));
    }
    let run = run_command(ffprobe, &probe_args(input), None)?;
    let raw: Value = serde_json::from_slice(&run.output.stdout)?;
    let size_bytes = std::fs::metadata(input)?.len();
    asset_from_probe(input, size_bytes, raw)
}

/// Pure half of [`probe_asset`].
pub fn asset_from_probe(input: &Path, size_bytes: u64, raw: Value) -> PackResult<Asset> {
    let parsed: FfprobeOutput = serde_json::from_value(raw.clone())?;
    let stream = parsed.streams.first();
    let format = parsed.format.as_ref();

    let duration_sec = stream
        .and_then(|s| s.duration.as_deref())
        .or_else(|| format.and_then(|f| f.duration.as_deref()))
        .and_then(parse_positive_f64);

    let frame_rate = stream.and_then(|s| {
        s.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
    });

    Ok(Asset {
        path: input.to_path_buf(),
        size_bytes,
        duration_sec,
        width: stream.and_then(|s| s.width),
        height: stream.and_then(|s| s.height),
        frame_rate,
        probe: raw,
    })
}

/// Parse an ffprobe rational such as `24000/1001`. `0/0` yields `None`.
#[must_use]
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = match raw.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (raw.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_positive_f64(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
