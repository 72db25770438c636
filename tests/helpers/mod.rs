#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fgs_evidence::model::RunConfig;

/// Size of the synthetic source written by [`write_input`].
pub const INPUT_BYTES: usize = 10_000;
pub const PLAIN_BYTES: u64 = 4_000;
pub const FGS_BYTES: u64 = 3_000;

/// Extra shell run by the stub ffmpeg right after it logs its arguments.
/// `$*` holds the full argument list.
pub const NO_HOOK: &str = "";
pub const FAIL_FGS_ENCODE: &str = r#"if [[ "$*" == *film-grain=* ]]; then
  echo "Error setting option film-grain" >&2
  exit 1
fi"#;
pub const VMAF_WRITES_NOTHING: &str = r#"if [[ "$*" == *libvmaf=* ]]; then
  exit 0
fi"#;
pub const PSNR_WRITES_NOTHING: &str = r#"if [[ "$*" == *psnr=* ]]; then
  exit 0
fi"#;
pub const SSIM_WRITES_NOTHING: &str = r#"if [[ "$*" == *ssim=* ]]; then
  exit 0
fi"#;
pub const ENCODER_WRITES_NOTHING: &str = r#"if [[ "$*" == *libsvtav1* ]]; then
  exit 0
fi"#;
pub const RENDER_WRITES_NOTHING: &str = r#"if [[ "$*" == *-filter_complex* ]]; then
  exit 0
fi"#;

/// Temp workspace with stub binaries, an input and an output path.
pub struct Workspace {
    pub root: tempfile::TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub invocation_log: PathBuf,
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl Workspace {
    pub fn new(hook: &str) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let invocation_log = root.path().join("ffmpeg_invocations.log");
        let ffmpeg = write_stub_ffmpeg(root.path(), &invocation_log, hook);
        let ffprobe = write_stub_ffprobe(root.path());
        let input = write_input(root.path());
        let out_dir = root.path().join("artifacts");
        let scratch_dir = root.path().join("scratch");
        Self {
            root,
            ffmpeg,
            ffprobe,
            invocation_log,
            input,
            out_dir,
            scratch_dir,
        }
    }

    /// Rewrite the stub ffmpeg in place with a different hook.
    pub fn set_hook(&self, hook: &str) {
        write_stub_ffmpeg(self.root.path(), &self.invocation_log, hook);
    }

    /// Config matching the 10-frame smoke scenario: crf 60, preset 8,
    /// 5 frames, grain level 25.
    pub fn config(&self) -> RunConfig {
        let mut config = RunConfig::with_defaults(&self.input, &self.out_dir);
        config.frames = 5;
        config.scratch_dir = self.scratch_dir.clone();
        config.tools.ffmpeg = self.ffmpeg.display().to_string();
        config.tools.ffprobe = self.ffprobe.display().to_string();
        config
    }

    /// Every ffmpeg argument line logged so far (excluding `-version`).
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.invocation_log)
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn encode_invocations(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.contains("libsvtav1"))
            .count()
    }

    pub fn metric_invocations(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.contains("-lavfi"))
            .count()
    }

    pub fn render_invocations(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.contains("-filter_complex"))
            .count()
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    pub fn read_artifact(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.artifact(name)).unwrap_or_else(|e| panic!("read {name}: {e}"))
    }
}

pub fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("synthetic_10f.y4m");
    std::fs::write(&path, vec![0x42u8; INPUT_BYTES]).expect("write input");
    path
}

#[cfg(unix)]
pub fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod");
}

/// A fake ffmpeg that answers `-version`, writes fixed PSNR/SSIM/VMAF logs
/// to the path named in `-lavfi`, and otherwise creates its last argument.
pub fn write_stub_ffmpeg(dir: &Path, invocation_log: &Path, hook: &str) -> PathBuf {
    let stub_path = dir.join("ffmpeg_stub.sh");
    let script = r#"#!/usr/bin/env bash
set -euo pipefail
if [[ "${1:-}" == "-version" ]]; then
  echo "ffmpeg version 7.1-stub Copyright (c) 2000-2024"
  echo "configuration: --enable-libsvtav1 --enable-libvmaf"
  exit 0
fi
echo "$*" >> "__LOG__"
__HOOK__
lavfi=""
prev=""
last=""
for arg in "$@"; do
  if [[ "$prev" == "-lavfi" ]]; then
    lavfi="$arg"
  fi
  prev="$arg"
  last="$arg"
done
if [[ -n "$lavfi" ]]; then
  target=$(printf '%s' "$lavfi" | sed -n -e "s/.*stats_file='\([^']*\)'.*/\1/p" -e "s/.*log_path='\([^']*\)'.*/\1/p")
  case "$lavfi" in
    psnr=*)
      printf 'n:1 mse_avg:63.50 mse_y:91.13 mse_u:7.89 mse_v:5.56 psnr_avg:30.1 psnr_y:28.53 psnr_u:39.16 psnr_v:40.68\n' > "$target"
      printf 'n:2 mse_avg:37.41 mse_y:53.20 mse_u:6.14 mse_v:4.90 psnr_avg:32.4 psnr_y:30.87 psnr_u:40.25 psnr_v:41.23\n' >> "$target"
      ;;
    ssim=*)
      printf 'n:1 Y:0.902311 U:0.987710 V:0.989021 All:0.931234 (11.612341)\n' > "$target"
      printf 'n:2 Y:0.912311 U:0.988710 V:0.990021 All:0.941234 (12.289141)\n' >> "$target"
      ;;
    libvmaf=*)
      printf '{"version":"3.0.0","frames":[{"frameNum":2,"metrics":{"vmaf":90.0}},{"frameNum":0,"metrics":{"vmaf":88.5}}],"pooled_metrics":{"vmaf":{"min":80.0,"max":91.0,"mean":84.25,"harmonic_mean":84.0}}}\n' > "$target"
      ;;
  esac
  exit 0
fi
case "$last" in
  *base_plain.mp4) head -c __PLAIN__ /dev/zero > "$last" ;;
  *base_fgs.mp4) head -c __FGS__ /dev/zero > "$last" ;;
  *) printf '\x89PNG\r\n' > "$last" ;;
esac
"#
    .replace("__LOG__", &invocation_log.display().to_string())
    .replace("__HOOK__", hook)
    .replace("__PLAIN__", &PLAIN_BYTES.to_string())
    .replace("__FGS__", &FGS_BYTES.to_string());
    std::fs::write(&stub_path, script).expect("write stub");
    make_executable(&stub_path);
    stub_path
}

/// A fake ffprobe printing a fixed single-stream probe result.
pub fn write_stub_ffprobe(dir: &Path) -> PathBuf {
    let stub_path = dir.join("ffprobe_stub.sh");
    let script = r#"#!/usr/bin/env bash
set -euo pipefail
if [[ "${1:-}" == "-version" ]]; then
  echo "ffprobe version 7.1-stub Copyright (c) 2007-2024"
  exit 0
fi
cat <<'JSON'
{
  "programs": [],
  "streams": [
    {"width": 64, "height": 48, "avg_frame_rate": "25/1", "r_frame_rate": "25/1", "nb_frames": "10", "duration": "0.400000"}
  ],
  "format": {"size": "10000", "duration": "0.400000"}
}
JSON
"#;
    std::fs::write(&stub_path, script).expect("write stub");
    make_executable(&stub_path);
    stub_path
}
