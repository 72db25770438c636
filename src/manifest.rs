//! Content-hash manifest sealing an evidence directory.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PackResult;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_SCHEMA_VERSION: &str = "0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackManifest {
    pub schema_version: String,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// File name relative to the manifest's directory.
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

pub fn sha256_file(path: &Path) -> PackResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash every regular file directly under `dir`, sorted by name, skipping
/// the manifest itself. Subdirectories are not descended into.
pub fn build_manifest(dir: &Path) -> PackResult<PackManifest> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != MANIFEST_FILE {
            names.push(name);
        }
    }
    names.sort();

    let files = names
        .into_iter()
        .map(|name| {
            let path = dir.join(&name);
            Ok(ManifestEntry {
                size_bytes: std::fs::metadata(&path)?.len(),
                sha256: sha256_file(&path)?,
                path: name,
            })
        })
        .collect::<PackResult<Vec<_>>>()?;

    Ok(PackManifest {
        schema_version: MANIFEST_SCHEMA_VERSION.to_owned(),
        files,
    })
}

pub fn write_manifest(dir: &Path) -> PackResult<PathBuf> {
    let manifest = build_manifest(dir)?;
    let path = dir.join(MANIFEST_FILE);
    let mut encoded = serde_json::to_string_pretty(&manifest)?;
    encoded.push('\n');
    std::fs::write(&path, encoded)?;
    tracing::info!(
        stage = "seal",
        files = manifest.files.len(),
        path = %path.display(),
        "manifest written"
    );
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestProblem {
    Missing {
        path: String,
    },
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    ShaMismatch {
        path: String,
    },
}

impl fmt::Display for ManifestProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "missing: {path}"),
            Self::SizeMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "size mismatch: {path} expected={expected} actual={actual}"
            ),
            Self::ShaMismatch { path } => write!(f, "sha256 mismatch: {path}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub problems: Vec<ManifestProblem>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Re-hash every listed file relative to the manifest's directory.
/// Unreadable or malformed manifests are errors; file discrepancies are not.
pub fn verify_manifest(manifest_path: &Path) -> PackResult<VerifyReport> {
    let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let manifest: PackManifest = serde_json::from_str(&std::fs::read_to_string(manifest_path)?)?;

    let mut report = VerifyReport::default();
    for entry in &manifest.files {
        report.checked += 1;
        let path = root.join(&entry.path);
        if !path.is_file() {
            report.problems.push(ManifestProblem::Missing {
                path: entry.path.clone(),
            });
            continue;
        }
        let actual = std::fs::metadata(&path)?.len();
        if actual != entry.size_bytes {
            report.problems.push(ManifestProblem::SizeMismatch {
                path: entry.path.clone(),
                expected: entry.size_bytes,
                actual,
            });
        }
        if !sha256_file(&path)?.eq_ignore_ascii_case(&entry.sha256) {
            report.problems.push(ManifestProblem::ShaMismatch {
                path: entry.path.clone(),
            });
        }
    }
    Ok(report)
}
