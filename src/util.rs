#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use glob::glob;
use which::which;

/// Returns true when `program` resolves on `PATH`.
pub fn on_path(program: &str) -> bool {
    which(program).is_ok()
}

/// Expands a glob pattern into a sorted list of existing paths.
pub fn glob_sorted(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern
        .to_str()
        .context("Could not convert glob pattern to string")?
        .to_string();

    let mut paths: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    Ok(paths)
}

/// File names (not paths) of the entries of `dir` that match `pattern`,
/// sorted.
pub fn file_names_matching(dir: &Path, pattern: &str) -> Result<Vec<String>> {
    Ok(glob_sorted(&dir.join(pattern))?
        .into_iter()
        .filter(|path| path.is_file())
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// Byte-for-byte equality of two files; a missing file compares unequal.
pub async fn files_equal(a: &Path, b: &Path) -> bool {
    match (tokio::fs::read(a).await, tokio::fs::read(b).await) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Size of a file in bytes, zero when it does not exist.
pub async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// Human readable byte count (`0B`, `512B`, `1.2kB`, `3.4MB`).
pub fn pretty_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    if value >= 100.0 {
        format!("{value:.0}{unit}")
    } else if value >= 10.0 {
        format!("{value:.1}{unit}")
    } else {
        format!("{value:.2}{unit}")
    }
}

/// Human readable duration (`12ms`, `1.5s`, `2m 3s`).
pub fn pretty_duration(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Eight hex characters, used to name scratch directories.
pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Reads width and height from the IHDR chunk of a PNG file.
pub fn png_dimensions(path: &Path) -> Result<(u32, u32)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    png_dimensions_from_bytes(&bytes).with_context(|| format!("{} is not a PNG", path.display()))
}

/// Parses PNG dimensions from raw bytes.
fn png_dimensions_from_bytes(bytes: &[u8]) -> Result<(u32, u32)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    anyhow::ensure!(bytes.len() >= 24, "file too short");
    anyhow::ensure!(bytes[..8] == SIGNATURE, "bad signature");
    anyhow::ensure!(&bytes[12..16] == b"IHDR", "first chunk is not IHDR");
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Ok((width, height))
}

/// Copies `from` to `to`, naming both paths on failure.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .with_context(|| format!("Could not copy {} to {}", from.display(), to.display()))
}
