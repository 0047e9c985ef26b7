//! Locate exposure files by name pattern and order them by embedded index.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::frame::FrameKind;

/// File-name glob patterns, relative to the data directory, per frame type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramePatterns {
    pub bias: String,
    pub dark: String,
    pub flat: String,
    pub science: String,
}

impl Default for FramePatterns {
    fn default() -> Self {
        Self {
            bias: "Bias*".into(),
            dark: "Dark*".into(),
            flat: "domeflat*".into(),
            science: "LPSEB*".into(),
        }
    }
}

impl FramePatterns {
    pub fn for_kind(&self, kind: FrameKind) -> &str {
        match kind {
            FrameKind::Bias => &self.bias,
            FrameKind::Dark => &self.dark,
            FrameKind::Flat => &self.flat,
            FrameKind::Science => &self.science,
        }
    }
}

/// Files of every frame type found in a data directory.
#[derive(Clone, Debug, Default)]
pub struct DiscoveredFrames {
    pub bias: Vec<PathBuf>,
    pub dark: Vec<PathBuf>,
    pub flat: Vec<PathBuf>,
    pub science: Vec<PathBuf>,
}

/// Find every frame type under `dir`.
pub fn discover_frames(dir: &Path, patterns: &FramePatterns) -> Result<DiscoveredFrames> {
    let found = DiscoveredFrames {
        bias: discover(dir, &patterns.bias)?,
        dark: discover(dir, &patterns.dark)?,
        flat: discover(dir, &patterns.flat)?,
        science: discover(dir, &patterns.science)?,
    };
    debug!(
        bias = found.bias.len(),
        dark = found.dark.len(),
        flat = found.flat.len(),
        science = found.science.len(),
        "Discovered frames"
    );
    Ok(found)
}

/// Glob `pattern` inside `dir` and sort the matches by [`sort_by_index`].
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let mut paths = Vec::new();
    for entry in glob::glob(&full.to_string_lossy())? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable directory entry"),
        }
    }
    sort_by_index(&mut paths);
    Ok(paths)
}

/// Sort paths by the last integer embedded in the file name.
///
/// `frame10.fits` sorts after `frame9.fits`. Names without digits sort after
/// numbered ones; ties fall back to lexical order.
pub fn sort_by_index(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        let ka = (file_index(a).unwrap_or(u64::MAX), a.file_name());
        let kb = (file_index(b).unwrap_or(u64::MAX), b.file_name());
        ka.cmp(&kb)
    });
}

/// Last run of digits in the file stem.
pub fn file_index(path: &Path) -> Option<u64> {
    static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()?;
    let stem = path.file_stem()?.to_str()?;
    re.find_iter(stem).last()?.as_str().parse().ok()
}
