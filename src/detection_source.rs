// src/detection_source.rs

use crate::types::RawDetection;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One line of a detection stream: a frame's metadata plus the detector's
/// raw output for it.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Pull-based reader over a JSONL detection stream, standing in for the
/// live detector feed. Yields frames in file order; lines that fail to
/// parse are skipped with a warning so one bad record cannot end the run.
pub struct DetectionSource {
    reader: BufReader<File>,
    path: PathBuf,
    line_no: usize,
}

impl DetectionSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open detection stream {}", path.display()))?;
        info!("Opening detection stream: {}", path.display());
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            line_no: 0,
        })
    }

    /// Next frame record, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<FrameRecord>> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("read error in {}", self.path.display()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<FrameRecord>(line) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    warn!(
                        "Skipping malformed frame record at {}:{}: {}",
                        self.path.display(),
                        self.line_no,
                        e
                    );
                }
            }
        }
    }
}
