//! Trace capturer binder.
//!
//! A capture records a fixed, ordered set of signals into a circular buffer
//! of `depth` samples, sampled in one clock domain. Its description is
//! exported once, after the build artifact exists, so host tooling can
//! decode captures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ComposeError, Result};
use crate::pipeline::TraceSignal;

/// Peripheral name of the capturer's control registers.
pub const ANALYZER: &str = "analyzer";

/// Lifecycle of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum CaptureState {
    Pending,
    Exported { path: PathBuf },
}

/// A bound trace capturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCapture {
    signals: Vec<TraceSignal>,
    depth: u32,
    clock_domain: String,
    state: CaptureState,
}

/// Bind a capturer to `signals`, sampled in `clock_domain`.
pub fn bind(signals: Vec<TraceSignal>, depth: u32, clock_domain: &str) -> Result<TraceCapture> {
    if signals.is_empty() {
        return Err(ComposeError::EmptyTrace { what: "at least one signal" });
    }
    if depth == 0 {
        return Err(ComposeError::EmptyTrace { what: "a non-zero depth" });
    }
    Ok(TraceCapture {
        signals,
        depth,
        clock_domain: clock_domain.to_string(),
        state: CaptureState::Pending,
    })
}

/// Proof that a build produced its artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    path: PathBuf,
}

impl BuildArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// On-disk trace description format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Csv,
    Json,
}

impl TraceFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => TraceFormat::Json,
            _ => TraceFormat::Csv,
        }
    }
}

/// Contents of an exported trace description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceExport {
    /// Samples held by the capture buffer.
    pub depth: u32,
    /// Sum of the captured signal widths, in bits.
    pub data_width: u32,
    /// Domain the capturer samples in.
    pub clock_domain: String,
    /// Captured signals, least significant bit first.
    pub signals: Vec<TraceSignal>,
}

impl TraceCapture {
    pub fn signals(&self) -> &[TraceSignal] {
        &self.signals
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn clock_domain(&self) -> &str {
        &self.clock_domain
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Total bits per sample.
    pub fn data_width(&self) -> u32 {
        self.signals.iter().map(|s| s.width).sum()
    }

    /// Write the capture description to `path`. Allowed once, after the
    /// build artifact exists.
    pub fn export(&mut self, build: &BuildArtifact, path: &Path) -> Result<()> {
        if let CaptureState::Exported { path } = &self.state {
            return Err(ComposeError::AlreadyExported { path: path.clone() });
        }
        if !build.exists() {
            return Err(ComposeError::ExportBeforeBuild {
                path: path.to_path_buf(),
            });
        }

        let export = TraceExport {
            depth: self.depth,
            data_width: self.data_width(),
            clock_domain: self.clock_domain.clone(),
            signals: self.signals.clone(),
        };
        let content = match TraceFormat::for_path(path) {
            TraceFormat::Json => serde_json::to_string_pretty(&export)?,
            TraceFormat::Csv => to_csv(&export),
        };
        fs::write(path, content)?;
        info!(path = %path.display(), signals = self.signals.len(), "exported trace capture");

        self.state = CaptureState::Exported {
            path: path.to_path_buf(),
        };
        Ok(())
    }
}

fn to_csv(export: &TraceExport) -> String {
    let mut out = format!(
        "config,,depth,{}\nconfig,,data_width,{}\nconfig,,clock_domain,{}\n",
        export.depth, export.data_width, export.clock_domain
    );
    for (i, signal) in export.signals.iter().enumerate() {
        out.push_str(&format!("signal,{i},{},{}\n", signal.name, signal.width));
    }
    out
}

/// Read an exported trace description back.
pub fn read_export(path: &Path) -> Result<TraceExport> {
    let content = fs::read_to_string(path)?;
    match TraceFormat::for_path(path) {
        TraceFormat::Json => Ok(serde_json::from_str(&content)?),
        TraceFormat::Csv => parse_csv(&content).ok_or_else(|| {
            ComposeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed trace description {}", path.display()),
            ))
        }),
    }
}

fn parse_csv(content: &str) -> Option<TraceExport> {
    let mut depth = None;
    let mut data_width = None;
    let mut clock_domain = None;
    let mut signals = Vec::new();
    for line in content.lines().filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(',').collect();
        match fields.as_slice() {
            ["config", _, "depth", v] => depth = v.parse().ok(),
            ["config", _, "data_width", v] => data_width = v.parse().ok(),
            ["config", _, "clock_domain", v] => clock_domain = Some(v.to_string()),
            ["signal", _, name, width] => signals.push(TraceSignal::new(*name, width.parse().ok()?)),
            _ => return None,
        }
    }
    Some(TraceExport {
        depth: depth?,
        data_width: data_width?,
        clock_domain: clock_domain?,
        signals,
    })
}
