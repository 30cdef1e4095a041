//! Call-site facts cached by return address
//!
//! Resolving file, line and function for a frame means walking the stack and
//! symbolizing an address, which is far too slow to do on every log call. The
//! facts for a given instruction address never change while the process runs,
//! so they are resolved once and kept for good. The cache only grows; its size
//! is bounded by the number of logging call sites in the binary.
//!
//! Optimized builds need `debug = "line-tables-only"` (or more) in their
//! profile; without line tables every call site resolves to the placeholder.

use super::context::Context;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Path markers trimmed by default: cargo registry sources, git checkouts and
/// the toolchain's own sources all embed machine-specific prefixes.
pub const DEFAULT_PATH_MARKERS: &[&str] = &[
    "/.cargo/registry/src/",
    "/.cargo/git/checkouts/",
    "/rustc/",
];

/// Upper bound on frames walked while looking for a caller
const MAX_FRAMES: usize = 128;

fn unknown_call_site() -> Arc<Context> {
    static UNKNOWN: OnceLock<Arc<Context>> = OnceLock::new();
    Arc::clone(UNKNOWN.get_or_init(|| {
        Arc::new(
            Context::new()
                .with_field("file", "")
                .with_field("line", 0u32)
                .with_field("func", ""),
        )
    }))
}

/// Cache of `file`/`line`/`func` facts keyed by the caller's return address
#[derive(Debug)]
pub struct CallSiteCache {
    entries: RwLock<HashMap<usize, Arc<Context>>>,
    markers: RwLock<Vec<String>>,
    resolutions: AtomicU64,
}

impl CallSiteCache {
    pub fn new() -> Self {
        Self::with_markers(DEFAULT_PATH_MARKERS.iter().map(|m| m.to_string()))
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: RwLock::new(HashMap::new()),
            markers: RwLock::new(markers.into_iter().map(Into::into).collect()),
            resolutions: AtomicU64::new(0),
        }
    }

    /// Register another source-tree marker
    ///
    /// Entries already cached keep the path they were resolved with.
    pub fn add_path_marker(&self, marker: impl Into<String>) {
        self.markers.write().push(marker.into());
    }

    pub fn path_markers(&self) -> Vec<String> {
        self.markers.read().clone()
    }

    /// Facts for the frame `skip` levels above the caller of `resolve`
    ///
    /// `skip == 0` names the function that called `resolve`. When the frame
    /// cannot be found, or the binary carries no line tables for it, the
    /// placeholder (`file=""`, `line=0`, `func=""`) is returned instead; this
    /// never fails.
    #[inline(never)]
    pub fn resolve(&self, skip: usize) -> Arc<Context> {
        let frame = match capture_frame(skip + 1) {
            Some(frame) => frame,
            None => return unknown_call_site(),
        };
        let key = frame.ip() as usize;

        if let Some(cached) = self.entries.read().get(&key) {
            return Arc::clone(cached);
        }

        // Racing first lookups may both resolve; the results are identical.
        let resolved = self.symbolize(&frame);
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key).or_insert(resolved))
    }

    fn symbolize(&self, frame: &backtrace::Frame) -> Arc<Context> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        let mut file = String::new();
        let mut line = 0u32;
        let mut func = String::new();

        backtrace::resolve_frame(frame, |symbol| {
            if func.is_empty() {
                if let Some(name) = symbol.name() {
                    func = format!("{:#}", name);
                }
            }
            if file.is_empty() {
                if let Some(path) = symbol.filename() {
                    file = path.display().to_string();
                    line = symbol.lineno().unwrap_or(0);
                }
            }
        });

        call_site_facts(&file, line, func, &self.markers.read())
    }

    /// Number of symbolizations performed (cache misses)
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Number of distinct call sites cached
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for CallSiteCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame `depth` levels above the caller of this function
#[inline(never)]
fn capture_frame(depth: usize) -> Option<backtrace::Frame> {
    let anchor = capture_frame as fn(usize) -> Option<backtrace::Frame> as usize;
    let mut frames = Vec::with_capacity(16);
    backtrace::trace(|frame| {
        frames.push(frame.clone());
        frames.len() < MAX_FRAMES
    });

    // Start counting from our own frame when the unwinder reports it; the
    // frames below it belong to the unwinder itself.
    let start = frames
        .iter()
        .position(|frame| frame.symbol_address() as usize == anchor)
        .map_or(0, |pos| pos + 1);
    frames.into_iter().nth(start + depth)
}

/// Facts for a symbolized frame
///
/// Without a source file the symbol name cannot be trusted either: stripped
/// or optimized builds report the nearest exported symbol, which is usually
/// some other function. Such frames get the placeholder.
fn call_site_facts(file: &str, line: u32, func: String, markers: &[String]) -> Arc<Context> {
    if file.is_empty() {
        return unknown_call_site();
    }
    Arc::new(
        Context::new()
            .with_field("file", trim_path(file, markers))
            .with_field("line", line)
            .with_field("func", func),
    )
}

/// Cut everything up to and including each marker found in `file`
///
/// Markers are applied in order, so a later marker can trim further.
pub fn trim_path(file: &str, markers: &[String]) -> String {
    let mut trimmed = file;
    for marker in markers {
        if marker.is_empty() {
            continue;
        }
        if let Some(pos) = trimmed.find(marker.as_str()) {
            trimmed = &trimmed[pos + marker.len()..];
        }
    }
    trimmed.to_string()
}
