//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to be told
//! when each pipeline stage of a request starts, finishes, or fails.
//!
//! The backend call dominates wall-clock time (seconds to minutes), so the
//! stage granularity is enough to drive a spinner without the library knowing
//! how the host application displays it.
//!
//! # Example
//!
//! ```rust
//! use docroute::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage_start(&self, name: &str, stage: Stage) {
//!         eprintln!("{name}: {stage}…");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Normalize,
    Classify,
    Parse,
    Archive,
    Inline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Classify => "classify",
            Stage::Parse => "parse",
            Stage::Archive => "archive",
            Stage::Inline => "inline",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the orchestrator as it moves a request through the pipeline.
///
/// `name` is the input path as the user supplied it, so two inputs that
/// share a file name in different directories stay distinct. Implementations
/// must be `Send + Sync`: batch conversion drives several requests at once,
/// so methods may be called concurrently for different inputs. All methods
/// default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per request before normalisation.
    fn on_conversion_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, name: &str, stage: Stage) {
        let _ = (name, stage);
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, name: &str, stage: Stage, elapsed_ms: u64) {
        let _ = (name, stage, elapsed_ms);
    }

    /// Called when a stage fails. For [`Stage::Archive`] under
    /// [`crate::config::ArchivePolicy::Degrade`] the request still continues.
    fn on_stage_error(&self, name: &str, stage: Stage, error: &str) {
        let _ = (name, stage, error);
    }

    /// Called once per request after the last stage (or the first fatal failure).
    fn on_conversion_complete(&self, name: &str, success: bool) {
        let _ = (name, success);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
