//! Controller configuration

use std::sync::Arc;

/// Default nesting limit for JSON import and export.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Configuration carried by a [`ValueController`](crate::ValueController).
///
/// Contexts are passed explicitly when a controller is built; there is no
/// process-wide default instance.
#[derive(Debug, Clone)]
pub struct ValueContext {
    /// Maximum container nesting accepted by JSON conversion
    pub max_depth: usize,

    /// Optional domain name attached to tracing events
    pub label: Option<Arc<str>>,
}

impl Default for ValueContext {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            label: None,
        }
    }
}

impl ValueContext {
    /// Create a new context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a custom nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    /// Create a context whose events are tagged with `label`.
    pub fn with_label(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// The label, or `"-"` when none was set.
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}
