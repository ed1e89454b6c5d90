//! Session configuration.
//!
//! Everything the bridge needs is passed in explicitly at construction time;
//! there is no process-wide singleton state.

/// Configuration for one debugging session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// API credential for the optional natural-language assistant layer.
    /// Carried here so outer layers never need module-level state; the core
    /// itself does not use it.
    pub assistant_api_key: Option<String>,

    /// Default step budget for `run` when the caller does not pass one
    pub default_max_steps: usize,

    /// Maximum number of memory snapshots kept for undo/redo
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            assistant_api_key: None,
            default_max_steps: 1000,
            history_limit: 50,
        }
    }
}
