//! Runtime options for a [`crate::StaticModule`].

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

/// Knobs applied when a graph is instantiated.
///
/// Environment variables can only switch features off (or profiling on); they are
/// applied on top of whatever the caller configured via [`RuntimeOptions::resolved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Resolve nodes through the operator registry when possible.
    pub enable_out_variant: bool,
    /// Compile elementwise kernels through the codegen backend.
    pub vectorize: bool,
    /// Record wall-clock time per node.
    pub profile_nodes: bool,
    /// Overrides the per-formula vector width chosen by each kernel.
    pub vector_width: Option<usize>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            enable_out_variant: true,
            vectorize: true,
            profile_nodes: false,
            vector_width: None,
        }
    }
}

impl RuntimeOptions {
    /// Parses options from a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(text)
            .map_err(|err| Error::invalid(format!("runtime options: {err}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(width) = self.vector_width {
            if width == 0 {
                return Err(Error::invalid("vector_width must be positive"));
            }
        }
        Ok(())
    }

    /// Applies `SRT_DISABLE_OUT_VARIANT`, `SRT_DISABLE_VECTORIZE` and `SRT_PROFILE_NODES`.
    pub fn resolved(mut self) -> Self {
        if env::out_variant_disabled() {
            self.enable_out_variant = false;
        }
        if env::vectorize_disabled() {
            self.vectorize = false;
        }
        if env::profile_nodes_enabled() {
            self.profile_nodes = true;
        }
        self
    }
}
