use crate::serializable_struct_with_getters;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 0.95;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

serializable_struct_with_getters! {
    OverSketchConfig {
        sketch_dim: usize,
        #[serde(default = "default_threshold")]
        threshold: f64,
        seed: Option<String>,
        #[serde(default)]
        dispatch: DispatchConfig,
    }
}

serializable_struct_with_getters! {
    DispatchConfig {
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        phase_timeout_ms: Option<u64>,
        #[serde(default)]
        cancel_stragglers: bool,
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            phase_timeout_ms: None,
            cancel_stragglers: false,
        }
    }
}

impl OverSketchConfig {
    pub fn new(sketch_dim: usize) -> Self {
        Self {
            sketch_dim,
            threshold: DEFAULT_THRESHOLD,
            seed: None,
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sketch_dim == 0 {
            return Err(anyhow!("sketch_dim must be greater than 0"));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(anyhow!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            ));
        }
        self.dispatch.validate()
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than 0"));
        }
        if self.phase_timeout_ms == Some(0) {
            return Err(anyhow!("phase_timeout_ms must be greater than 0 when set"));
        }
        Ok(())
    }
}
