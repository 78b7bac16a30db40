use tracing_subscriber::{fmt, EnvFilter};

/// Tracing setup shared by every agent binary: a level (overridable via
/// `RUST_LOG`) and a choice between human-readable and JSON-formatted
/// output, matching the two modes the teacher's agent binaries expose.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        if self.json {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(true)
                .init();
        } else {
            fmt().with_env_filter(filter).init();
        }
    }
}
