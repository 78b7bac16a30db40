use config::{Config, Environment, File};
use serde::Deserialize;
use virtwho_core::ConfigError;

/// The interval virt-who has used since its first release; kept as the
/// default when no configuration source names one (spec §6).
pub const DEFAULT_INTERVAL: u64 = 3600;

/// The floor every resolved interval is clamped to, regardless of which
/// layer supplied it. Enforced in exactly one place: [`resolve`].
pub const MIN_INTERVAL: u64 = 60;

/// The global configuration surface before layering and validation, with
/// every field optional so each layer (defaults, file, env, CLI) can leave
/// a field unset and let a lower-precedence layer supply it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOptions {
    pub interval: Option<u64>,
    pub one_shot: Option<bool>,
    pub print_only: Option<bool>,
    pub reporter_id: Option<String>,
    pub debug: Option<bool>,
    pub config_dir: Option<String>,
}

/// The fully resolved, validated global configuration every worker is
/// constructed from.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub interval: u64,
    pub one_shot: bool,
    pub print_only: bool,
    pub reporter_id: String,
    pub debug: bool,
    pub config_dir: Option<String>,
}

fn default_reporter_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Resolves the layered configuration (cli > env `VIRTWHO_*` > file >
/// built-in defaults) into a [`GlobalOptions`], enforcing the
/// [`MIN_INTERVAL`] floor along the way.
pub fn resolve(cli: RawOptions) -> Result<GlobalOptions, ConfigError> {
    let builder = Config::builder()
        .set_default("interval", DEFAULT_INTERVAL)
        .map_err(|e| ConfigError::new(e.to_string()))?
        .set_default("one_shot", false)
        .map_err(|e| ConfigError::new(e.to_string()))?
        .set_default("print_only", false)
        .map_err(|e| ConfigError::new(e.to_string()))?
        .set_default("debug", false)
        .map_err(|e| ConfigError::new(e.to_string()))?
        .add_source(File::with_name("/etc/virt-who.conf").required(false))
        .add_source(Environment::with_prefix("VIRTWHO"));

    let layered = builder.build().map_err(|e| ConfigError::new(e.to_string()))?;
    let mut resolved: RawOptions = layered
        .try_deserialize()
        .map_err(|e| ConfigError::new(e.to_string()))?;

    if cli.interval.is_some() {
        resolved.interval = cli.interval;
    }
    if cli.one_shot.is_some() {
        resolved.one_shot = cli.one_shot;
    }
    if cli.print_only.is_some() {
        resolved.print_only = cli.print_only;
    }
    if cli.reporter_id.is_some() {
        resolved.reporter_id = cli.reporter_id;
    }
    if cli.debug.is_some() {
        resolved.debug = cli.debug;
    }
    if cli.config_dir.is_some() {
        resolved.config_dir = cli.config_dir;
    }

    let interval = resolved.interval.unwrap_or(DEFAULT_INTERVAL).max(MIN_INTERVAL);

    Ok(GlobalOptions {
        interval,
        one_shot: resolved.one_shot.unwrap_or(false),
        print_only: resolved.print_only.unwrap_or(false),
        reporter_id: resolved.reporter_id.unwrap_or_else(default_reporter_id),
        debug: resolved.debug.unwrap_or(false),
        config_dir: resolved.config_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_below_floor_is_clamped() {
        let cli = RawOptions {
            interval: Some(10),
            ..Default::default()
        };
        let resolved = resolve(cli).expect("resolve should not fail on valid input");
        assert_eq!(resolved.interval, MIN_INTERVAL);
    }

    #[test]
    fn cli_interval_overrides_default() {
        let cli = RawOptions {
            interval: Some(120),
            ..Default::default()
        };
        let resolved = resolve(cli).expect("resolve should not fail on valid input");
        assert_eq!(resolved.interval, 120);
    }

    #[test]
    fn missing_interval_falls_back_to_default() {
        let resolved = resolve(RawOptions::default()).expect("resolve should not fail");
        assert_eq!(resolved.interval, DEFAULT_INTERVAL);
    }
}
