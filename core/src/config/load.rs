use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Get the default batchlint data directory: ~/.batchlint
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".batchlint"))
}

/// Load configuration with the usual precedence, then apply env overrides.
///
/// 1. `explicit` path (error if it does not exist)
/// 2. `~/.batchlint/config.toml`
/// 3. `./batchlint.toml`
/// 4. defaults
pub fn load(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = match explicit {
        Some(path) => load_from_path(path)?,
        None => {
            let user_config = get_data_dir().ok().map(|d| d.join("config.toml"));
            let local_config = Path::new("batchlint.toml");

            match user_config.filter(|p| p.exists()) {
                Some(path) => load_from_path(&path)?,
                None if local_config.exists() => load_from_path(local_config)?,
                None => AppConfig::default(),
            }
        }
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    load(None)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    parse(&s).with_context(|| format!("parse config file {}", path.display()))
}

pub fn parse(s: &str) -> anyhow::Result<AppConfig> {
    Ok(toml::from_str::<AppConfig>(s)?)
}

/// Environment variable overrides (highest priority). Empty values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, var: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("BATCHLINT_MAX_WORKERS") {
        cfg.scheduler.max_workers = Some(
            v.trim()
                .parse()
                .with_context(|| format!("BATCHLINT_MAX_WORKERS is not a number: {v}"))?,
        );
    }
    if let Some(v) = get("BATCHLINT_TIMEOUT_MS") {
        cfg.scheduler.timeout_ms = Some(
            v.trim()
                .parse()
                .with_context(|| format!("BATCHLINT_TIMEOUT_MS is not a number: {v}"))?,
        );
    }
    if let Some(v) = get("BATCHLINT_BATCH_SIZE") {
        cfg.scan.batch_size = v
            .trim()
            .parse()
            .with_context(|| format!("BATCHLINT_BATCH_SIZE is not a number: {v}"))?;
    }
    if let Some(v) = get("BATCHLINT_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    Ok(())
}
