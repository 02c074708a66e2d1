// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevloopError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let scan_interval = interval("watch.scan_interval", &raw.watch.scan_interval)?;
        let poll_interval = interval("watch.poll_interval", &raw.watch.poll_interval)?;
        Ok(ConfigFile::new_unchecked(raw, scan_interval, poll_interval))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch(cfg)?;
    validate_build(cfg)?;
    validate_env(cfg)?;
    validate_livereload(cfg)?;
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    for ext in cfg.watch.included_extensions.iter() {
        let ext = ext.trim();
        if ext.len() < 2 || !ext.starts_with('.') {
            return Err(DevloopError::ConfigError(format!(
                "[watch].included_extensions entry '{ext}' must look like \".go\""
            )));
        }
    }
    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.command.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[build].command must not be empty".to_string(),
        ));
    }
    if cfg.build.binary_name.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[build].binary_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_env(cfg: &RawConfigFile) -> Result<()> {
    for key in cfg.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(DevloopError::ConfigError(format!(
                "[env] has invalid variable name '{key}'"
            )));
        }
    }
    Ok(())
}

fn validate_livereload(cfg: &RawConfigFile) -> Result<()> {
    if cfg.livereload.enable && cfg.livereload.port == 0 {
        return Err(DevloopError::ConfigError(
            "[livereload].port must be >= 1 when livereload is enabled".to_string(),
        ));
    }
    for (idx, task) in cfg.livereload.tasks.iter().enumerate() {
        if task.trim().is_empty() {
            return Err(DevloopError::ConfigError(format!(
                "[livereload].tasks[{idx}] is empty"
            )));
        }
    }
    Ok(())
}

fn interval(field: &str, raw: &str) -> Result<Duration> {
    let duration = parse_duration(raw)
        .map_err(|e| DevloopError::ConfigError(format!("{field}: {e}")))?;
    if duration.is_zero() {
        return Err(DevloopError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(duration)
}
