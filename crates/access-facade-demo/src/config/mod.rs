//! Demo config loader (strict parsing).

pub mod schema;

use std::fs;

use access_facade_core::error::{AccessFacadeError, Result};

pub use schema::{DemoConfig, DemoSection, ServiceSection};

pub fn load_from_file(path: &str) -> Result<DemoConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| AccessFacadeError::Internal(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<DemoConfig> {
    let cfg: DemoConfig = serde_yaml::from_str(s)
        .map_err(|e| AccessFacadeError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
