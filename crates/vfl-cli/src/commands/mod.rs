//! Command handler modules for the `vfl` binary.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod ledger;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use tracing::{info, warn};
use vfl_audit::{verify_hash_chain, VerifyResult};
use vfl_config::{report_unused_keys, ConfigConsumer, UnusedKeyPolicy, VesselConfig};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config, run the unused-key guard for `consumer` and build
/// the typed view.
pub fn load_vessel_config(
    paths: &[String],
    consumer: ConfigConsumer,
    strict: bool,
) -> Result<VesselConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = vfl_config::load_layered_yaml(&path_refs)?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(consumer, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            consumer = consumer.as_str(),
            unused_leaf_keys = report.unused_leaf_pointers.len(),
            "CONFIG_UNUSED_KEYS"
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            warn!(unused = %p, "config/unused");
        }
    }

    let cfg = VesselConfig::from_loaded(&loaded)?;
    info!(
        config_hash = %cfg.config_hash,
        vessel = %cfg.vessel.name,
        tanks = cfg.registry.tanks().len(),
        rules = cfg.rules.len(),
        "config/loaded"
    );
    Ok(cfg)
}

/// Read a JSON document from disk.  A UTF-8 BOM is tolerated.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{path} must be UTF-8 text"))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{path} is not a valid document"))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output failed")?;
    println!("{s}");
    Ok(())
}

// ---------------------------------------------------------------------------
// audit-verify
// ---------------------------------------------------------------------------

pub fn audit_verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_valid=true lines={lines} path={path}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_valid=false line={line} path={path}");
            bail!("audit chain broken at line {line}: {reason}")
        }
    }
}
