//! Scan options and the on-disk files a launch needs.
//!
//! Engine mode derives a per-job config from the engine's own default config
//! and writes a per-job base URL list. Fallback mode writes a self-contained
//! config into a fresh timestamped output directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use a11y_core::config::PathsConfig;
use a11y_core::ScanError;

use crate::tracker::ScanArtifacts;

/// Longest label the engines accept in folder names.
pub const MAX_LABEL_LEN: usize = 50;

const DEFAULT_CONFIG_FILE: &str = "config_default.json";
const URL_LIST_FILE: &str = "urls.csv";
const DEFAULT_MAX_LINKS: u32 = 10;

/// Reduce a label to the form engines use in folder names.
///
/// Whitespace is trimmed, anything outside `[A-Za-z0-9_.-]` becomes `_`,
/// runs of `_` collapse to one, and the result is cut at [`MAX_LABEL_LEN`].
pub fn sanitize_label(raw: &str) -> Result<String, ScanError> {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    // only ASCII remains, so byte truncation is char-safe
    out.truncate(MAX_LABEL_LEN);

    if out.is_empty() {
        return Err(ScanError::InvalidInput(
            "label is empty after sanitization".to_string(),
        ));
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Caller-supplied overrides for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Audit plugin toggles, by plugin key.
    pub plugins: BTreeMap<String, bool>,
    pub max_links_per_domain: Option<u32>,
    pub viewport_sizes: Option<BTreeMap<String, Viewport>>,
}

fn require_urls(urls: &[String]) -> Result<(), ScanError> {
    if urls.is_empty() {
        return Err(ScanError::InvalidInput(
            "at least one URL must be provided".to_string(),
        ));
    }
    Ok(())
}

fn input_dir_name(job_id: &str) -> String {
    format!("mcp_{job_id}")
}

/// Write the engine's per-job config and URL list.
///
/// Returns the config file name (the engine resolves it against its own
/// `config/` directory) and the artifacts to clean up afterwards.
pub fn write_engine_config(
    engine_dir: &Path,
    job_id: &str,
    label: &str,
    urls: &[String],
    options: &ScanOptions,
) -> Result<(String, ScanArtifacts), ScanError> {
    require_urls(urls)?;
    let audit_name = sanitize_label(label)?;

    let config_dir = engine_dir.join("config");
    let default_path = config_dir.join(DEFAULT_CONFIG_FILE);
    let raw = fs::read_to_string(&default_path).map_err(|e| {
        ScanError::Config(format!("cannot read {}: {e}", default_path.display()))
    })?;
    let mut config: Value = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;
    let Some(obj) = config.as_object_mut() else {
        return Err(ScanError::Config(format!(
            "{} is not a JSON object",
            default_path.display()
        )));
    };

    obj.insert("audit_name".to_string(), json!(audit_name));

    if let Some(audit_plugins) = obj.get_mut("audit_plugins").and_then(Value::as_object_mut) {
        for (key, enabled) in &options.plugins {
            if let Some(plugin) = audit_plugins.get_mut(key).and_then(Value::as_object_mut) {
                plugin.insert("enabled".to_string(), json!(enabled));
            } else {
                debug!(plugin = %key, "ignoring unknown audit plugin");
            }
        }
    }

    if let Some(max_links) = options.max_links_per_domain.filter(|n| *n > 0) {
        obj.insert("max_links_per_domain".to_string(), json!(max_links));
    }
    if let Some(viewports) = &options.viewport_sizes {
        obj.insert("viewport_sizes".to_string(), serde_json::to_value(viewports)?);
    }

    let subdir = input_dir_name(job_id);
    obj.insert(
        "base_urls_visit_path".to_string(),
        json!(format!("./base_urls/visit/{subdir}/")),
    );

    let config_file_name = format!("{subdir}.json");
    let config_path = config_dir.join(&config_file_name);
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    let input_dir = engine_dir.join("base_urls").join("visit").join(&subdir);
    fs::create_dir_all(&input_dir)?;
    write_url_list(&input_dir.join(URL_LIST_FILE), urls)?;

    debug!(config = %config_path.display(), urls = urls.len(), "engine config written");

    Ok((
        config_file_name,
        ScanArtifacts {
            config_path,
            input_dir: Some(input_dir),
            output_dir: None,
        },
    ))
}

fn write_url_list(path: &Path, urls: &[String]) -> Result<(), ScanError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| ScanError::Config(format!("cannot write {}: {e}", path.display())))?;
    let rows = std::iter::once(["organisation", "url", "sector"])
        .chain(urls.iter().map(|url| ["MCP Scan", url.as_str(), "MCP"]));
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| ScanError::Config(format!("cannot write {}: {e}", path.display())))?;
    }
    writer.flush()?;
    Ok(())
}

/// Create the fallback scanner's output directory and write its config there.
pub fn write_fallback_config(
    paths: &PathsConfig,
    job_id: &str,
    label: &str,
    urls: &[String],
    options: &ScanOptions,
) -> Result<ScanArtifacts, ScanError> {
    require_urls(urls)?;
    let audit_name = sanitize_label(label)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let output_dir: PathBuf = paths
        .fallback_output_root()
        .join(format!("{stamp}_{audit_name}"));
    fs::create_dir_all(&output_dir)?;

    let viewports = options.viewport_sizes.clone().unwrap_or_else(|| {
        BTreeMap::from([(
            "medium".to_string(),
            Viewport {
                width: 1280,
                height: 800,
            },
        )])
    });

    let config = json!({
        "audit_name": audit_name,
        "urls": urls,
        "max_links_per_domain": options
            .max_links_per_domain
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_LINKS),
        "viewport_sizes": viewports,
        "output_dir": output_dir,
        "axe_core_path": paths.project_root.join(&paths.axe_core_script),
    });

    let config_path = output_dir.join(format!("config_{job_id}.json"));
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    debug!(config = %config_path.display(), "fallback config written");

    Ok(ScanArtifacts {
        config_path,
        input_dir: None,
        output_dir: Some(output_dir),
    })
}
