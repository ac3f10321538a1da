// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Layout Configuration I/O
//! Handles config file management, archiving, and path resolution
//!
//! Responsibilities:
//! - Config directory and file path resolution (~/.config/panelform/layout.xml)
//! - Archiving of an existing layout (layout.xml.NNNNN) before deploying the default
//! - Loading and parsing a layout file

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::pfgfp_parse::{parse_layout, ParseError};
use crate::pfgl_layout::LayoutModel;

// ============================================================================
// SECTION 1: Embedded default configuration
// ============================================================================

const DEFAULT_LAYOUT_XML: &str = include_str!("../layout.default.xml");

/// First numeric suffix tried when archiving an existing layout file
const ARCHIVE_FIRST_SUFFIX: u32 = 10000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("{path}: {source}")]
    Parse { path: PathBuf, source: ParseError },

    #[error("embedded default layout: {0}")]
    Default(ParseError),
}

// ============================================================================
// SECTION 2: Config path resolution
// ============================================================================

/// Resolve the standard config file path
pub fn config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("panelform");
    path.push("layout.xml");
    path
}

// ============================================================================
// SECTION 3: Config deployment and archiving
// ============================================================================

/// Write the embedded default layout to `path`.
/// An existing file is renamed to `<name>.NNNNN` first (first free suffix from 10000).
/// Returns the archive path when something was archived.
pub fn deploy_default(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }
    }

    let mut archived = None;
    if path.exists() {
        let archive_path = next_archive_path(path);
        fs::rename(path, &archive_path).map_err(|source| ConfigError::Write { path: archive_path.clone(), source })?;
        info!("CONFIG: archived {} -> {}", path.display(), archive_path.display());
        archived = Some(archive_path);
    }

    fs::write(path, DEFAULT_LAYOUT_XML).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
    info!("CONFIG: deployed embedded default to {}", path.display());

    Ok(archived)
}

fn next_archive_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layout.xml".to_string());

    let mut suffix = ARCHIVE_FIRST_SUFFIX;
    loop {
        let candidate = path.with_file_name(format!("{}.{}", file_name, suffix));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

// ============================================================================
// SECTION 4: Config file I/O
// ============================================================================

/// Get embedded default config content
pub fn default_layout_xml() -> &'static str {
    DEFAULT_LAYOUT_XML
}

/// Parse the embedded default layout
pub fn default_layout() -> Result<LayoutModel, ConfigError> {
    parse_layout(DEFAULT_LAYOUT_XML).map_err(ConfigError::Default)
}

/// Read and parse a layout file
pub fn load_layout(path: &Path) -> Result<LayoutModel, ConfigError> {
    let xml = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let model = parse_layout(&xml).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    debug!("CONFIG: loaded {} panels, {} widgets from {}", model.panels.len(), model.widget_count(), path.display());
    Ok(model)
}

/// Load the layout from the standard path, falling back to the embedded
/// default when no file has been deployed yet.
pub fn load_standard_layout() -> Result<LayoutModel, ConfigError> {
    let path = config_path();
    if path.exists() {
        load_layout(&path)
    } else {
        info!("CONFIG: {} not found, using embedded default", path.display());
        default_layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_is_valid() {
        let model = default_layout().unwrap();
        assert!(model.validate().is_ok());
        assert_eq!(model.panels.len(), 2);

        let top = &model.panels[0];
        assert_eq!(top.location, "top");
        assert_eq!(top.height, Some(30));
        let ids: Vec<&str> = top.widgets.iter().map(|w| w.identifier.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "org.kde.plasma.appmenu",
                "org.kde.plasma.panelspacer",
                "org.kde.plasma.digitalclock",
                "org.kde.plasma.systemtray",
            ]
        );

        let dock = &model.panels[1];
        assert_eq!(dock.location, "bottom");
        assert_eq!(dock.height, Some(48));
        assert_eq!(dock.floating, Some(true));
        assert_eq!(dock.alignment.as_deref(), Some("center"));
        assert_eq!(dock.length_mode.as_deref(), Some("fit"));
    }

    #[test]
    fn test_deploy_into_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("layout.xml");

        let archived = deploy_default(&path).unwrap();
        assert!(archived.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), default_layout_xml());
        assert_eq!(load_layout(&path).unwrap(), default_layout().unwrap());
    }

    #[test]
    fn test_deploy_archives_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.xml");
        fs::write(&path, "<Layout/>").unwrap();
        fs::write(dir.path().join("layout.xml.10000"), "older").unwrap();

        let archived = deploy_default(&path).unwrap().unwrap();
        assert_eq!(archived, dir.path().join("layout.xml.10001"));
        assert_eq!(fs::read_to_string(&archived).unwrap(), "<Layout/>");
        assert_eq!(fs::read_to_string(dir.path().join("layout.xml.10000")).unwrap(), "older");
        assert_eq!(fs::read_to_string(&path).unwrap(), default_layout_xml());
    }

    #[test]
    fn test_load_errors_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xml");
        assert!(matches!(load_layout(&missing), Err(ConfigError::Read { .. })));

        let broken = dir.path().join("broken.xml");
        fs::write(&broken, "<Layout><Panel/></Layout>").unwrap();
        assert!(matches!(load_layout(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_path_shape() {
        let path = config_path();
        assert!(path.ends_with(".config/panelform/layout.xml"));
    }
}
