// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Layout Model
//!
//! Desired-state description of the desktop: an ordered list of panels, each with
//! placement attributes and an ordered widget list. Enumerated attributes are kept
//! in their textual form so a model read from disk can carry unrecognized values
//! until `validate()` reports them with an index path.
//!
//! No I/O happens here.

use std::fmt;

use crate::pfgc_core::{
    Alignment, HidingMode, LengthMode, Location, Scalar, WidgetConfig,
    ATTR_ALIGNMENT, ATTR_FLOATING, ATTR_HEIGHT, ATTR_HIDING_MODE, ATTR_LENGTH_MODE, ATTR_LOCATION,
};

// ============================================================================
// SECTION 1: Model structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutModel {
    pub panels: Vec<PanelSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    pub location: String,
    pub height: Option<i64>,
    pub hiding_mode: Option<String>,
    pub floating: Option<bool>,
    pub alignment: Option<String>,
    pub length_mode: Option<String>,
    pub widgets: Vec<WidgetSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    pub identifier: String,
    pub config: WidgetConfig,
}

impl LayoutModel {
    pub fn new(panels: Vec<PanelSpec>) -> Self {
        Self { panels }
    }

    pub fn widget_count(&self) -> usize {
        self.panels.iter().map(|p| p.widgets.len()).sum()
    }
}

impl PanelSpec {
    /// Panel at `location` with every optional attribute left to its default
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            height: None,
            hiding_mode: None,
            floating: None,
            alignment: None,
            length_mode: None,
            widgets: Vec::new(),
        }
    }

    pub fn with_widgets<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.widgets.extend(identifiers.into_iter().map(WidgetSpec::new));
        self
    }

    /// Attribute assignments in the order the reconciler applies them.
    ///
    /// Defaults are spelled out so a re-apply never depends on what the shell
    /// picks for a fresh panel. Height is the exception: absent means shell default.
    pub fn attributes(&self) -> Vec<(&'static str, Scalar)> {
        let mut attrs = Vec::with_capacity(6);
        attrs.push((ATTR_LOCATION, Scalar::Text(self.location.clone())));
        if let Some(h) = self.height {
            attrs.push((ATTR_HEIGHT, Scalar::Int(h)));
        }
        attrs.push((
            ATTR_HIDING_MODE,
            Scalar::Text(self.hiding_mode.clone().unwrap_or_else(|| HidingMode::default().as_str().to_string())),
        ));
        attrs.push((ATTR_FLOATING, Scalar::Bool(self.floating.unwrap_or(false))));
        attrs.push((
            ATTR_ALIGNMENT,
            Scalar::Text(self.alignment.clone().unwrap_or_else(|| Alignment::default().as_str().to_string())),
        ));
        attrs.push((
            ATTR_LENGTH_MODE,
            Scalar::Text(self.length_mode.clone().unwrap_or_else(|| LengthMode::default().as_str().to_string())),
        ));
        attrs
    }
}

impl WidgetSpec {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            config: WidgetConfig::new(),
        }
    }
}

// ============================================================================
// SECTION 2: Validation
// ============================================================================

/// Location of a violation inside a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPath {
    pub panel: usize,
    pub widget: Option<usize>,
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.widget {
            Some(w) => write!(f, "panels[{}].widgets[{}]", self.panel, w),
            None => write!(f, "panels[{}]", self.panel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationErrorKind {
    #[error("unknown location '{0}' (expected top, bottom, left or right)")]
    UnknownLocation(String),
    #[error("height must be positive, got {0}")]
    NonPositiveHeight(i64),
    #[error("unknown hiding mode '{0}'")]
    UnknownHidingMode(String),
    #[error("unknown alignment '{0}'")]
    UnknownAlignment(String),
    #[error("unknown length mode '{0}'")]
    UnknownLengthMode(String),
    #[error("widget identifier is empty")]
    EmptyWidgetIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    pub path: IndexPath,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    fn panel(panel: usize, kind: ValidationErrorKind) -> Self {
        Self { path: IndexPath { panel, widget: None }, kind }
    }
}

impl LayoutModel {
    /// Structural check of the whole model. Returns the first violation in model order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (pi, panel) in self.panels.iter().enumerate() {
            panel.validate(pi)?;
        }
        Ok(())
    }
}

impl PanelSpec {
    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        use ValidationErrorKind::*;

        if Location::parse(&self.location).is_none() {
            return Err(ValidationError::panel(index, UnknownLocation(self.location.clone())));
        }
        if let Some(h) = self.height {
            if h <= 0 {
                return Err(ValidationError::panel(index, NonPositiveHeight(h)));
            }
        }
        if let Some(ref mode) = self.hiding_mode {
            if HidingMode::parse(mode).is_none() {
                return Err(ValidationError::panel(index, UnknownHidingMode(mode.clone())));
            }
        }
        if let Some(ref align) = self.alignment {
            if Alignment::parse(align).is_none() {
                return Err(ValidationError::panel(index, UnknownAlignment(align.clone())));
            }
        }
        if let Some(ref mode) = self.length_mode {
            if LengthMode::parse(mode).is_none() {
                return Err(ValidationError::panel(index, UnknownLengthMode(mode.clone())));
            }
        }

        for (wi, widget) in self.widgets.iter().enumerate() {
            if widget.identifier.trim().is_empty() {
                return Err(ValidationError {
                    path: IndexPath { panel: index, widget: Some(wi) },
                    kind: EmptyWidgetIdentifier,
                });
            }
        }

        Ok(())
    }
}
