// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Shared value types for the layout model, the reconciler and the shell backends.

use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Panel attribute names (as passed to ShellHandle::set_attribute)
// ============================================================================

pub const ATTR_LOCATION: &str = "location";
pub const ATTR_HEIGHT: &str = "height";
pub const ATTR_HIDING_MODE: &str = "hidingMode";
pub const ATTR_FLOATING: &str = "floating";
pub const ATTR_ALIGNMENT: &str = "alignment";
pub const ATTR_LENGTH_MODE: &str = "lengthMode";

// ============================================================================
// Handles
// ============================================================================

/// Shell-assigned identity of a live panel. Only meaningful within one apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u32);

/// Shell-assigned identity of a widget inside a live panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel#{}", self.0)
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

// ============================================================================
// Scalar values (widget config entries and panel attribute values)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// Type tag used by the layout file (`type="..."` on Config entries)
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Text(_) => "string",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Bool(_) => "bool",
        }
    }

    /// Parse a raw value according to a type tag. None for unknown tags or bad values.
    pub fn parse_typed(type_name: &str, raw: &str) -> Option<Scalar> {
        match type_name {
            "string" => Some(Scalar::Text(raw.to_string())),
            "int" => raw.trim().parse::<i64>().ok().map(Scalar::Int),
            "float" => raw.trim().parse::<f64>().ok().map(Scalar::Float),
            "bool" => parse_bool(raw).map(Scalar::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Widget configuration: key → value, iterated in key order
pub type WidgetConfig = BTreeMap<String, Scalar>;

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Panel attribute enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Top,
    Bottom,
    Left,
    Right,
}

impl Location {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Location::Top),
            "bottom" => Some(Location::Bottom),
            "left" => Some(Location::Left),
            "right" => Some(Location::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Top => "top",
            Location::Bottom => "bottom",
            Location::Left => "left",
            Location::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HidingMode {
    #[default]
    AlwaysVisible,
    AutoHide,
    WindowsCanCover,
    WindowsGoBelow,
}

impl HidingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always-visible" => Some(HidingMode::AlwaysVisible),
            "auto-hide" => Some(HidingMode::AutoHide),
            "windows-can-cover" => Some(HidingMode::WindowsCanCover),
            "windows-go-below" => Some(HidingMode::WindowsGoBelow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HidingMode::AlwaysVisible => "always-visible",
            HidingMode::AutoHide => "auto-hide",
            HidingMode::WindowsCanCover => "windows-can-cover",
            HidingMode::WindowsGoBelow => "windows-go-below",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Start,
    Center,
    End,
    #[default]
    Stretch,
}

impl Alignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Alignment::Start),
            "center" => Some(Alignment::Center),
            "end" => Some(Alignment::End),
            "stretch" => Some(Alignment::Stretch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Start => "start",
            Alignment::Center => "center",
            Alignment::End => "end",
            Alignment::Stretch => "stretch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthMode {
    #[default]
    Fill,
    Fit,
}

impl LengthMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fill" => Some(LengthMode::Fill),
            "fit" => Some(LengthMode::Fit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthMode::Fill => "fill",
            LengthMode::Fit => "fit",
        }
    }
}
