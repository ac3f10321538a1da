// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! In-process shell
//!
//! Keeps panels in a plain Vec, in creation order. Used for `apply --dry-run`
//! and as the shell double in reconciler tests, hence the failure injection knobs.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use crate::pfgc_core::{
    Alignment, HidingMode, LengthMode, Location, PanelId, Scalar, WidgetConfig, WidgetId,
    ATTR_ALIGNMENT, ATTR_FLOATING, ATTR_HEIGHT, ATTR_HIDING_MODE, ATTR_LENGTH_MODE, ATTR_LOCATION,
};
use crate::pfgs_shell::{ShellError, ShellHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct LivePanel {
    pub id: PanelId,
    pub attributes: BTreeMap<String, Scalar>,
    pub widgets: Vec<LiveWidget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveWidget {
    pub id: WidgetId,
    pub identifier: String,
    pub config: WidgetConfig,
}

/// Id-free view of one panel, for comparing live states across applies
pub type PanelSnapshot = (BTreeMap<String, Scalar>, Vec<String>);

impl LivePanel {
    pub fn identifiers(&self) -> Vec<&str> {
        self.widgets.iter().map(|w| w.identifier.as_str()).collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&Scalar> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Default)]
pub struct MemoryShell {
    panels: Vec<LivePanel>,
    next_id: u32,
    registry: Option<HashSet<String>>,
    failing_widgets: HashSet<String>,
    failing_removals: HashSet<PanelId>,
    failing_creation: bool,
    creations_left: Option<usize>,
    disconnect_widgets: HashSet<String>,
    unreachable: bool,
}

impl MemoryShell {
    /// Shell that accepts every widget identifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Shell that only knows the given widget identifiers
    pub fn with_registry<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry: Some(identifiers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Add a pre-existing panel, as if left over from an earlier session
    pub fn seed_panel(&mut self, location: &str, identifiers: &[&str]) -> PanelId {
        let id = self.alloc_panel();
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_LOCATION.to_string(), Scalar::Text(location.to_string()));
        let widgets = identifiers
            .iter()
            .map(|ident| LiveWidget {
                id: WidgetId(self.alloc()),
                identifier: ident.to_string(),
                config: WidgetConfig::new(),
            })
            .collect();
        self.panels.push(LivePanel { id, attributes, widgets });
        id
    }

    pub fn fail_widget(&mut self, identifier: &str) {
        self.failing_widgets.insert(identifier.to_string());
    }

    pub fn fail_removal(&mut self, panel: PanelId) {
        self.failing_removals.insert(panel);
    }

    pub fn fail_creation(&mut self, fail: bool) {
        self.failing_creation = fail;
    }

    /// Allow `count` more panel creations, then refuse
    pub fn fail_creation_after(&mut self, count: usize) {
        self.creations_left = Some(count);
    }

    /// Adding `identifier` makes the shell unreachable from then on
    pub fn disconnect_on_widget(&mut self, identifier: &str) {
        self.disconnect_widgets.insert(identifier.to_string());
    }

    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }

    pub fn panels(&self) -> &[LivePanel] {
        &self.panels
    }

    pub fn snapshot(&self) -> Vec<PanelSnapshot> {
        self.panels
            .iter()
            .map(|p| (p.attributes.clone(), p.widgets.iter().map(|w| w.identifier.clone()).collect()))
            .collect()
    }

    /// Human-readable dump of the live state
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.panels.is_empty() {
            out.push_str("(no panels)\n");
        }
        for panel in &self.panels {
            let attrs: Vec<String> = panel.attributes.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let _ = writeln!(out, "{} {}", panel.id, attrs.join(" "));
            for (idx, widget) in panel.widgets.iter().enumerate() {
                let _ = writeln!(out, "  [{}] {}", idx, widget.identifier);
                for (key, value) in &widget.config {
                    let _ = writeln!(out, "        {} = {}", key, value);
                }
            }
        }
        out
    }

    fn alloc(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn alloc_panel(&mut self) -> PanelId {
        PanelId(self.alloc())
    }

    fn check_reachable(&self) -> Result<(), ShellError> {
        if self.unreachable {
            return Err(ShellError::Unreachable("memory shell marked unreachable".to_string()));
        }
        Ok(())
    }

    fn panel_mut(&mut self, panel: PanelId) -> Result<&mut LivePanel, ShellError> {
        self.panels
            .iter_mut()
            .find(|p| p.id == panel)
            .ok_or(ShellError::UnknownPanel(panel))
    }
}

/// Same acceptance rules as a real shell: known names, recognized enum values.
fn attribute_accepted(name: &str, value: &Scalar) -> bool {
    match (name, value) {
        (ATTR_LOCATION, Scalar::Text(s)) => Location::parse(s).is_some(),
        (ATTR_HEIGHT, Scalar::Int(h)) => *h > 0,
        (ATTR_HIDING_MODE, Scalar::Text(s)) => HidingMode::parse(s).is_some(),
        (ATTR_FLOATING, Scalar::Bool(_)) => true,
        (ATTR_ALIGNMENT, Scalar::Text(s)) => Alignment::parse(s).is_some(),
        (ATTR_LENGTH_MODE, Scalar::Text(s)) => LengthMode::parse(s).is_some(),
        _ => false,
    }
}

impl ShellHandle for MemoryShell {
    fn list_panels(&mut self) -> Result<Vec<PanelId>, ShellError> {
        self.check_reachable()?;
        Ok(self.panels.iter().map(|p| p.id).collect())
    }

    fn remove_panel(&mut self, panel: PanelId) -> Result<(), ShellError> {
        self.check_reachable()?;
        if self.failing_removals.contains(&panel) {
            return Err(ShellError::Rejected { operation: "remove", detail: format!("{} is locked", panel) });
        }
        let before = self.panels.len();
        self.panels.retain(|p| p.id != panel);
        if self.panels.len() == before {
            return Err(ShellError::UnknownPanel(panel));
        }
        Ok(())
    }

    fn create_panel(&mut self) -> Result<PanelId, ShellError> {
        self.check_reachable()?;
        let exhausted = self.creations_left == Some(0);
        if self.failing_creation || exhausted {
            return Err(ShellError::Rejected { operation: "create", detail: "panel containment unavailable".to_string() });
        }
        if let Some(left) = self.creations_left.as_mut() {
            *left -= 1;
        }
        let id = self.alloc_panel();
        self.panels.push(LivePanel { id, attributes: BTreeMap::new(), widgets: Vec::new() });
        Ok(id)
    }

    fn set_attribute(&mut self, panel: PanelId, name: &str, value: &Scalar) -> Result<(), ShellError> {
        self.check_reachable()?;
        if !attribute_accepted(name, value) {
            return Err(ShellError::InvalidAttribute { name: name.to_string(), value: value.to_string() });
        }
        self.panel_mut(panel)?.attributes.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn add_widget(&mut self, panel: PanelId, identifier: &str, config: &WidgetConfig) -> Result<WidgetId, ShellError> {
        self.check_reachable()?;
        if self.disconnect_widgets.contains(identifier) {
            self.unreachable = true;
            return Err(ShellError::Unreachable(format!("connection lost while adding '{}'", identifier)));
        }
        let known = self.registry.as_ref().map_or(true, |r| r.contains(identifier));
        if !known || self.failing_widgets.contains(identifier) {
            return Err(ShellError::UnknownWidget(identifier.to_string()));
        }
        let id = WidgetId(self.alloc());
        self.panel_mut(panel)?.widgets.push(LiveWidget {
            id,
            identifier: identifier.to_string(),
            config: config.clone(),
        });
        Ok(id)
    }
}
