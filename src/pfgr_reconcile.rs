// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Layout Reconciler
//! Replaces the live panel set of a shell with the panels described by a model
//!
//! Strategy is remove-everything-then-build, never a diff: the result of an apply
//! depends only on the model, so applying the same model twice yields the same
//! live state. Each call walks Idle → TearingDown → Building → Done/Failed and
//! keeps nothing between calls.
//!
//! The model must already have passed `LayoutModel::validate`; nothing here re-checks it.

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::pfgc_core::PanelId;
use crate::pfgl_layout::{LayoutModel, PanelSpec};
use crate::pfgs_shell::{ShellError, ShellHandle};

// ============================================================================
// SECTION 1: Report and error types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    TearingDown,
    Building,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::TearingDown => write!(f, "teardown"),
            Phase::Building => write!(f, "build"),
        }
    }
}

/// What a non-fatal failure was attached to, within one declared panel
#[derive(Debug, Clone, PartialEq)]
pub enum FailureTarget {
    Attribute(&'static str),
    Widget { index: usize, identifier: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    /// Index of the panel in the model
    pub panel: usize,
    pub target: FailureTarget,
    pub cause: ShellError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovalFailure {
    pub panel: PanelId,
    pub cause: ShellError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub panels_removed: usize,
    pub panels_created: usize,
    pub widgets_added: usize,
    pub removal_failures: Vec<RemovalFailure>,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    /// No warnings of any kind were recorded
    pub fn is_clean(&self) -> bool {
        self.removal_failures.is_empty() && self.failures.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.removal_failures.len() + self.failures.len()
    }

    /// (panel index, widget index, cause) for every widget that could not be added
    pub fn widget_failures(&self) -> impl Iterator<Item = (usize, usize, &ShellError)> + '_ {
        self.failures.iter().filter_map(|f| match f.target {
            FailureTarget::Widget { index, .. } => Some((f.panel, index, &f.cause)),
            FailureTarget::Attribute(_) => None,
        })
    }
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            FailureTarget::Attribute(name) => {
                write!(f, "panels[{}] attribute {}: {}", self.panel, name, self.cause)
            }
            FailureTarget::Widget { index, identifier } => {
                write!(f, "panels[{}].widgets[{}] '{}': {}", self.panel, index, identifier, self.cause)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("{cause} (during {phase})")]
    Unreachable { phase: Phase, cause: ShellError },

    #[error("could not remove any of the {} existing panels", .failures.len())]
    TeardownFailed { failures: Vec<RemovalFailure> },

    /// `partial` holds what was done before the failing panel
    #[error("creating panels[{panel}] failed: {cause}")]
    PanelCreation { panel: usize, cause: ShellError, partial: ApplyReport },
}

/// Pass a recoverable error through for recording; escalate an unreachable shell.
fn contain(cause: ShellError, phase: Phase) -> Result<ShellError, ApplyError> {
    if cause.is_unreachable() {
        Err(ApplyError::Unreachable { phase, cause })
    } else {
        Ok(cause)
    }
}

// ============================================================================
// SECTION 2: Apply
// ============================================================================

/// Make the live panel set of `shell` match `model`.
///
/// Partial application is not rolled back when an error is returned.
pub fn apply<S: ShellHandle + ?Sized>(model: &LayoutModel, shell: &mut S) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport::default();

    teardown(shell, &mut report)?;

    debug!("APPLY: building {} panels", model.panels.len());
    for (index, spec) in model.panels.iter().enumerate() {
        let panel = match shell.create_panel() {
            Ok(id) => id,
            Err(e) => {
                let cause = contain(e, Phase::Building)?;
                warn!("APPLY: panels[{}] could not be created: {}", index, cause);
                return Err(ApplyError::PanelCreation { panel: index, cause, partial: report });
            }
        };
        report.panels_created += 1;
        trace!("APPLY: panels[{}] created as {}", index, panel);

        fill_panel(shell, index, panel, spec, &mut report)?;
    }

    info!(
        "APPLY: done | removed={} created={} widgets={} warnings={}",
        report.panels_removed,
        report.panels_created,
        report.widgets_added,
        report.warning_count()
    );
    Ok(report)
}

fn teardown<S: ShellHandle + ?Sized>(shell: &mut S, report: &mut ApplyReport) -> Result<(), ApplyError> {
    let live = shell
        .list_panels()
        .map_err(|cause| ApplyError::Unreachable { phase: Phase::TearingDown, cause })?;
    debug!("APPLY: tearing down {} live panels", live.len());

    let mut failures = Vec::new();
    for &panel in &live {
        match shell.remove_panel(panel) {
            Ok(()) => {
                report.panels_removed += 1;
                trace!("APPLY: removed {}", panel);
            }
            Err(e) => {
                let cause = contain(e, Phase::TearingDown)?;
                warn!("APPLY: failed to remove {}: {}", panel, cause);
                failures.push(RemovalFailure { panel, cause });
            }
        }
    }

    if !live.is_empty() && failures.len() == live.len() {
        return Err(ApplyError::TeardownFailed { failures });
    }

    report.removal_failures = failures;
    Ok(())
}

fn fill_panel<S: ShellHandle + ?Sized>(
    shell: &mut S,
    index: usize,
    panel: PanelId,
    spec: &PanelSpec,
    report: &mut ApplyReport,
) -> Result<(), ApplyError> {
    for (name, value) in spec.attributes() {
        if let Err(e) = shell.set_attribute(panel, name, &value) {
            let cause = contain(e, Phase::Building)?;
            warn!("APPLY: panels[{}] attribute {}={} failed: {}", index, name, value, cause);
            report.failures.push(ApplyFailure {
                panel: index,
                target: FailureTarget::Attribute(name),
                cause,
            });
        }
    }

    for (widget_index, widget) in spec.widgets.iter().enumerate() {
        match shell.add_widget(panel, &widget.identifier, &widget.config) {
            Ok(id) => {
                report.widgets_added += 1;
                trace!("APPLY: panels[{}] += {} as {}", index, widget.identifier, id);
            }
            Err(e) => {
                let cause = contain(e, Phase::Building)?;
                warn!("APPLY: panels[{}].widgets[{}] '{}' failed: {}", index, widget_index, widget.identifier, cause);
                report.failures.push(ApplyFailure {
                    panel: index,
                    target: FailureTarget::Widget { index: widget_index, identifier: widget.identifier.clone() },
                    cause,
                });
            }
        }
    }

    Ok(())
}
