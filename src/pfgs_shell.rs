// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Panel management surface of a live desktop shell.
//!
//! Every call is a synchronous request/response. Implementations own the live
//! panel objects; callers only see ids, valid until the shell removes the panel.

use crate::pfgc_core::{PanelId, Scalar, WidgetConfig, WidgetId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShellError {
    #[error("shell unreachable: {0}")]
    Unreachable(String),

    #[error("no such panel: {0}")]
    UnknownPanel(PanelId),

    #[error("widget '{0}' is not known to the shell")]
    UnknownWidget(String),

    #[error("attribute {name}={value} rejected")]
    InvalidAttribute { name: String, value: String },

    #[error("{operation} failed: {detail}")]
    Rejected { operation: &'static str, detail: String },
}

impl ShellError {
    /// True when the shell itself can no longer be talked to, as opposed to a
    /// single operation being refused.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ShellError::Unreachable(_))
    }
}

pub trait ShellHandle {
    fn list_panels(&mut self) -> Result<Vec<PanelId>, ShellError>;

    fn remove_panel(&mut self, panel: PanelId) -> Result<(), ShellError>;

    fn create_panel(&mut self) -> Result<PanelId, ShellError>;

    fn set_attribute(&mut self, panel: PanelId, name: &str, value: &Scalar) -> Result<(), ShellError>;

    fn add_widget(&mut self, panel: PanelId, identifier: &str, config: &WidgetConfig) -> Result<WidgetId, ShellError>;
}
