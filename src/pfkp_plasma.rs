// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! KDE Plasma shell backend
//!
//! Each ShellHandle call becomes one short desktop script evaluated by plasmashell
//! through the `org.kde.PlasmaShell.evaluateScript` D-Bus method. Scripts report
//! results with `print()` and signal failures by throwing an Error whose message
//! carries a `panelform:` marker, which comes back as a D-Bus error reply.

use std::fmt::Write as _;
use std::process::Command;

use tracing::{debug, trace};

use crate::pfgc_core::{
    Alignment, HidingMode, LengthMode, Location, PanelId, Scalar, WidgetConfig, WidgetId,
    ATTR_ALIGNMENT, ATTR_FLOATING, ATTR_HEIGHT, ATTR_HIDING_MODE, ATTR_LENGTH_MODE, ATTR_LOCATION,
};
use crate::pfgs_shell::{ShellError, ShellHandle};

pub const DEFAULT_QDBUS: &str = "qdbus6";

const PLASMA_SERVICE: &str = "org.kde.plasmashell";
const PLASMA_OBJECT: &str = "/PlasmaShell";
const PLASMA_EVALUATE: &str = "org.kde.PlasmaShell.evaluateScript";

const MARK_UNKNOWN_PANEL: &str = "panelform:unknown-panel";
const MARK_UNKNOWN_WIDGET: &str = "panelform:unknown-widget";

/// Config group used for widget config keys without a `Group/` prefix
const DEFAULT_CONFIG_GROUP: &str = "General";

// D-Bus / qdbus messages meaning plasmashell is not there at all
const UNREACHABLE_MARKERS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NoReply",
    "does not exist",
    "Could not connect to D-Bus",
    "not provided by any .service files",
];

// ============================================================================
// SECTION 1: Script execution
// ============================================================================

/// Evaluates one Plasma desktop script and returns its printed output
pub trait ScriptRunner {
    fn run(&mut self, script: &str) -> Result<String, ShellError>;
}

/// Runs scripts through the qdbus command line tool
pub struct QdbusRunner {
    program: String,
}

impl QdbusRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl ScriptRunner for QdbusRunner {
    fn run(&mut self, script: &str) -> Result<String, ShellError> {
        trace!("PLASMA: evaluating script:\n{}", script);

        let output = Command::new(&self.program)
            .arg(PLASMA_SERVICE)
            .arg(PLASMA_OBJECT)
            .arg(PLASMA_EVALUATE)
            .arg(script)
            .output()
            .map_err(|e| ShellError::Unreachable(format!("cannot run {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if detail.is_empty() {
                // qdbus prints some errors on stdout
                detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            debug!("PLASMA: {} exited with {}: {}", self.program, output.status, detail);
            Err(classify_failure(detail))
        }
    }
}

fn classify_failure(detail: String) -> ShellError {
    if UNREACHABLE_MARKERS.iter().any(|m| detail.contains(m)) {
        ShellError::Unreachable(detail)
    } else {
        ShellError::Rejected { operation: "evaluateScript", detail }
    }
}

// ============================================================================
// SECTION 2: Script building helpers
// ============================================================================

/// Quote a string as a JavaScript string literal
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn js_literal(value: &Scalar) -> String {
    match value {
        Scalar::Text(s) => js_string(s),
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(x) if x.is_nan() => "NaN".to_string(),
        Scalar::Float(x) if x.is_infinite() => {
            if *x > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
        }
        Scalar::Float(x) => x.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }
}

/// Looks the panel up as `p`, throwing the unknown-panel marker when it is gone
fn panel_prelude(panel: PanelId) -> String {
    format!(
        "var p = panelById({});\nif (!p) {{ throw new Error({}); }}\n",
        panel.0,
        js_string(MARK_UNKNOWN_PANEL)
    )
}

/// Map a layout attribute onto the Plasma panel property and its value
fn plasma_property(name: &str, value: &Scalar) -> Option<(&'static str, Scalar)> {
    let text = |s: &str| Scalar::Text(s.to_string());
    match (name, value) {
        (ATTR_LOCATION, Scalar::Text(s)) => Location::parse(s).map(|l| ("location", text(l.as_str()))),
        (ATTR_HEIGHT, Scalar::Int(h)) if *h > 0 => Some(("height", Scalar::Int(*h))),
        (ATTR_HIDING_MODE, Scalar::Text(s)) => HidingMode::parse(s).map(|m| {
            let hiding = match m {
                HidingMode::AlwaysVisible => "none",
                HidingMode::AutoHide => "autohide",
                HidingMode::WindowsCanCover => "windowscover",
                HidingMode::WindowsGoBelow => "windowsbelow",
            };
            ("hiding", text(hiding))
        }),
        (ATTR_FLOATING, Scalar::Bool(b)) => Some(("floating", Scalar::Bool(*b))),
        (ATTR_ALIGNMENT, Scalar::Text(s)) => Alignment::parse(s).map(|a| {
            // with fill length the alignment has no visible effect, "left" is Plasma's default
            let align = match a {
                Alignment::Start | Alignment::Stretch => "left",
                Alignment::Center => "center",
                Alignment::End => "right",
            };
            ("alignment", text(align))
        }),
        (ATTR_LENGTH_MODE, Scalar::Text(s)) => LengthMode::parse(s).map(|m| ("lengthMode", text(m.as_str()))),
        _ => None,
    }
}

/// Split `Group/Sub/key` into its config group path and key
fn split_config_key(key: &str) -> (Vec<&str>, &str) {
    match key.rsplit_once('/') {
        Some((groups, leaf)) => (groups.split('/').filter(|g| !g.is_empty()).collect(), leaf),
        None => (vec![DEFAULT_CONFIG_GROUP], key),
    }
}

fn parse_id(output: &str, operation: &'static str) -> Result<u32, ShellError> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .and_then(|l| l.parse::<u32>().ok())
        .ok_or_else(|| ShellError::Rejected {
            operation,
            detail: format!("unexpected script output: {:?}", output.trim()),
        })
}

// ============================================================================
// SECTION 3: ShellHandle over plasmashell
// ============================================================================

pub struct PlasmaShell<R: ScriptRunner> {
    runner: R,
}

impl PlasmaShell<QdbusRunner> {
    /// Talk to the session's plasmashell through the given qdbus binary
    pub fn connect(qdbus_program: &str) -> Self {
        Self::new(QdbusRunner::new(qdbus_program))
    }
}

impl<R: ScriptRunner> PlasmaShell<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn run(&mut self, operation: &'static str, script: &str) -> Result<String, ShellError> {
        self.runner.run(script).map_err(|e| match e {
            ShellError::Rejected { detail, .. } => ShellError::Rejected { operation, detail },
            other => other,
        })
    }
}

fn rejected_with(err: &ShellError, marker: &str) -> bool {
    matches!(err, ShellError::Rejected { detail, .. } if detail.contains(marker))
}

impl<R: ScriptRunner> ShellHandle for PlasmaShell<R> {
    fn list_panels(&mut self) -> Result<Vec<PanelId>, ShellError> {
        let script = "var ids = [];\n\
                      var all = panels();\n\
                      for (var i = 0; i < all.length; i++) { ids.push(all[i].id); }\n\
                      print(ids.join(\"\\n\"));\n";
        let output = self.run("list", script)?;

        output
            .split_whitespace()
            .map(|tok| {
                tok.parse::<u32>().map(PanelId).map_err(|_| ShellError::Rejected {
                    operation: "list",
                    detail: format!("unexpected panel id {:?}", tok),
                })
            })
            .collect()
    }

    fn remove_panel(&mut self, panel: PanelId) -> Result<(), ShellError> {
        let script = format!("{}p.remove();\n", panel_prelude(panel));
        self.run("remove", &script).map_err(|e| {
            if rejected_with(&e, MARK_UNKNOWN_PANEL) { ShellError::UnknownPanel(panel) } else { e }
        })?;
        Ok(())
    }

    fn create_panel(&mut self) -> Result<PanelId, ShellError> {
        let output = self.run("create", "var p = new Panel();\nprint(p.id);\n")?;
        parse_id(&output, "create").map(PanelId)
    }

    fn set_attribute(&mut self, panel: PanelId, name: &str, value: &Scalar) -> Result<(), ShellError> {
        let (property, mapped) = plasma_property(name, value)
            .ok_or_else(|| ShellError::InvalidAttribute { name: name.to_string(), value: value.to_string() })?;

        let script = format!("{}p.{} = {};\n", panel_prelude(panel), property, js_literal(&mapped));
        self.run("set attribute", &script).map_err(|e| {
            if rejected_with(&e, MARK_UNKNOWN_PANEL) { ShellError::UnknownPanel(panel) } else { e }
        })?;
        Ok(())
    }

    /// Everything after the add runs inside one script, so a failed config write
    /// removes the widget before the error comes back. A reply that is not a
    /// widget id is still reported as an error, but the widget stays on the panel.
    fn add_widget(&mut self, panel: PanelId, identifier: &str, config: &WidgetConfig) -> Result<WidgetId, ShellError> {
        let mut script = panel_prelude(panel);
        let _ = writeln!(script, "var w = p.addWidget({});", js_string(identifier));
        let _ = writeln!(script, "if (!w) {{ throw new Error({}); }}", js_string(MARK_UNKNOWN_WIDGET));

        // a widget whose config cannot be written is taken off the panel again
        script.push_str("try {\n");
        for (key, value) in config {
            let (groups, leaf) = split_config_key(key);
            let groups: Vec<String> = groups.iter().map(|g| js_string(g)).collect();
            let _ = writeln!(script, "    w.currentConfigGroup = [{}];", groups.join(", "));
            let _ = writeln!(script, "    w.writeConfig({}, {});", js_string(leaf), js_literal(value));
        }
        if !config.is_empty() {
            script.push_str("    w.reloadConfig();\n");
        }
        script.push_str("    print(w.id);\n");
        script.push_str("} catch (e) {\n    w.remove();\n    throw e;\n}\n");

        let output = self.run("add widget", &script).map_err(|e| {
            if rejected_with(&e, MARK_UNKNOWN_PANEL) {
                ShellError::UnknownPanel(panel)
            } else if rejected_with(&e, MARK_UNKNOWN_WIDGET) {
                ShellError::UnknownWidget(identifier.to_string())
            } else {
                e
            }
        })?;
        parse_id(&output, "add widget").map(WidgetId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records scripts and answers from a queue (empty output when the queue runs dry)
    #[derive(Default)]
    struct ScriptedRunner {
        scripts: Vec<String>,
        replies: VecDeque<Result<String, ShellError>>,
    }

    impl ScriptedRunner {
        fn replying(replies: Vec<Result<String, ShellError>>) -> Self {
            Self { scripts: Vec::new(), replies: replies.into() }
        }
    }

    impl ScriptRunner for ScriptedRunner {
        fn run(&mut self, script: &str) -> Result<String, ShellError> {
            self.scripts.push(script.to_string());
            self.replies.pop_front().unwrap_or(Ok(String::new()))
        }
    }

    fn rejected(detail: &str) -> ShellError {
        ShellError::Rejected { operation: "evaluateScript", detail: detail.to_string() }
    }

    #[test]
    fn test_list_parses_ids() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Ok("1\n7\n".to_string())]));
        assert_eq!(shell.list_panels().unwrap(), vec![PanelId(1), PanelId(7)]);
        assert!(shell.runner.scripts[0].contains("panels()"));
    }

    #[test]
    fn test_list_rejects_garbage() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Ok("1\nundefined\n".to_string())]));
        assert!(matches!(shell.list_panels(), Err(ShellError::Rejected { operation: "list", .. })));
    }

    #[test]
    fn test_create_returns_new_id() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Ok("42\n".to_string())]));
        assert_eq!(shell.create_panel().unwrap(), PanelId(42));
        assert!(shell.runner.scripts[0].contains("new Panel()"));
    }

    #[test]
    fn test_remove_maps_missing_panel() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Err(rejected(
            "Error: org.freedesktop.DBus.Error.Failed\nError: panelform:unknown-panel",
        ))]));
        assert_eq!(shell.remove_panel(PanelId(3)), Err(ShellError::UnknownPanel(PanelId(3))));
        assert!(shell.runner.scripts[0].contains("panelById(3)"));
        assert!(shell.runner.scripts[0].contains("p.remove();"));
    }

    #[test]
    fn test_attribute_translation() {
        let mut shell = PlasmaShell::new(ScriptedRunner::default());
        let id = PanelId(5);
        shell.set_attribute(id, "hidingMode", &Scalar::Text("auto-hide".into())).unwrap();
        shell.set_attribute(id, "alignment", &Scalar::Text("stretch".into())).unwrap();
        shell.set_attribute(id, "alignment", &Scalar::Text("end".into())).unwrap();
        shell.set_attribute(id, "height", &Scalar::Int(48)).unwrap();
        shell.set_attribute(id, "floating", &Scalar::Bool(true)).unwrap();

        let scripts = &shell.runner.scripts;
        assert!(scripts[0].ends_with("p.hiding = \"autohide\";\n"));
        assert!(scripts[1].ends_with("p.alignment = \"left\";\n"));
        assert!(scripts[2].ends_with("p.alignment = \"right\";\n"));
        assert!(scripts[3].ends_with("p.height = 48;\n"));
        assert!(scripts[4].ends_with("p.floating = true;\n"));
    }

    #[test]
    fn test_invalid_attribute_skips_script() {
        let mut shell = PlasmaShell::new(ScriptedRunner::default());
        let err = shell.set_attribute(PanelId(1), "location", &Scalar::Text("diagonal".into())).unwrap_err();
        assert!(matches!(err, ShellError::InvalidAttribute { .. }));
        assert!(shell.runner.scripts.is_empty());
    }

    #[test]
    fn test_add_widget_script() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Ok("12\n".to_string())]));
        let mut config = WidgetConfig::new();
        config.insert("showDate".to_string(), Scalar::Bool(false));
        config.insert("Appearance/dateFormat".to_string(), Scalar::Text("iso\"Date".to_string()));

        let id = shell.add_widget(PanelId(2), "org.kde.plasma.digitalclock", &config).unwrap();
        assert_eq!(id, WidgetId(12));

        let script = &shell.runner.scripts[0];
        assert!(script.contains("p.addWidget(\"org.kde.plasma.digitalclock\")"));
        assert!(script.contains("w.currentConfigGroup = [\"Appearance\"];\n    w.writeConfig(\"dateFormat\", \"iso\\\"Date\");"));
        assert!(script.contains("w.currentConfigGroup = [\"General\"];\n    w.writeConfig(\"showDate\", false);"));
        assert!(script.contains("w.reloadConfig();"));
    }

    #[test]
    fn test_add_widget_removes_on_config_failure() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Err(rejected("Error: TypeError: writeConfig"))]));
        let mut config = WidgetConfig::new();
        config.insert("showDate".to_string(), Scalar::Bool(false));

        let err = shell.add_widget(PanelId(2), "org.kde.plasma.digitalclock", &config).unwrap_err();
        assert!(matches!(err, ShellError::Rejected { operation: "add widget", .. }));

        let script = &shell.runner.scripts[0];
        let guarded = script.find("try {").unwrap();
        let write = script.find("w.writeConfig(").unwrap();
        let cleanup = script.find("} catch (e) {\n    w.remove();\n    throw e;\n}").unwrap();
        assert!(guarded < write && write < cleanup);
        assert!(script.find("p.addWidget(").unwrap() < guarded);
    }

    #[test]
    fn test_add_widget_maps_unknown_widget() {
        let mut shell = PlasmaShell::new(ScriptedRunner::replying(vec![Err(rejected("Error: panelform:unknown-widget"))]));
        let err = shell.add_widget(PanelId(2), "org.example.missing", &WidgetConfig::new()).unwrap_err();
        assert_eq!(err, ShellError::UnknownWidget("org.example.missing".to_string()));
    }

    #[test]
    fn test_failure_classification() {
        assert!(classify_failure("Service 'org.kde.plasmashell' does not exist.".to_string()).is_unreachable());
        assert!(classify_failure("Error: org.freedesktop.DBus.Error.ServiceUnknown".to_string()).is_unreachable());
        assert!(!classify_failure("Error: TypeError: p.bogus is not a function".to_string()).is_unreachable());
    }

    #[test]
    fn test_missing_qdbus_is_unreachable() {
        let mut runner = QdbusRunner::new("/nonexistent/panelform-qdbus");
        assert!(runner.run("print(1);").unwrap_err().is_unreachable());
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("plain"), "\"plain\"");
        assert_eq!(js_string("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(js_string("\u{1}"), "\"\\u0001\"");
    }

    #[test]
    fn test_split_config_key() {
        assert_eq!(split_config_key("showDate"), (vec!["General"], "showDate"));
        assert_eq!(split_config_key("Appearance/font"), (vec!["Appearance"], "font"));
        assert_eq!(split_config_key("A/B/key"), (vec!["A", "B"], "key"));
    }
}
