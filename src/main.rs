// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use panelform::pfgfc_config::{config_path, deploy_default, load_layout, load_standard_layout};
use panelform::pfgfp_parse::to_xml;
use panelform::pfgg_gate::{self, DEFAULT_GATE_NAME};
use panelform::pfgl_layout::LayoutModel;
use panelform::pfgm_memory::MemoryShell;
use panelform::pfgr_reconcile::{apply, ApplyError, ApplyReport};
use panelform::pfkp_plasma::{PlasmaShell, DEFAULT_QDBUS};

#[derive(Parser)]
#[command(name = "panelform", version, about = "Apply a declarative desktop panel layout")]
struct Cli {
    /// Layout file (default: ~/.config/panelform/layout.xml, else the embedded default)
    #[arg(long, global = true)]
    layout: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove every panel and build the layout's panels
    Apply {
        /// Apply against an in-memory shell and print the resulting panels
        #[arg(long)]
        dry_run: bool,

        /// Exit non-zero when any widget, attribute or removal failed
        #[arg(long)]
        strict: bool,

        /// qdbus binary used to reach plasmashell
        #[arg(long, default_value = DEFAULT_QDBUS)]
        qdbus: String,
    },
    /// Check the layout without touching the shell
    Validate,
    /// Print the layout as normalized XML
    Show,
    /// Write the embedded default layout, archiving an existing file
    Init,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(layout: Option<&Path>) -> Result<LayoutModel> {
    let model = match layout {
        Some(path) => load_layout(path)?,
        None => load_standard_layout()?,
    };
    Ok(model)
}

fn print_summary(report: &ApplyReport) {
    println!(
        "applied: {} panels, {} widgets ({} removed, {} widget failures, {} warnings)",
        report.panels_created,
        report.widgets_added,
        report.panels_removed,
        report.widget_failures().count(),
        report.warning_count()
    );
}

/// A panel-creation failure still shows what was built before it
fn settle(outcome: Result<ApplyReport, ApplyError>) -> Result<ApplyReport> {
    outcome.map_err(|e| {
        if let ApplyError::PanelCreation { partial, .. } = &e {
            print_summary(partial);
        }
        e.into()
    })
}

fn run(cli: Cli) -> Result<ExitCode> {
    let layout = cli.layout.as_deref();

    match cli.command {
        Command::Init => {
            let path = cli.layout.clone().unwrap_or_else(config_path);
            if let Some(archived) = deploy_default(&path)? {
                println!("archived {}", archived.display());
            }
            println!("wrote {}", path.display());
        }
        Command::Validate => {
            let model = load(layout)?;
            model.validate().context("layout is invalid")?;
            println!("OK: {} panels, {} widgets", model.panels.len(), model.widget_count());
        }
        Command::Show => {
            let model = load(layout)?;
            print!("{}", to_xml(&model)?);
        }
        Command::Apply { dry_run, strict, qdbus } => {
            let model = load(layout)?;
            model.validate().context("layout is invalid, nothing applied")?;

            let _gate = pfgg_gate::acquire(DEFAULT_GATE_NAME)?;
            info!("APPLY: {} panels, {} widgets{}", model.panels.len(), model.widget_count(),
                  if dry_run { " (dry run)" } else { "" });

            let report = if dry_run {
                let mut shell = MemoryShell::new();
                let outcome = apply(&model, &mut shell);
                print!("{}", shell.render());
                settle(outcome)?
            } else {
                let mut shell = PlasmaShell::connect(&qdbus);
                settle(apply(&model, &mut shell))?
            };

            print_summary(&report);
            if strict && !report.is_clean() {
                error!("APPLY: {} warnings with --strict", report.warning_count());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
