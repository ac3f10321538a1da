// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! panelform: declarative desktop panel layouts applied to a live shell

// Generic modules (shell-independent)
pub mod pfgc_core;
pub mod pfgl_layout;
pub mod pfgfp_parse;
pub mod pfgfc_config;
pub mod pfgs_shell;
pub mod pfgr_reconcile;
pub mod pfgm_memory;
pub mod pfgg_gate;

// KDE Plasma backend
pub mod pfkp_plasma;
