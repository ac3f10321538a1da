// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Apply gate: at most one apply in flight.
//!
//! The shell's panel list has no transactional isolation, so two concurrent
//! applies would interleave removals and creations. The gate combines a
//! process-wide mutex with a named single-instance lock held across processes.

use std::sync::{Mutex, MutexGuard, TryLockError};

use single_instance::SingleInstance;
use tracing::debug;

pub const DEFAULT_GATE_NAME: &str = "panelform-apply";

lazy_static::lazy_static! {
    static ref APPLY_LOCK: Mutex<()> = Mutex::new(());
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("another apply is already running in this process")]
    BusyInProcess,

    #[error("another apply is already running (lock '{0}' is held)")]
    BusyElsewhere(String),

    #[error("cannot create instance lock '{name}': {detail}")]
    Lock { name: String, detail: String },
}

/// Held for the duration of one apply; releases both locks on drop
pub struct ApplyGuard {
    _instance: SingleInstance,
    _local: MutexGuard<'static, ()>,
}

pub fn acquire(name: &str) -> Result<ApplyGuard, GateError> {
    let local = match APPLY_LOCK.try_lock() {
        Ok(guard) => guard,
        // the mutex guards no data, a panicked holder leaves nothing inconsistent
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return Err(GateError::BusyInProcess),
    };

    let instance = SingleInstance::new(name).map_err(|e| GateError::Lock {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    if !instance.is_single() {
        return Err(GateError::BusyElsewhere(name.to_string()));
    }

    debug!("GATE: acquired '{}'", name);
    Ok(ApplyGuard { _instance: instance, _local: local })
}
