// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Hardware target allocation.
//!
//! Kernels that run on an accelerator ask for a target *class* ("vpu", "dsp",
//! ...). The [`TargetAllocator`] owned by a graph hands out the configured
//! targets of that class round-robin, so consecutive nodes of one class are
//! spread over the available units. Each graph has its own allocator; there is
//! no process-wide counter.

use std::collections::HashMap;
use std::fmt;

use crate::error::{FrameKitError, Result};

/// One hardware unit assigned to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HwTarget {
    pub class: String,
    pub name: String,
    /// Position of this target within its class.
    pub ordinal: usize,
}

impl fmt::Display for HwTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.name)
    }
}

#[derive(Debug, Clone)]
struct TargetClass {
    targets: Vec<String>,
    next: usize,
}

/// Round-robin allocator over configured hardware targets.
#[derive(Debug, Clone, Default)]
pub struct TargetAllocator {
    classes: HashMap<String, TargetClass>,
}

impl TargetAllocator {
    /// Builds an allocator from `class -> targets`. Empty classes are dropped.
    pub fn new(classes: &HashMap<String, Vec<String>>) -> Self {
        let classes = classes
            .iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(class, targets)| {
                (class.clone(), TargetClass { targets: targets.clone(), next: 0 })
            })
            .collect();
        Self { classes }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Hands out the next target of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if no target of that class is configured.
    pub fn allocate(&mut self, class: &str) -> Result<HwTarget> {
        let entry = self.classes.get_mut(class).ok_or_else(|| {
            FrameKitError::Configuration(format!("no hardware targets configured for class '{class}'"))
        })?;
        let ordinal = entry.next % entry.targets.len();
        entry.next = entry.next.wrapping_add(1);
        Ok(HwTarget { class: class.to_string(), name: entry.targets[ordinal].clone(), ordinal })
    }

    /// Restarts every class at its first target.
    pub fn reset(&mut self) {
        for entry in self.classes.values_mut() {
            entry.next = 0;
        }
    }
}
