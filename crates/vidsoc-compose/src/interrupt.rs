//! Interrupt registry: caller-chosen lines, collision checked.
//!
//! Interrupt wiring is fixed by physical routing, so lines are never
//! auto-assigned here. Any line claimed by two different names is fatal,
//! whichever side (base map or pipeline) asserted it first.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vidsoc_platform::{RangePool, ResourceKind};

use crate::error::{ComposeError, Result};

/// Working name → line map.
#[derive(Debug, Clone)]
pub struct InterruptRegistry {
    pool: RangePool,
    entries: IndexMap<String, u32>,
}

impl InterruptRegistry {
    pub fn new(pool: RangePool) -> Self {
        Self {
            pool,
            entries: IndexMap::new(),
        }
    }

    /// Assign `line` to `name`.
    pub fn assign(&mut self, name: &str, line: u32) -> Result<()> {
        self.check(name, line)?;
        if self.entries.insert(name.to_string(), line).is_none() {
            debug!(peripheral = name, line, "assigned interrupt line");
        }
        Ok(())
    }

    /// Overlay a base map. Fails without modifying anything if any entry
    /// collides with the working map or with another base entry.
    pub fn merge(&mut self, base: &IndexMap<String, u32>) -> Result<()> {
        let mut staged = self.clone();
        for (name, &line) in base {
            staged.assign(name, line)?;
        }
        *self = staged;
        Ok(())
    }

    fn check(&self, name: &str, line: u32) -> Result<()> {
        if !self.pool.contains(line) {
            return Err(ComposeError::exhausted(
                ResourceKind::InterruptLine,
                format!(
                    "'{name}' requests line {line}, controller has {} lines",
                    self.pool.len()
                ),
            ));
        }
        if let Some((holder, _)) = self.entries.iter().find(|(_, l)| **l == line) {
            if holder != name {
                return Err(ComposeError::InterruptConflict {
                    line,
                    holder: holder.clone(),
                    requested: name.to_string(),
                });
            }
        }
        if let Some(&existing) = self.entries.get(name) {
            if existing != line {
                return Err(ComposeError::InterruptReassigned {
                    name: name.to_string(),
                    held: existing,
                    requested: line,
                });
            }
        }
        Ok(())
    }

    /// Immutable snapshot ordered by line.
    pub fn snapshot(&self) -> InterruptMap {
        let mut entries = self.entries.clone();
        entries.sort_by(|_, a, _, b| a.cmp(b));
        InterruptMap { entries }
    }
}

/// Final name → interrupt line map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterruptMap {
    entries: IndexMap<String, u32>,
}

impl InterruptMap {
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in line order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), *l))
    }
}
