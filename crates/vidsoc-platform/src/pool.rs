//! Finite pools of global resource identifiers.
//!
//! A pool is an immutable, ordered description of what the board offers.
//! It never allocates by itself; the registries and the clock arbiter in
//! `vidsoc-compose` track occupancy against it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};

/// The kind of scarce resource a pool describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Addressable control/status register slot.
    RegisterSlot,
    /// Interrupt controller line.
    InterruptLine,
    /// Physical clock generator (PLL/DCM site).
    ClockGenerator,
    /// Memory crossbar port.
    CrossbarPort,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::RegisterSlot => "register slot",
            ResourceKind::InterruptLine => "interrupt line",
            ResourceKind::ClockGenerator => "clock generator",
            ResourceKind::CrossbarPort => "crossbar port",
        };
        f.write_str(s)
    }
}

/// An ordered set of unique resource identifiers of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePool<T> {
    kind: ResourceKind,
    ids: Vec<T>,
}

impl<T: PartialEq + fmt::Debug> ResourcePool<T> {
    /// Build a pool, rejecting duplicate identifiers.
    pub fn new(kind: ResourceKind, ids: Vec<T>) -> Result<Self> {
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(PlatformError::Validation {
                    detail: format!("duplicate {kind} identifier {id:?}"),
                });
            }
        }
        Ok(Self { kind, ids })
    }

    /// Resource kind of this pool.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Number of identifiers in the pool.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` belongs to the pool.
    pub fn contains(&self, id: &T) -> bool {
        self.ids.contains(id)
    }

    /// Identifier at position `index` in pool order.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.ids.get(index)
    }

    /// Iterate identifiers in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ids.iter()
    }
}

/// A numeric pool covering `[0, size)`.
///
/// Register slots and interrupt lines are dense numbers, so only the bound
/// is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePool {
    kind: ResourceKind,
    size: u32,
}

impl RangePool {
    pub fn new(kind: ResourceKind, size: u32) -> Self {
        Self { kind, size }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Number of identifiers in the pool.
    pub fn len(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn contains(&self, id: u32) -> bool {
        id < self.size
    }
}
