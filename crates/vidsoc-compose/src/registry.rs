//! Peripheral registry: assigns each named peripheral a unique CSR slot.
//!
//! Base-map entries occupy the lowest slots. Declared peripherals follow
//! from `max(base slot) + 1`, contiguously and strictly in call order, so
//! identical declaration order always reproduces identical addressing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vidsoc_platform::{CsrSpace, RangePool, ResourceKind};

use crate::error::{ComposeError, Result};

/// Where a registered peripheral came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Inherited from the base system map.
    Base,
    /// Declared by the system image, with its declaration index.
    Declared(usize),
}

/// A peripheral owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    /// Unique peripheral name, as written to `csr.csv`.
    pub name: String,
    /// CSR slot index; the bus address is derived from the platform's CSR space.
    pub slot: u32,
    /// Base map entry or declared peripheral.
    pub origin: Origin,
}

/// Accumulates peripherals and hands out CSR slots.
#[derive(Debug, Clone)]
pub struct PeripheralRegistry {
    pool: RangePool,
    entries: IndexMap<String, Peripheral>,
    next_slot: u32,
    declared: usize,
}

impl PeripheralRegistry {
    /// Create a registry seeded with a base map.
    pub fn with_base(pool: RangePool, base: &IndexMap<String, u32>) -> Result<Self> {
        let mut entries: IndexMap<String, Peripheral> = IndexMap::new();
        for (name, &slot) in base {
            if !pool.contains(slot) {
                return Err(ComposeError::InvalidBaseMap {
                    detail: format!(
                        "'{name}' uses slot {slot}, outside [0, {})",
                        pool.len()
                    ),
                });
            }
            if let Some(other) = entries.values().find(|p| p.slot == slot) {
                return Err(ComposeError::InvalidBaseMap {
                    detail: format!("'{name}' and '{}' share slot {slot}", other.name),
                });
            }
            entries.insert(
                name.clone(),
                Peripheral {
                    name: name.clone(),
                    slot,
                    origin: Origin::Base,
                },
            );
        }
        let next_slot = base.values().max().map_or(0, |max| max + 1);
        Ok(Self {
            pool,
            entries,
            next_slot,
            declared: 0,
        })
    }

    /// Create a registry with no base map.
    pub fn new(pool: RangePool) -> Self {
        Self {
            pool,
            entries: IndexMap::new(),
            next_slot: 0,
            declared: 0,
        }
    }

    /// Register a peripheral and return its slot.
    pub fn register(&mut self, name: &str) -> Result<u32> {
        let slots = self.register_all(&[name])?;
        Ok(slots[0])
    }

    /// Register a group of peripherals atomically: either every name gets a
    /// slot or the registry is left unchanged.
    pub fn register_all(&mut self, names: &[&str]) -> Result<Vec<u32>> {
        for (i, name) in names.iter().enumerate() {
            if self.entries.contains_key(*name) || names[..i].contains(name) {
                return Err(ComposeError::DuplicateName {
                    name: (*name).to_string(),
                });
            }
        }
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let needed = u32::try_from(names.len()).ok();
        let last = needed.and_then(|n| self.next_slot.checked_add(n));
        if !last.is_some_and(|end| self.pool.contains(end - 1)) {
            return Err(ComposeError::exhausted(
                ResourceKind::RegisterSlot,
                format!(
                    "{} more peripheral(s) from slot {}, pool has {}",
                    names.len(),
                    self.next_slot,
                    self.pool.len()
                ),
            ));
        }

        let mut slots = Vec::with_capacity(names.len());
        for name in names {
            let slot = self.next_slot;
            self.entries.insert(
                (*name).to_string(),
                Peripheral {
                    name: (*name).to_string(),
                    slot,
                    origin: Origin::Declared(self.declared),
                },
            );
            debug!(peripheral = *name, slot, "assigned CSR slot");
            self.next_slot += 1;
            self.declared += 1;
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Look up a registered peripheral.
    pub fn get(&self, name: &str) -> Option<&Peripheral> {
        self.entries.get(name)
    }

    /// Number of registered peripherals, base entries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Immutable snapshot ordered by slot.
    pub fn snapshot(&self) -> RegisterMap {
        let mut entries: IndexMap<String, u32> = self
            .entries
            .values()
            .map(|p| (p.name.clone(), p.slot))
            .collect();
        entries.sort_by(|_, a, _, b| a.cmp(b));
        RegisterMap { entries }
    }
}

/// Final name → CSR slot map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterMap {
    entries: IndexMap<String, u32>,
}

impl RegisterMap {
    /// Slot of a peripheral.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), *s))
    }

    /// (name, bus address) pairs in slot order. Slots past the end of the
    /// address space have no address and are left out.
    pub fn address_table(&self, csr: &CsrSpace) -> Vec<(String, u64)> {
        self.iter()
            .filter_map(|(name, slot)| Some((name.to_string(), csr.slot_address(slot)?)))
            .collect()
    }
}
