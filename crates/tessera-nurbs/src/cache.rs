//! Basis function caching across rebuilds.
//!
//! A [`BasisCache`] holds at most one [`BasisTable`] per (surface, direction)
//! slot. Each slot remembers the exact key it was computed for (knot values,
//! degree, sample parameters, compared bit for bit); a lookup with any other
//! key recomputes and replaces the entry, so memory stays bounded by the
//! number of live surfaces.
//!
//! The cache is `Send + Sync`. Concurrent population of the same slot is
//! benign: both writers compute identical tables and the last write wins.
//!
//! # Example
//! ```
//! use tessera_nurbs::{BasisCache, Direction, SurfaceId};
//!
//! let cache = BasisCache::new();
//! let id = SurfaceId::next();
//! let knots = [0.0, 0.0, 1.0, 1.0];
//! let params = [0.0, 0.5, 1.0];
//! let table = cache.get_or_compute(id, Direction::U, &knots, 2, 1, &params).unwrap();
//! assert_eq!(table.samples.len(), 3);
//! assert_eq!(cache.stats().misses, 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::basis::{evaluate_basis_clamped, BasisSample};
use crate::error::{Direction, Result};

/// Global atomic counter for unique surface ids.
static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a surface owning cache slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Slot {
    surface: SurfaceId,
    direction: Direction,
}

/// Exact inputs a basis table was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasisKey {
    knots: Vec<u64>,
    degree: usize,
    dimension: usize,
    params: Vec<u64>,
}

impl BasisKey {
    /// Build a key from knot values, sizes and sample parameters.
    pub fn new(knots: &[f64], dimension: usize, degree: usize, params: &[f64]) -> Self {
        Self {
            knots: knots.iter().map(|k| k.to_bits()).collect(),
            degree,
            dimension,
            params: params.iter().map(|t| t.to_bits()).collect(),
        }
    }
}

/// Basis spans, values and derivatives for every sample parameter of one
/// direction.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisTable {
    /// One entry per sample parameter, in order.
    pub samples: Vec<BasisSample>,
}

impl BasisTable {
    /// Evaluate the table directly, without a cache. Parameters outside the
    /// knot domain are clamped to it.
    pub fn compute(knots: &[f64], dimension: usize, degree: usize, params: &[f64]) -> Result<Self> {
        let samples = params
            .iter()
            .map(|&t| evaluate_basis_clamped(knots, dimension, degree, t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples })
    }
}

/// Cache statistics for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasisCacheStats {
    /// Number of occupied slots.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that had to compute a table.
    pub misses: usize,
    /// Entries replaced because their key went stale.
    pub evictions: usize,
}

impl BasisCacheStats {
    /// Hit rate between 0.0 and 1.0; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared memo of basis tables keyed by surface and direction.
#[derive(Debug, Default)]
pub struct BasisCache {
    slots: RwLock<HashMap<Slot, (BasisKey, Arc<BasisTable>)>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    evictions: AtomicUsize,
}

impl BasisCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table for `(surface, direction)` if it was computed from
    /// exactly these inputs; otherwise compute it and replace the slot.
    pub fn get_or_compute(
        &self,
        surface: SurfaceId,
        direction: Direction,
        knots: &[f64],
        dimension: usize,
        degree: usize,
        params: &[f64],
    ) -> Result<Arc<BasisTable>> {
        let slot = Slot { surface, direction };
        let key = BasisKey::new(knots, dimension, degree, params);

        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some((cached_key, table)) = slots.get(&slot) {
                if *cached_key == key {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(table));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(BasisTable::compute(knots, dimension, degree, params)?);

        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        if let Some((old_key, _)) = slots.insert(slot, (key.clone(), Arc::clone(&table))) {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "basis cache: replaced stale {} entry of surface {}",
                    direction,
                    surface.get()
                );
            }
        }
        Ok(table)
    }

    /// Drop both slots of a surface.
    pub fn evict_surface(&self, surface: SurfaceId) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for direction in [Direction::U, Direction::V] {
            if slots.remove(&Slot { surface, direction }).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics.
    pub fn stats(&self) -> BasisCacheStats {
        BasisCacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
