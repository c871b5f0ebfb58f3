//! Expansion of class types over the inheritance hierarchy.
//!
//! `Derived` expands to `Derived|Base|Iface|...`: the class itself plus every
//! ancestor reachable through `extends` and `implements`. Expansion results
//! are memoized per union in an [`ExpansionCache`], which is discarded as a
//! whole whenever the hierarchy's generation counter moves.

use crate::error::TypeError;
use crate::qsn::Qsn;
use crate::recursion::{RecursionGuard, RecursionProfile, RecursionResult};
use crate::types::Type;
use crate::union_type::UnionType;
use dashmap::DashMap;
use phz_common::limits;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Parents and interfaces of one class-like.
pub type Ancestors = SmallVec<[Qsn; 4]>;

/// Hierarchy lookups needed to expand class types.
pub trait TypeDatabase {
    /// Direct parent plus directly implemented/extended interfaces of
    /// `class`, or `None` when the class is not declared.
    fn direct_ancestors(&self, class: &Qsn) -> Option<Ancestors>;

    fn has_class(&self, class: &Qsn) -> bool {
        self.direct_ancestors(class).is_some()
    }

    /// Bumped on every change that can alter an expansion result.
    fn generation(&self) -> u64;

    fn expansion_cache(&self) -> &ExpansionCache;

    /// Maximum ancestor-chain length followed before giving up.
    fn expansion_depth_limit(&self) -> u32 {
        limits::MAX_TYPE_EXPANSION_DEPTH
    }
}

/// Hit/miss counters of an [`ExpansionCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpansionCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Generation-tagged memo of `as_expanded_types` results.
#[derive(Debug, Default)]
pub struct ExpansionCache {
    generation: AtomicU64,
    entries: DashMap<UnionType, UnionType, FxBuildHasher>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ExpansionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, dropping every entry first if `generation` differs from
    /// the one the entries were computed under.
    pub fn get(&self, generation: u64, key: &UnionType) -> Option<UnionType> {
        self.sync_generation(generation);
        match self.entries.get(key) {
            Some(hit) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(hit.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, generation: u64, key: UnionType, value: UnionType) {
        self.sync_generation(generation);
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> ExpansionCacheStats {
        ExpansionCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    fn sync_generation(&self, generation: u64) {
        let previous = self.generation.swap(generation, Ordering::AcqRel);
        if previous != generation {
            self.entries.clear();
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            trace!(previous, generation, "expansion cache invalidated");
        }
    }
}

impl UnionType {
    /// This union plus every ancestor of each class member.
    ///
    /// Fails with [`TypeError::InheritanceCycle`] when a class reaches itself
    /// through its ancestors, and with [`TypeError::RecursionDepthExceeded`]
    /// when the chain is longer than the database's depth limit.
    pub fn as_expanded_types(&self, db: &dyn TypeDatabase) -> Result<UnionType, TypeError> {
        if !self.types().iter().any(Type::needs_expansion) {
            return Ok(self.clone());
        }
        let generation = db.generation();
        let cache = db.expansion_cache();
        if let Some(hit) = cache.get(generation, self) {
            return Ok(hit);
        }

        let mut guard: RecursionGuard<Qsn> = RecursionGuard::with_profile(RecursionProfile::Custom {
            max_depth: db.expansion_depth_limit(),
            max_iterations: limits::MAX_TYPE_EXPANSION_ITERATIONS,
        });
        let mut out = Vec::with_capacity(self.len());
        for ty in self.types() {
            expand_type(ty, db, &mut guard, &mut out)?;
        }
        let expanded = UnionType::from_types(out)
            .with_real_types(self.real_types().iter().cloned())
            .with_possibly_undefined(self.is_possibly_undefined());

        cache.insert(generation, self.clone(), expanded.clone());
        Ok(expanded)
    }
}

fn expand_type(
    ty: &Type,
    db: &dyn TypeDatabase,
    guard: &mut RecursionGuard<Qsn>,
    out: &mut Vec<Type>,
) -> Result<(), TypeError> {
    match ty {
        Type::Class(class) => expand_class(class, db, guard, out),
        Type::GenericArray { key, element } => {
            let mut elements = Vec::with_capacity(element.len());
            for member in element.types() {
                expand_type(member, db, guard, &mut elements)?;
            }
            out.push(Type::GenericArray {
                key: *key,
                element: UnionType::from_types(elements),
            });
            Ok(())
        }
        other => {
            out.push(other.clone());
            Ok(())
        }
    }
}

fn expand_class(
    class: &Qsn,
    db: &dyn TypeDatabase,
    guard: &mut RecursionGuard<Qsn>,
    out: &mut Vec<Type>,
) -> Result<(), TypeError> {
    let key = class.canonical();
    match guard.enter(key.clone()) {
        RecursionResult::Entered => {
            out.push(Type::Class(class.clone()));
            let result = expand_ancestors(&key, db, guard, out);
            guard.leave(&key);
            result
        }
        RecursionResult::Cycle => {
            debug!(class = %class, "inheritance cycle during type expansion");
            Err(TypeError::InheritanceCycle {
                class: class.clone(),
            })
        }
        RecursionResult::DepthExceeded | RecursionResult::IterationExceeded => {
            debug!(class = %class, limit = guard.max_depth(), "type expansion limit exceeded");
            Err(TypeError::RecursionDepthExceeded {
                class: class.clone(),
                limit: guard.max_depth(),
            })
        }
    }
}

fn expand_ancestors(
    class: &Qsn,
    db: &dyn TypeDatabase,
    guard: &mut RecursionGuard<Qsn>,
    out: &mut Vec<Type>,
) -> Result<(), TypeError> {
    let Some(ancestors) = db.direct_ancestors(class) else {
        return Ok(());
    };
    for ancestor in &ancestors {
        expand_class(ancestor, db, guard, out)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/expand_tests.rs"]
mod tests;
