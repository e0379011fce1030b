//! Scoped suppression of re-entrant probes.
//!
//! Some derived values (printing a call expression, say) make the host fire
//! probes of their own. While such a value is computed the offending probe is
//! masked; the [`ProbeGuard`] puts the previous mask back when it goes out of
//! scope, on every exit path.

use std::cell::Cell;
use std::rc::Rc;

use bitflags::bitflags;

bitflags! {
    /// Set of probe kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProbeSet: u16 {
        const CLOSURE_ENTRY = 1 << 0;
        const CLOSURE_EXIT = 1 << 1;
        const BUILTIN_ENTRY = 1 << 2;
        const BUILTIN_EXIT = 1 << 3;
        const PROMISE_CREATED = 1 << 4;
        const PROMISE_FORCE_ENTRY = 1 << 5;
        const PROMISE_FORCE_EXIT = 1 << 6;
        const PROMISE_LOOKUP = 1 << 7;
        const PROMISE_EXPRESSION_LOOKUP = 1 << 8;
        const OBJECT_RECLAIMED = 1 << 9;
    }
}

/// Shared handle on the set of currently disabled probes.
///
/// Single-threaded: the host fires probes one at a time on its evaluation
/// thread, so a `Cell` is all the synchronisation needed. Clones share state,
/// which lets the host consult the same mask before firing.
#[derive(Debug, Clone)]
pub struct ProbeMask {
    disabled: Rc<Cell<ProbeSet>>,
}

impl Default for ProbeMask {
    fn default() -> Self {
        Self {
            disabled: Rc::new(Cell::new(ProbeSet::empty())),
        }
    }
}

impl ProbeMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, probe: ProbeSet) -> bool {
        !self.disabled.get().intersects(probe)
    }

    pub fn disabled(&self) -> ProbeSet {
        self.disabled.get()
    }

    /// Disable `probes` until the returned guard is dropped.
    #[must_use = "the probes are re-enabled as soon as the guard is dropped"]
    pub fn suppress(&self, probes: ProbeSet) -> ProbeGuard {
        let previous = self.disabled.get();
        self.disabled.set(previous | probes);
        ProbeGuard {
            disabled: Rc::clone(&self.disabled),
            previous,
        }
    }
}

/// Restores the mask captured by [`ProbeMask::suppress`] on drop.
#[derive(Debug)]
pub struct ProbeGuard {
    disabled: Rc<Cell<ProbeSet>>,
    previous: ProbeSet,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.disabled.set(self.previous);
    }
}
