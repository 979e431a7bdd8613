use std::fmt;

use crate::invariant::{Invariant, InvariantKind};

/// Counters reported at fini.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub accesses: u64,
    pub classified_stack0: u64,
    pub classified_stackn: u64,
    pub classified_global: u64,
    pub classified_unknown: u64,
    pub upgraded_from_unknown: u64,
    pub mismatches: u64,
    pub activations_pushed: u64,
    pub activations_popped: u64,
    pub stack_intervals_added: u64,
    pub stack_intervals_removed: u64,
    pub global_intervals_added: u64,
    pub global_intervals_removed: u64,
    pub invariants_preened: u64,
    pub invariants_changed: u64,
    pub qcache_queries: u64,
    pub qcache_misses: u64,
}

impl Stats {
    pub(crate) fn count_classification(&mut self, inv: &Invariant) {
        match inv.kind() {
            InvariantKind::Stack0 => self.classified_stack0 += 1,
            InvariantKind::StackN => self.classified_stackn += 1,
            InvariantKind::Global => self.classified_global += 1,
            InvariantKind::Unknown => self.classified_unknown += 1,
            InvariantKind::Unset => {}
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} total accesses, of which:", self.accesses)?;
        writeln!(f, "{:>12}    stack0", self.classified_stack0)?;
        writeln!(f, "{:>12}    stackN", self.classified_stackn)?;
        writeln!(f, "{:>12}    global", self.classified_global)?;
        writeln!(f, "{:>12}    unknown", self.classified_unknown)?;
        writeln!(f, "{:>12} upgrades from unknown", self.upgraded_from_unknown)?;
        writeln!(f, "{:>12} invariant mismatches", self.mismatches)?;
        writeln!(
            f,
            "{:>12} activations pushed, {} popped",
            self.activations_pushed, self.activations_popped
        )?;
        writeln!(
            f,
            "{:>12} stack intervals added, {} removed",
            self.stack_intervals_added, self.stack_intervals_removed
        )?;
        writeln!(
            f,
            "{:>12} global intervals added, {} removed",
            self.global_intervals_added, self.global_intervals_removed
        )?;
        writeln!(
            f,
            "{:>12} invariants preened, {} changed",
            self.invariants_preened, self.invariants_changed
        )?;
        write!(
            f,
            "{:>12} query cache queries, {} misses",
            self.qcache_queries, self.qcache_misses
        )
    }
}
