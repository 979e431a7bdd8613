//! Consistency checks over per-thread and process-wide checker state.
use rustc_hash::FxHashMap;

use crate::{
    interner::GlobalBlockRef,
    interval::{Interval, IntervalTree, NodeId},
    invariant::Invariant,
    thread::{ThreadId, ThreadState},
    Addr,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanityViolation {
    #[error("{tid}: stack intervals {first} and {second} overlap")]
    OverlappingStackIntervals {
        tid: ThreadId,
        first: Interval,
        second: Interval,
    },

    #[error("global intervals {first} and {second} overlap")]
    OverlappingGlobalIntervals { first: Interval, second: Interval },

    #[error("{tid}: stack interval {interval} is listed by {listed} activations")]
    StackIntervalListing {
        tid: ThreadId,
        interval: Interval,
        listed: usize,
    },

    #[error("{tid}: stack interval {interval} registered at depth {registered} is listed at depth {listed}")]
    StackIntervalDepth {
        tid: ThreadId,
        interval: Interval,
        registered: u32,
        listed: u32,
    },

    #[error("{tid}: activation at depth {depth} lists {addr:#x}, which isn't in the stack tree")]
    ListedBlockMissing { tid: ThreadId, depth: u32, addr: Addr },

    #[error("{tid}: bottom activation is not the sentinel")]
    MissingSentinel { tid: ThreadId },

    #[error("{tid}: instruction {ip:#x} at depth {depth} can't be found by its address")]
    UnreachableInstance { tid: ThreadId, depth: u32, ip: Addr },

    #[error("{tid}: instruction {ip:#x} refers to removed global {node}")]
    StaleGlobalInvariant { tid: ThreadId, ip: Addr, node: NodeId },
}

pub fn check_globals(globals: &IntervalTree<GlobalBlockRef>) -> Vec<SanityViolation> {
    let mut violations = Vec::new();
    let mut prev: Option<Interval> = None;
    for entry in globals.iter() {
        if let Some(first) = prev.filter(|p| p.overlaps(&entry.interval)) {
            violations.push(SanityViolation::OverlappingGlobalIntervals {
                first,
                second: entry.interval,
            });
        }
        prev = Some(entry.interval);
    }
    violations
}

pub fn check_thread(tid: ThreadId, thread: &ThreadState) -> Vec<SanityViolation> {
    let mut violations = Vec::new();

    match thread.stack.get(0) {
        Some(bottom) if bottom.is_sentinel() => {}
        _ => violations.push(SanityViolation::MissingSentinel { tid }),
    }

    // Which activations list each registered address.
    let mut listings: FxHashMap<Addr, Vec<u32>> = FxHashMap::default();
    for (depth, activation) in thread.stack.iter().enumerate() {
        let depth = depth as u32;
        for &addr in &activation.blocks_added_by_call {
            listings.entry(addr).or_default().push(depth);
            let registered = thread
                .tree
                .find_covering(addr)
                .is_some_and(|e| e.interval.addr() == addr);
            if !registered {
                violations.push(SanityViolation::ListedBlockMissing { tid, depth, addr });
            }
        }

        for inst in activation.instances.iter() {
            let reachable = activation
                .instances
                .find(inst.ip)
                .is_some_and(|found| std::ptr::eq(found, inst));
            if inst.ip == 0 || !reachable {
                violations.push(SanityViolation::UnreachableInstance {
                    tid,
                    depth,
                    ip: inst.ip,
                });
            }
        }
    }

    let mut prev: Option<Interval> = None;
    for entry in thread.tree.iter() {
        let interval = entry.interval;
        if let Some(first) = prev.filter(|p| p.overlaps(&interval)) {
            violations.push(SanityViolation::OverlappingStackIntervals {
                tid,
                first,
                second: interval,
            });
        }
        prev = Some(interval);

        let listed = listings.get(&interval.addr()).map_or(&[][..], Vec::as_slice);
        if listed.len() != 1 {
            violations.push(SanityViolation::StackIntervalListing {
                tid,
                interval,
                listed: listed.len(),
            });
        } else if listed[0] != entry.value.depth {
            violations.push(SanityViolation::StackIntervalDepth {
                tid,
                interval,
                registered: entry.value.depth,
                listed: listed[0],
            });
        }
    }

    violations
}

/// Every global invariant of the thread must name a node still in `globals`.
pub fn check_global_invariants(
    tid: ThreadId,
    thread: &ThreadState,
    globals: &IntervalTree<GlobalBlockRef>,
) -> Vec<SanityViolation> {
    let live: Vec<NodeId> = globals.iter().map(|e| e.id).collect();
    thread
        .stack
        .iter()
        .flat_map(|activation| activation.instances.iter())
        .filter_map(|inst| match inst.invariant {
            Invariant::Global { node, .. } if !live.contains(&node) => {
                Some(SanityViolation::StaleGlobalInvariant {
                    tid,
                    ip: inst.ip,
                    node,
                })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interner::{StackBlockRef, StackVecRef},
        shadow_stack::Activation,
        thread::StackInterval,
    };
    use cranelift_entity::EntityRef;

    fn value(depth: u32) -> StackInterval {
        StackInterval {
            block: StackBlockRef::new(StackVecRef::new(0), 0),
            depth,
        }
    }

    #[test]
    fn fresh_thread_is_sane() {
        let thread = ThreadState::new(16);
        assert!(check_thread(ThreadId::new(0), &thread).is_empty());
    }

    #[test]
    fn unlisted_interval() {
        let mut thread = ThreadState::new(16);
        thread
            .tree
            .insert(Interval::try_new(0x9000, 16).unwrap(), value(1))
            .unwrap();
        let violations = check_thread(ThreadId::new(0), &thread);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            SanityViolation::StackIntervalListing { listed: 0, .. }
        ));
    }

    #[test]
    fn listed_but_missing() {
        let mut thread = ThreadState::new(16);
        let mut caller = Activation::new(0x8000, 0);
        caller.blocks_added_by_call.push(0x9000);
        thread.stack.push(caller);
        let violations = check_thread(ThreadId::new(2), &thread);
        assert_eq!(
            violations,
            vec![SanityViolation::ListedBlockMissing {
                tid: ThreadId::new(2),
                depth: 1,
                addr: 0x9000
            }]
        );
        assert_eq!(
            violations[0].to_string(),
            "thread2: activation at depth 1 lists 0x9000, which isn't in the stack tree"
        );
    }

    #[test]
    fn depth_mismatch() {
        let mut thread = ThreadState::new(16);
        let mut caller = Activation::new(0x8000, 0);
        caller.blocks_added_by_call.push(0x9000);
        thread.stack.push(caller);
        thread
            .tree
            .insert(Interval::try_new(0x9000, 16).unwrap(), value(3))
            .unwrap();
        let violations = check_thread(ThreadId::new(0), &thread);
        assert!(matches!(
            violations[..],
            [SanityViolation::StackIntervalDepth {
                registered: 3,
                listed: 1,
                ..
            }]
        ));
    }
}
