//! The runtime half of the checker: hook handlers driven by instrumented
//! guest code and by the framework's thread and loader events.
use cranelift_entity::EntityRef;
use rustc_hash::{FxHashMap, FxHashSet};
use sgcheck_triple::TargetTriple;
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::{
    config::CheckerConfig,
    descriptor::StackBlock,
    diagnostic::{AccessKind, Diagnostic, ErrorReport},
    env::{GuestEnv, ObjectHandle},
    interner::{DescriptorCache, GlobalBlockRef, StackBlockRef, StackVecRef},
    interval::{Interval, IntervalTree, NodeId},
    invariant::{Access, Classifier, Invariant},
    sanity::{self, SanityViolation},
    shadow_stack::Activation,
    stats::Stats,
    thread::{StackInterval, ThreadId, ThreadState},
    Addr,
};

/// Warnings emitted for overlapping global blocks before going quiet.
const OVERLAP_MOANS: u32 = 3;

pub struct Checker {
    config: CheckerConfig,
    triple: TargetTriple,
    env: Box<dyn GuestEnv>,
    descriptors: DescriptorCache,
    threads: Vec<Option<ThreadState>>,
    globals: IntervalTree<GlobalBlockRef>,
    ip_vectors: FxHashMap<Addr, StackVecRef>,
    report: ErrorReport,
    stats: Stats,
    overlap_moans: u32,
}

impl Checker {
    pub fn new(config: CheckerConfig, triple: TargetTriple, env: Box<dyn GuestEnv>) -> Self {
        let threads = (0..config.max_threads).map(|_| None).collect();
        Self {
            config,
            triple,
            env,
            descriptors: DescriptorCache::new(),
            threads,
            globals: IntervalTree::new(),
            ip_vectors: FxHashMap::default(),
            report: ErrorReport::default(),
            stats: Stats::default(),
            overlap_moans: OVERLAP_MOANS,
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn triple(&self) -> TargetTriple {
        self.triple
    }

    pub fn env(&self) -> &dyn GuestEnv {
        self.env.as_ref()
    }

    pub fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }

    pub fn globals(&self) -> &IntervalTree<GlobalBlockRef> {
        &self.globals
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.report.take()
    }

    pub fn thread(&self, tid: ThreadId) -> Option<&ThreadState> {
        self.threads.get(tid.index())?.as_ref()
    }

    pub fn threads(&self) -> impl Iterator<Item = (ThreadId, &ThreadState)> {
        self.threads
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some((ThreadId::new(i), t.as_ref()?)))
    }

    pub fn intern_stack_vector(&mut self, blocks: Vec<StackBlock>) -> StackVecRef {
        self.descriptors.intern_stack_vector(blocks)
    }

    /// The canonical block vector for the guest instruction at `ip`. The
    /// debug info is consulted once per address.
    pub fn stack_vector_at(&mut self, ip: Addr) -> StackVecRef {
        if let Some(&vector) = self.ip_vectors.get(&ip) {
            return vector;
        }
        let blocks = self.env.stack_blocks_at(ip, self.config.arrays_only);
        let vector = self.descriptors.intern_stack_vector(blocks);
        self.ip_vectors.insert(ip, vector);
        vector
    }

    pub fn on_thread_created(&mut self, parent: Option<ThreadId>, child: ThreadId) {
        assert!(
            child.index() < self.threads.len(),
            "{child} exceeds the {} configured thread slots",
            self.threads.len()
        );
        debug!(?parent, %child, "thread created");
        self.threads[child.index()] = Some(ThreadState::new(self.config.query_cache_size));
    }

    /// Pushes the bootstrap activation of `tid` at its initial SP.
    pub fn on_thread_first_insn(&mut self, tid: ThreadId, sp: Addr) {
        let thread = thread_mut(&mut self.threads, tid);
        thread.stack.push(Activation::new(sp, 0));
        self.stats.activations_pushed += 1;
        trace!(%tid, sp, "bootstrap activation");
    }

    pub fn on_thread_exit(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(tid.index()).and_then(Option::take) {
            debug!(
                %tid,
                depth = thread.stack.depth(),
                stack_intervals = thread.tree.len(),
                "thread exited"
            );
        }
    }

    /// Registers the caller's blocks at their addresses for the duration of
    /// the call and pushes the callee's activation.
    ///
    /// # Panics
    /// If a caller block overlaps a block already registered by the thread.
    pub fn on_call(
        &mut self,
        tid: ThreadId,
        sp_at_call: Addr,
        sp_after_call: Addr,
        fp_at_call: Addr,
        ret_addr: Addr,
        vector: StackVecRef,
    ) {
        let thread = thread_mut(&mut self.threads, tid);
        let depth = thread.stack.depth();
        let caller = thread.stack.top_mut();
        caller.sp_at_call = sp_at_call;
        caller.fp_at_call = fp_at_call;

        // Only an activation with a live callee has registered blocks.
        debug_assert!(caller.blocks_added_by_call.is_empty());

        let mut added = SmallVec::new();
        for (i, block) in self.descriptors.stack_vector(vector).iter().enumerate() {
            let addr = block.effective_addr(sp_at_call, fp_at_call);
            let Some(interval) = Interval::try_new(addr, block.size) else {
                debug!(%tid, name = %block.name, addr, "stack block wraps the address space");
                continue;
            };
            let value = StackInterval {
                block: StackBlockRef::new(vector, i),
                depth,
            };
            if let Err(overlap) = thread.tree.insert(interval, value) {
                panic!("{tid}: stack block \"{}\": {overlap}", block.name);
            }
            trace!(%tid, name = %block.name, %interval, depth, "register stack block");
            added.push(addr);
        }
        self.stats.stack_intervals_added += added.len() as u64;
        if !added.is_empty() {
            thread.qcache.invalidate();
        }
        caller.blocks_added_by_call = added;

        thread.stack.push(Activation::new(sp_after_call, ret_addr));
        self.stats.activations_pushed += 1;
        trace!(%tid, depth = depth + 1, sp = sp_after_call, ret_addr, "push activation");

        if self.config.should_run_deep_sanity() {
            self.assert_sane();
        }
    }

    /// Pops every activation created below `sp_new` and releases the blocks
    /// their callers registered.
    pub fn on_stack_unwind(&mut self, tid: ThreadId, sp_new: Addr) {
        let thread = thread_mut(&mut self.threads, tid);
        let mut popped = false;
        while sp_new > thread.stack.top().creation_sp {
            let callee = thread.stack.pop();
            let caller = thread.stack.top_mut();
            let addrs = std::mem::take(&mut caller.blocks_added_by_call);
            for &addr in &addrs {
                if thread.tree.remove_at(addr).is_none() {
                    panic!("{tid}: registered stack block at {addr:#x} is missing from the stack tree");
                }
            }
            if !addrs.is_empty() {
                thread.qcache.invalidate();
            }
            self.stats.stack_intervals_removed += addrs.len() as u64;
            self.stats.activations_popped += 1;
            popped = true;
            trace!(
                %tid,
                depth = thread.stack.depth() + 1,
                creation_sp = callee.creation_sp,
                sp_new,
                "pop activation"
            );
        }

        if popped && self.config.should_run_deep_sanity() {
            self.assert_sane();
        }
    }

    /// Checks one access against the invariant its instruction learned in
    /// the current activation. `signed_size` is negative for writes.
    #[allow(clippy::too_many_arguments)]
    pub fn on_memory_access(
        &mut self,
        tid: ThreadId,
        ea: Addr,
        sp: Addr,
        fp: Addr,
        signed_size: i64,
        ip: Addr,
        vector: StackVecRef,
    ) {
        let (kind, size) = AccessKind::from_signed_size(signed_size);
        self.stats.accesses += 1;

        let fresh = self.classify(tid, Access { ea, size, sp, fp }, vector);
        self.stats.count_classification(&fresh);

        let thread = thread_mut(&mut self.threads, tid);
        let depth = thread.stack.depth();
        let inst = thread.stack.top_mut().instances.find_or_create(ip, vector);
        let learned = inst.invariant;
        match learned {
            Invariant::Unset => {
                inst.invariant = fresh;
                return;
            }
            _ if learned.agrees_with(&fresh) => return,
            Invariant::Unknown => {
                inst.invariant = fresh;
                self.stats.upgraded_from_unknown += 1;
                return;
            }
            _ => inst.invariant = fresh,
        }

        self.stats.mismatches += 1;
        let call_stack = self.env.record_call_stack(tid, 0);
        let diag = Diagnostic::new(
            tid,
            kind,
            size,
            ea,
            ip,
            learned.display(&self.descriptors, depth).to_string(),
            fresh.display(&self.descriptors, depth).to_string(),
        )
        .with_relation(learned.range())
        .with_call_stack(call_stack);
        warn!(%tid, "{}", diag.summary());
        self.report.push(diag, self.config.max_diagnostics);
    }

    /// Classifies an access by `tid` against the blocks in `vector`, then the
    /// thread's registered caller blocks, then the global blocks.
    pub fn classify(&mut self, tid: ThreadId, access: Access, vector: StackVecRef) -> Invariant {
        let thread = thread_mut(&mut self.threads, tid);
        let classifier = Classifier {
            descriptors: &self.descriptors,
            stack_tree: &thread.tree,
            globals: &self.globals,
        };
        classifier.classify(&mut thread.qcache, &mut self.stats, access, vector)
    }

    /// Registers the global blocks of a newly loaded object.
    pub fn on_globals_loaded(&mut self, handle: ObjectHandle) {
        let blocks = self.env.global_blocks_for(handle, self.config.arrays_only);
        let mut added = 0;
        for block in blocks {
            let Some(interval) = Interval::try_new(block.addr, block.size) else {
                continue;
            };
            let name = block.name.clone();
            let block = self.descriptors.intern_global_block(block);
            match self.globals.insert(interval, block) {
                Ok(_) => added += 1,
                Err(overlap) => {
                    if self.overlap_moans > 0 {
                        self.overlap_moans -= 1;
                        warn!(%name, %overlap, "bogus debug info: overlapping global blocks");
                    }
                }
            }
        }
        self.stats.global_intervals_added += added;
        debug!(handle = handle.0, added, "globals loaded");

        if self.config.should_run_deep_sanity() {
            self.assert_sane();
        }
    }

    /// Drops the global blocks in `[addr, addr + size)` and forgets every
    /// invariant that referred to them.
    pub fn on_region_unmapped(&mut self, addr: Addr, size: u64) {
        let Some(range) = Interval::clamped(addr, size) else {
            return;
        };
        let removed = self.globals.delete_range(range);
        if removed.is_empty() {
            return;
        }
        self.stats.global_intervals_removed += removed.len() as u64;
        let removed: FxHashSet<NodeId> = removed.iter().map(|(_, node)| node.id).collect();

        let (mut preened, mut changed) = (0u64, 0u64);
        for thread in self.threads.iter_mut().flatten() {
            for activation in thread.stack.iter_mut() {
                for inst in activation.instances.iter_mut() {
                    let Invariant::Global {
                        node,
                        addr: inv_addr,
                        size: inv_size,
                        ..
                    } = inst.invariant
                    else {
                        continue;
                    };
                    preened += 1;
                    let overlaps = Interval::try_new(inv_addr, inv_size)
                        .is_some_and(|iv| iv.overlaps(&range));
                    if removed.contains(&node) || overlaps {
                        inst.invariant = Invariant::Unknown;
                        changed += 1;
                    }
                }
            }
        }
        self.stats.invariants_preened += preened;
        self.stats.invariants_changed += changed;
        debug!(addr, size, removed = removed.len(), preened, changed, "region unmapped");

        if self.config.should_run_deep_sanity() {
            self.assert_sane();
        }
    }

    /// Logs and returns the final counters.
    pub fn fini(&self) -> Stats {
        info!("sgcheck summary\n{}", self.stats);
        if !self.report.is_empty() {
            info!(
                errors = self.report.len() as u64 + self.report.dropped(),
                "errors detected"
            );
        }
        self.stats.clone()
    }

    pub fn sanity_violations(&self) -> Vec<SanityViolation> {
        let mut violations = sanity::check_globals(&self.globals);
        for (tid, thread) in self.threads() {
            violations.extend(sanity::check_thread(tid, thread));
            violations.extend(sanity::check_global_invariants(tid, thread, &self.globals));
        }
        violations
    }

    fn assert_sane(&self) {
        let violations = self.sanity_violations();
        if let Some(first) = violations.first() {
            panic!(
                "checker state is inconsistent ({} violations): {first}",
                violations.len()
            );
        }
    }
}

fn thread_mut(threads: &mut [Option<ThreadState>], tid: ThreadId) -> &mut ThreadState {
    match threads.get_mut(tid.index()) {
        Some(Some(thread)) => thread,
        Some(None) => panic!("{tid} used before it was created"),
        None => panic!("{tid} exceeds the configured thread slots"),
    }
}
