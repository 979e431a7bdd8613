//! Per-activation table of instruction instances, keyed by guest IP.
use crate::{interner::StackVecRef, invariant::Invariant, Addr};

const INITIAL_SLOTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstInstance {
    pub ip: Addr,
    pub vector: StackVecRef,
    pub invariant: Invariant,
}

/// Open addressing with linear probing. The slot count is a power of two
/// and the table is kept at most half full.
#[derive(Debug, Clone)]
pub struct InstanceTable {
    slots: Vec<Option<InstInstance>>,
    used: usize,
}

impl Default for InstanceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; INITIAL_SLOTS],
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn find(&self, ip: Addr) -> Option<&InstInstance> {
        let idx = self.probe(ip).ok()?;
        self.slots[idx].as_ref()
    }

    /// Returns the instance for `ip`, creating an `Unset` one on first use.
    ///
    /// # Panics
    /// If `ip` is zero, or if `ip` is already known with a different vector.
    pub fn find_or_create(&mut self, ip: Addr, vector: StackVecRef) -> &mut InstInstance {
        assert!(ip != 0, "instruction address 0 used as an instance key");

        let idx = match self.probe(ip) {
            Ok(idx) => idx,
            Err(_) => {
                if 2 * self.used > self.slots.len() {
                    self.grow();
                }
                let Err(idx) = self.probe(ip) else {
                    unreachable!("{ip:#x} appeared while growing the instance table")
                };
                self.slots[idx] = Some(InstInstance {
                    ip,
                    vector,
                    invariant: Invariant::Unset,
                });
                self.used += 1;
                idx
            }
        };

        let Some(inst) = self.slots[idx].as_mut() else {
            unreachable!("probed instance slot is empty")
        };
        assert_eq!(
            inst.vector, vector,
            "instruction {ip:#x} reached with two different block vectors"
        );
        inst
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstInstance> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut InstInstance> {
        self.slots.iter_mut().flatten()
    }

    /// `Ok` with the slot holding `ip`, or `Err` with the free slot where it
    /// would go.
    fn probe(&self, ip: Addr) -> Result<usize, usize> {
        let mask = self.slots.len() - 1;
        let mut idx = (ip as usize) & mask;
        for _ in 0..self.slots.len() {
            match &self.slots[idx] {
                Some(inst) if inst.ip == ip => return Ok(idx),
                Some(_) => idx = (idx + 1) & mask,
                None => return Err(idx),
            }
        }
        panic!(
            "instance table full ({} of {} slots) without having grown",
            self.used,
            self.slots.len()
        );
    }

    fn grow(&mut self) {
        let len = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, vec![None; len]);
        for inst in old.into_iter().flatten() {
            let Err(idx) = self.probe(inst.ip) else {
                panic!("instruction {:#x} stored twice", inst.ip)
            };
            self.slots[idx] = Some(inst);
        }
    }
}
