use std::collections::{hash_map, HashMap, HashSet};

use log::trace;

use super::{Handle, HandleError, HandleGenerator};

/// Maps handles to bridge-owned records.
///
/// A handle moves through three states: reserved (allocated, no record yet),
/// bound (resolves to a record) and released. Released handles are never
/// reissued, so a stale handle can only ever resolve to `NotFound`.
pub struct HandleTable<R> {
    generator: HandleGenerator,
    reserved: HashSet<Handle>,
    records: HashMap<Handle, R>,
}

impl<R> Default for HandleTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> HandleTable<R> {
    pub fn new() -> Self {
        Self {
            generator: HandleGenerator::new(),
            reserved: HashSet::new(),
            records: HashMap::new(),
        }
    }

    /// Reserves a fresh handle. It resolves to nothing until bound.
    pub fn allocate(&mut self) -> Handle {
        let handle = self.generator.generate();
        self.reserved.insert(handle);
        trace!("allocated {:?}", handle);
        handle
    }

    pub fn bind(&mut self, handle: Handle, record: R) -> Result<(), HandleError> {
        if self.records.contains_key(&handle) {
            return Err(HandleError::AlreadyBound { handle });
        }
        if !self.reserved.remove(&handle) {
            return Err(HandleError::NotReserved { handle });
        }
        self.records.insert(handle, record);
        Ok(())
    }

    /// Allocates and binds in one step.
    pub fn insert(&mut self, record: R) -> Handle {
        let handle = self.generator.generate();
        self.records.insert(handle, record);
        handle
    }

    pub fn resolve(&self, handle: &Handle) -> Result<&R, HandleError> {
        self.records
            .get(handle)
            .ok_or(HandleError::NotFound { handle: *handle })
    }

    pub fn resolve_mut(&mut self, handle: &Handle) -> Result<&mut R, HandleError> {
        self.records
            .get_mut(handle)
            .ok_or(HandleError::NotFound { handle: *handle })
    }

    pub fn is_reserved(&self, handle: &Handle) -> bool {
        self.reserved.contains(handle)
    }

    pub fn is_bound(&self, handle: &Handle) -> bool {
        self.records.contains_key(handle)
    }

    /// Releases a handle, returning its record if it had one. Releasing an
    /// unknown or already released handle is a no-op.
    pub fn release(&mut self, handle: &Handle) -> Option<R> {
        let was_reserved = self.reserved.remove(handle);
        let record = self.records.remove(handle);
        if was_reserved || record.is_some() {
            trace!("released {:?}", handle);
        }
        record
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reserved_len(&self) -> usize {
        self.reserved.len()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Handle, R> {
        self.records.iter()
    }
}
