//! Identity assignment for promises, calls, arguments and function bodies.

use std::collections::{HashMap, HashSet};

use crate::host::PromiseKey;
use crate::ids::{ArgumentId, CallId, FunctionId, PromiseId};

/// Definition text and kind remembered for an issued function id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub definition: String,
    pub builtin: bool,
}

/// Session-scoped id counters and lookup tables.
///
/// A new mapping for a promise key silently replaces an older one: a recycled
/// address holding a structurally identical promise is indistinguishable from
/// the original and takes over its slot.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    promise_ids: HashMap<PromiseKey, PromiseId>,
    next_positive_promise: i64,
    next_negative_promise: i64,
    inserted_negative_promises: HashSet<PromiseId>,
    promise_origin: HashMap<PromiseId, CallId>,

    call_counter: u64,
    argument_counter: u64,

    definitions_by_address: HashMap<usize, String>,
    function_ids: HashMap<String, FunctionId>,
    functions: HashMap<FunctionId, FunctionEntry>,
    inserted_functions: HashSet<FunctionId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of an observed promise, issuing the next positive id on a miss.
    pub fn promise_id(&mut self, key: Option<PromiseKey>) -> PromiseId {
        let Some(key) = key else {
            return PromiseId::INVALID;
        };
        if let Some(id) = self.promise_ids.get(&key) {
            return *id;
        }
        self.create_promise_id(Some(key), false)
    }

    /// Always issue a fresh id for `key`, replacing any previous mapping.
    ///
    /// Negative ids are also recorded as pre-registered.
    pub fn create_promise_id(&mut self, key: Option<PromiseKey>, negative: bool) -> PromiseId {
        let Some(key) = key else {
            return PromiseId::INVALID;
        };
        let id = if negative {
            self.next_negative_promise -= 1;
            PromiseId(self.next_negative_promise)
        } else {
            self.next_positive_promise += 1;
            PromiseId(self.next_positive_promise)
        };
        if let Some(previous) = self.promise_ids.insert(key, id) {
            log::trace!(
                "promise key at {:#x} remapped from {} to {}",
                key.address,
                previous,
                id
            );
        }
        if negative {
            self.inserted_negative_promises.insert(id);
        }
        id
    }

    pub fn negative_promise_already_inserted(&self, id: PromiseId) -> bool {
        self.inserted_negative_promises.contains(&id)
    }

    pub fn set_promise_origin(&mut self, id: PromiseId, call: CallId) {
        self.promise_origin.insert(id, call);
    }

    /// Call that was innermost when the promise was created.
    pub fn promise_origin(&self, id: PromiseId) -> CallId {
        self.promise_origin
            .get(&id)
            .copied()
            .unwrap_or(CallId::INVALID)
    }

    /// Next call id, or the invalid id for a null target.
    pub fn call_id(&mut self, target_is_null: bool) -> CallId {
        if target_is_null {
            return CallId::INVALID;
        }
        self.call_counter += 1;
        CallId(self.call_counter)
    }

    pub fn argument_id(&mut self) -> ArgumentId {
        self.argument_counter += 1;
        ArgumentId(self.argument_counter)
    }

    /// Printed definition of the function at `address`.
    ///
    /// `deparse` runs only on a cache miss.
    pub fn function_definition<F>(&mut self, address: usize, deparse: F) -> String
    where
        F: FnOnce() -> String,
    {
        self.definitions_by_address
            .entry(address)
            .or_insert_with(deparse)
            .clone()
    }

    /// Drop the cached definition for a reclaimed function object.
    pub fn forget_function_definition(&mut self, address: usize) -> bool {
        self.definitions_by_address.remove(&address).is_some()
    }

    pub fn function_id(&mut self, definition: &str, builtin: bool) -> FunctionId {
        if let Some(id) = self.function_ids.get(definition) {
            return id.clone();
        }
        let id = FunctionId::from_definition(definition);
        self.function_ids.insert(definition.to_string(), id.clone());
        self.functions.insert(
            id.clone(),
            FunctionEntry {
                definition: definition.to_string(),
                builtin,
            },
        );
        id
    }

    pub fn function_entry(&self, id: &FunctionId) -> Option<&FunctionEntry> {
        self.functions.get(id)
    }

    /// Mark a function as persisted. Returns `true` the first time only.
    pub fn register_inserted_function(&mut self, id: &FunctionId) -> bool {
        self.inserted_functions.insert(id.clone())
    }

    pub fn function_already_inserted(&self, id: &FunctionId) -> bool {
        self.inserted_functions.contains(id)
    }

    pub fn calls_issued(&self) -> u64 {
        self.call_counter
    }

    pub fn arguments_issued(&self) -> u64 {
        self.argument_counter
    }

    pub fn promises_created(&self) -> usize {
        self.inserted_negative_promises.len()
    }

    pub fn promises_observed(&self) -> u64 {
        self.next_positive_promise as u64
    }

    pub fn functions_seen(&self) -> usize {
        self.functions.len()
    }
}
