//! State owned by one open trace session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::call_state::CallState;
use crate::events::{ArgumentRecord, ClosureInfo};
use crate::host::SexpType;
use crate::ids::{CallId, PromiseId};
use crate::registry::IdentityRegistry;
use crate::stack::{CallStack, StackEntry, StackKind};

/// A closure call between its entry and exit probes.
#[derive(Debug, Clone)]
pub struct ActiveCall {
    pub state: CallState,
    /// Argument records issued at entry; their ids are reused at exit.
    pub arguments: Vec<ArgumentRecord>,
}

/// Where a promise sits in the argument list of a live call.
///
/// A promise forwarded through `...` is bound in several frames at once, so a
/// promise maps to every live owner, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArgumentSlot {
    call_id: CallId,
    position: usize,
}

/// Counters reported when a session closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub calls: u64,
    pub arguments: u64,
    pub promises_created: usize,
    pub promises_observed: u64,
    pub functions: usize,
    pub events: u64,
    /// Stack entries still open at close; non-zero means unmatched probes.
    pub open_entries: usize,
}

#[derive(Debug, Default)]
pub struct TraceSession {
    pub registry: IdentityRegistry,
    pub stack: CallStack,
    calls: HashMap<CallId, ActiveCall>,
    argument_slots: HashMap<PromiseId, Vec<ArgumentSlot>>,
    events: u64,
}

impl TraceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_call(&self, call_id: CallId) -> Option<&ActiveCall> {
        self.calls.get(&call_id)
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Start tracking usage for a closure call and push its frame.
    pub fn begin_call(&mut self, info: &ClosureInfo) {
        let mut state = CallState::new(
            info.call_id,
            info.fn_id.clone(),
            info.formal_parameter_count,
        );
        for argument in &info.arguments {
            let position = argument.formal_parameter_position;
            state.set_parameter_mode(position, argument.parameter_mode);
            state.set_type(position, argument.value_type);
            if argument.promise_id.is_valid() {
                let slot = ArgumentSlot {
                    call_id: info.call_id,
                    position,
                };
                let owners = self.argument_slots.entry(argument.promise_id).or_default();
                if !owners.contains(&slot) {
                    owners.push(slot);
                }
            }
        }
        self.calls.insert(
            info.call_id,
            ActiveCall {
                state,
                arguments: info.arguments.clone(),
            },
        );
        self.stack.push(StackEntry::Call {
            call_id: info.call_id,
            function_id: info.fn_id.clone(),
        });
    }

    /// Pop a closure frame and drop its usage state.
    pub fn end_call(&mut self, call_id: CallId) -> Option<ActiveCall> {
        let popped = self.stack.pop();
        if popped.as_ref().map(|entry| entry.call_id()) != Some(call_id) {
            log::debug!(
                "closure exit for call {} popped {:?}",
                call_id,
                popped.map(|entry| entry.kind())
            );
        }
        let finished = self.calls.remove(&call_id)?;
        for argument in &finished.arguments {
            if let Some(owners) = self.argument_slots.get_mut(&argument.promise_id) {
                owners.retain(|slot| slot.call_id != call_id);
                if owners.is_empty() {
                    self.argument_slots.remove(&argument.promise_id);
                }
            }
        }
        Some(finished)
    }

    /// Apply `update` to every live call the promise is an argument of.
    fn for_each_owner<F>(&mut self, promise_id: PromiseId, mut update: F)
    where
        F: FnMut(&mut CallState, usize),
    {
        let Some(owners) = self.argument_slots.get(&promise_id) else {
            return;
        };
        for slot in owners {
            match self.calls.get_mut(&slot.call_id) {
                Some(call) => update(&mut call.state, slot.position),
                None => log::debug!(
                    "promise {} outlived call {}; usage not recorded",
                    promise_id,
                    slot.call_id
                ),
            }
        }
    }

    pub fn note_force(&mut self, promise_id: PromiseId) {
        self.for_each_owner(promise_id, |state, position| state.force(position));
    }

    pub fn note_forced_value(&mut self, promise_id: PromiseId, value_type: SexpType) {
        self.for_each_owner(promise_id, |state, position| {
            state.set_type(position, value_type)
        });
    }

    pub fn note_lookup(&mut self, promise_id: PromiseId) {
        self.for_each_owner(promise_id, |state, position| state.lookup(position));
    }

    pub fn note_metaprogram(&mut self, promise_id: PromiseId) {
        self.for_each_owner(promise_id, |state, position| state.metaprogram(position));
    }

    pub fn count_event(&mut self) {
        self.events += 1;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            calls: self.registry.calls_issued(),
            arguments: self.registry.arguments_issued(),
            promises_created: self.registry.promises_created(),
            promises_observed: self.registry.promises_observed(),
            functions: self.registry.functions_seen(),
            events: self.events,
            open_entries: self.stack.len(),
        }
    }

    pub fn promise_depth(&self) -> usize {
        self.stack.count_of_kind(StackKind::Promise)
    }
}
