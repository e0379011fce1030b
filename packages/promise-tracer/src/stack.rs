//! Shadow stack of active calls and promises.

use serde::{Deserialize, Serialize};

use crate::ids::{CallId, FunctionId, PromiseId};

/// Kind of a stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    Call,
    Promise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEntry {
    Call {
        call_id: CallId,
        function_id: FunctionId,
    },
    Promise {
        promise_id: PromiseId,
    },
}

impl StackEntry {
    pub fn kind(&self) -> StackKind {
        match self {
            StackEntry::Call { .. } => StackKind::Call,
            StackEntry::Promise { .. } => StackKind::Promise,
        }
    }

    /// Call id of a call entry, `INVALID` otherwise.
    pub fn call_id(&self) -> CallId {
        match self {
            StackEntry::Call { call_id, .. } => *call_id,
            StackEntry::Promise { .. } => CallId::INVALID,
        }
    }

    /// Promise id of a promise entry, `INVALID` otherwise.
    pub fn promise_id(&self) -> PromiseId {
        match self {
            StackEntry::Promise { promise_id } => *promise_id,
            StackEntry::Call { .. } => PromiseId::INVALID,
        }
    }

    /// The entry's id as a plain signed integer, for parent references.
    pub fn raw_id(&self) -> i64 {
        match self {
            StackEntry::Call { call_id, .. } => call_id.raw() as i64,
            StackEntry::Promise { promise_id } => promise_id.raw(),
        }
    }
}

/// Ordered record of what is currently being evaluated.
///
/// Balance is the caller's responsibility: every `push` is matched by exactly
/// one `pop` from the probe dispatch. Queries scan from the top; the stack is
/// as deep as the traced program's nesting, so a linear scan is enough.
#[derive(Debug, Default)]
pub struct CallStack {
    entries: Vec<StackEntry>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: StackEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<StackEntry> {
        self.entries.pop()
    }

    /// Innermost entry of `kind`.
    pub fn last_of_kind(&self, kind: StackKind) -> Option<&StackEntry> {
        self.from_back_of_kind(kind, 0)
    }

    /// Innermost entry of `kind` after skipping `skip` matches from the top.
    pub fn from_back_of_kind(&self, kind: StackKind, skip: usize) -> Option<&StackEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.kind() == kind)
            .nth(skip)
    }

    /// Entry `skip` positions below the top, regardless of kind.
    pub fn from_back(&self, skip: usize) -> Option<&StackEntry> {
        self.entries.iter().rev().nth(skip)
    }

    pub fn count_of_kind(&self, kind: StackKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
