//! Per-call argument usage tracking.
//!
//! Each active call owns a [`CallState`] with one [`ParameterUse`] per formal
//! position. Flags only ever go from unset to set while the call is live, and
//! the force order records each position the first time it is forced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::host::SexpType;
use crate::ids::{CallId, FunctionId};

/// How a parameter got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    /// The promise was created in the call's own environment (default argument).
    Default,
    /// The caller supplied the promise.
    Custom,
    /// The binding is not a promise.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUse {
    pub value_type: SexpType,
    pub forced: bool,
    pub looked_up: bool,
    pub metaprogrammed: bool,
    pub mode: ParameterMode,
}

impl Default for ParameterUse {
    fn default() -> Self {
        Self {
            value_type: SexpType::Omega,
            forced: false,
            looked_up: false,
            metaprogrammed: false,
            mode: ParameterMode::Unknown,
        }
    }
}

impl ParameterUse {
    /// Value was accessed without forcing.
    pub fn lookup(&mut self) {
        self.looked_up = true;
    }

    /// Mark as forced; returns whether it already was.
    pub fn force(&mut self) -> bool {
        std::mem::replace(&mut self.forced, true)
    }

    pub fn metaprogram(&mut self) {
        self.metaprogrammed = true;
    }
}

// Typical arity is small; "|n" per forced position.
const ORDER_CAPACITY: usize = 15;

#[derive(Debug, Clone)]
pub struct CallState {
    call_id: CallId,
    function_id: FunctionId,
    formal_parameter_count: usize,
    parameter_uses: Vec<ParameterUse>,
    order: String,
}

impl CallState {
    pub fn new(call_id: CallId, function_id: FunctionId, formal_parameter_count: usize) -> Self {
        Self {
            call_id,
            function_id,
            formal_parameter_count,
            parameter_uses: vec![ParameterUse::default(); formal_parameter_count],
            order: String::with_capacity(ORDER_CAPACITY),
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    pub fn formal_parameter_count(&self) -> usize {
        self.formal_parameter_count
    }

    fn slot(&mut self, position: usize) -> Option<&mut ParameterUse> {
        let slot = self.parameter_uses.get_mut(position);
        if slot.is_none() {
            log::warn!(
                "call {} has no formal parameter at position {}",
                self.call_id,
                position
            );
        }
        slot
    }

    pub fn set_type(&mut self, position: usize, value_type: SexpType) {
        if let Some(slot) = self.slot(position) {
            slot.value_type = value_type;
        }
    }

    /// Force `position`, appending it to the order only on its first force.
    ///
    /// All elements of a dots group share one position, so the group is
    /// ordered by whichever element is forced first.
    pub fn force(&mut self, position: usize) {
        let Some(slot) = self.slot(position) else {
            return;
        };
        if !slot.force() {
            self.order.push('|');
            self.order.push_str(&position.to_string());
        }
    }

    pub fn lookup(&mut self, position: usize) {
        if let Some(slot) = self.slot(position) {
            slot.lookup();
        }
    }

    pub fn metaprogram(&mut self, position: usize) {
        if let Some(slot) = self.slot(position) {
            slot.metaprogram();
        }
    }

    pub fn set_parameter_mode(&mut self, position: usize, mode: ParameterMode) {
        if let Some(slot) = self.slot(position) {
            slot.mode = mode;
        }
    }

    pub fn parameter_uses(&self) -> &[ParameterUse] {
        &self.parameter_uses
    }

    pub fn parameter_use(&self, position: usize) -> Option<&ParameterUse> {
        self.parameter_uses.get(position)
    }

    /// Pipe-delimited first-force order, e.g. `"|2|0|1"`.
    pub fn order(&self) -> &str {
        &self.order
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallState({},{},{})",
            self.function_id, self.call_id, self.formal_parameter_count
        )
    }
}
