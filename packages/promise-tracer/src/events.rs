//! Flat records handed to the event sink.

use serde::{Deserialize, Serialize};

use crate::call_state::{ParameterMode, ParameterUse};
use crate::host::SexpType;
use crate::ids::{ArgumentId, CallId, FunctionId, PromiseId};
use crate::stack::{StackEntry, StackKind};

/// Placeholder for promise expressions that were not printed.
pub const EXPRESSION_NOT_COMPUTED: &str = "<not computed>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionType {
    Closure,
    Builtin,
    Special,
    TrueBuiltin,
}

/// Direct ancestor on the shadow stack, of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParent {
    pub kind: Option<StackKind>,
    pub id: i64,
}

impl StackParent {
    pub fn none() -> Self {
        Self { kind: None, id: 0 }
    }

    pub fn of(entry: Option<&StackEntry>) -> Self {
        match entry {
            Some(entry) => Self {
                kind: Some(entry.kind()),
                id: entry.raw_id(),
            },
            None => Self::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    pub id: ArgumentId,
    pub name: String,
    /// `Dot` for elements unpacked from a dots group.
    pub name_type: SexpType,
    pub value_type: SexpType,
    pub formal_parameter_position: usize,
    pub dot_argument: bool,
    /// `INVALID` when the bound value is not a promise.
    pub promise_id: PromiseId,
    pub parameter_mode: ParameterMode,
    pub forced: bool,
    pub looked_up: bool,
    pub metaprogrammed: bool,
    /// Type of the value once known, `Omega` before that.
    pub observed_type: SexpType,
}

impl ArgumentRecord {
    pub fn apply_usage(&mut self, usage: &ParameterUse) {
        self.forced = usage.forced;
        self.looked_up = usage.looked_up;
        self.metaprogrammed = usage.metaprogrammed;
        self.observed_type = usage.value_type;
    }
}

/// First sighting of a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub fn_id: FunctionId,
    pub builtin: bool,
    pub definition: String,
    pub definition_location: Option<String>,
    pub fn_compiled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureInfo {
    pub fn_id: FunctionId,
    pub fn_addr: usize,
    pub fn_type: FunctionType,
    pub fn_compiled: bool,
    pub name: Option<String>,
    pub call_id: CallId,
    pub parent_call_id: CallId,
    pub parent: StackParent,
    pub in_prom_id: PromiseId,
    pub call_ptr: usize,
    pub definition_location: Option<String>,
    pub callsite_location: Option<String>,
    /// Printed call; entry only.
    pub call_expression: Option<String>,
    pub formal_parameter_count: usize,
    pub arguments: Vec<ArgumentRecord>,
    /// First-force order of formal positions; filled at exit.
    pub force_order: String,
    /// Exit only.
    pub return_value_type: Option<SexpType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinInfo {
    pub fn_id: FunctionId,
    pub fn_addr: usize,
    pub fn_type: FunctionType,
    pub fn_compiled: bool,
    pub name: Option<String>,
    pub call_id: CallId,
    pub parent_call_id: CallId,
    pub parent: StackParent,
    pub in_prom_id: PromiseId,
    pub call_ptr: usize,
    pub definition_location: Option<String>,
    pub callsite_location: Option<String>,
    pub formal_parameter_count: i32,
    pub return_value_type: Option<SexpType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseCreateInfo {
    pub prom_id: PromiseId,
    pub prom_type: SexpType,
    pub full_type: Vec<SexpType>,
    pub parent: StackParent,
    pub in_prom_id: PromiseId,
    pub in_call_id: CallId,
    pub depth: usize,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseInfo {
    pub prom_id: PromiseId,
    pub in_call_id: CallId,
    /// Call that was innermost when the promise was created.
    pub from_call_id: CallId,
    pub prom_type: SexpType,
    pub full_type: Vec<SexpType>,
    pub return_type: SexpType,
    pub parent: StackParent,
    pub in_prom_id: PromiseId,
    pub depth: usize,
    /// The promise was seen being created in this session.
    pub declared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    FunctionDefined(FunctionInfo),
    ClosureEntry(ClosureInfo),
    ClosureExit(ClosureInfo),
    BuiltinEntry(BuiltinInfo),
    BuiltinExit(BuiltinInfo),
    PromiseCreated(PromiseCreateInfo),
    PromiseForceEntry(PromiseInfo),
    PromiseForceExit(PromiseInfo),
    PromiseLookup(PromiseInfo),
    PromiseExpressionLookup(PromiseInfo),
}

impl TraceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TraceEvent::FunctionDefined(_) => "function_defined",
            TraceEvent::ClosureEntry(_) => "closure_entry",
            TraceEvent::ClosureExit(_) => "closure_exit",
            TraceEvent::BuiltinEntry(_) => "builtin_entry",
            TraceEvent::BuiltinExit(_) => "builtin_exit",
            TraceEvent::PromiseCreated(_) => "promise_created",
            TraceEvent::PromiseForceEntry(_) => "promise_force_entry",
            TraceEvent::PromiseForceExit(_) => "promise_force_exit",
            TraceEvent::PromiseLookup(_) => "promise_lookup",
            TraceEvent::PromiseExpressionLookup(_) => "promise_expression_lookup",
        }
    }
}
