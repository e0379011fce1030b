//! The host runtime as seen by the tracer.
//!
//! The tracer never owns runtime objects. It receives opaque handles from the
//! host's probe dispatch and reads them back through [`HostRuntime`].

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime type tag of a host object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexpType {
    Nil,
    Symbol,
    Pairlist,
    Closure,
    Environment,
    Promise,
    Language,
    Special,
    Builtin,
    Char,
    Logical,
    Integer,
    Double,
    Complex,
    Character,
    Dot,
    Any,
    List,
    Expression,
    Bytecode,
    ExternalPointer,
    WeakRef,
    Raw,
    S4,
    /// Not known, or deliberately not computed.
    Omega,
}

impl SexpType {
    /// Numeric tag as used by the host runtime.
    pub fn code(self) -> u32 {
        match self {
            SexpType::Nil => 0,
            SexpType::Symbol => 1,
            SexpType::Pairlist => 2,
            SexpType::Closure => 3,
            SexpType::Environment => 4,
            SexpType::Promise => 5,
            SexpType::Language => 6,
            SexpType::Special => 7,
            SexpType::Builtin => 8,
            SexpType::Char => 9,
            SexpType::Logical => 10,
            SexpType::Integer => 13,
            SexpType::Double => 14,
            SexpType::Complex => 15,
            SexpType::Character => 16,
            SexpType::Dot => 17,
            SexpType::Any => 18,
            SexpType::List => 19,
            SexpType::Expression => 20,
            SexpType::Bytecode => 21,
            SexpType::ExternalPointer => 22,
            SexpType::WeakRef => 23,
            SexpType::Raw => 24,
            SexpType::S4 => 25,
            SexpType::Omega => 69,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SexpType::Nil,
            1 => SexpType::Symbol,
            2 => SexpType::Pairlist,
            3 => SexpType::Closure,
            4 => SexpType::Environment,
            5 => SexpType::Promise,
            6 => SexpType::Language,
            7 => SexpType::Special,
            8 => SexpType::Builtin,
            9 => SexpType::Char,
            10 => SexpType::Logical,
            13 => SexpType::Integer,
            14 => SexpType::Double,
            15 => SexpType::Complex,
            16 => SexpType::Character,
            17 => SexpType::Dot,
            18 => SexpType::Any,
            19 => SexpType::List,
            20 => SexpType::Expression,
            21 => SexpType::Bytecode,
            22 => SexpType::ExternalPointer,
            23 => SexpType::WeakRef,
            24 => SexpType::Raw,
            25 => SexpType::S4,
            _ => SexpType::Omega,
        }
    }
}

/// Why a binding could not be read from an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("lookup failed: environment is nil")]
    EnvironmentIsNil,
    #[error("lookup failed: binding is unbound")]
    UnboundValue,
    #[error("lookup failed: binding is active")]
    ActiveBinding,
    #[error("lookup failed: binding not found")]
    NotFound,
}

/// One element of a variadic (`...`) group.
#[derive(Debug, Clone)]
pub struct DotsElement<R> {
    pub tag: Option<String>,
    pub value: R,
}

/// Read access to the instrumented runtime.
///
/// Every method must be cheap to call except [`HostRuntime::deparse`], which
/// the tracer assumes is expensive and memoizes where it can.
pub trait HostRuntime {
    type Ref: Copy + Eq + Hash + Debug;

    fn is_null(&self, obj: Self::Ref) -> bool;
    fn type_of(&self, obj: Self::Ref) -> SexpType;
    fn address(&self, obj: Self::Ref) -> usize;

    fn promise_code(&self, promise: Self::Ref) -> Self::Ref;
    fn promise_env(&self, promise: Self::Ref) -> Self::Ref;
    fn promise_value(&self, promise: Self::Ref) -> Self::Ref;
    /// Source expression wrapped by a byte-code object.
    fn bytecode_expr(&self, code: Self::Ref) -> Self::Ref;

    /// Names of the declared formal parameters, in order.
    fn formals(&self, function: Self::Ref) -> Vec<String>;
    fn is_byte_compiled(&self, function: Self::Ref) -> bool;
    fn primitive_arity(&self, function: Self::Ref) -> i32;
    fn namespace_name(&self, function: Self::Ref) -> Option<String>;
    fn definition_location(&self, function: Self::Ref) -> Option<String>;

    fn call_name(&self, call: Self::Ref) -> Option<String>;
    /// Source location of the call `frame_offset` frames up the host stack.
    fn callsite_location(&self, frame_offset: usize) -> Option<String>;

    fn lookup_binding(&self, env: Self::Ref, name: &str) -> Result<Self::Ref, LookupFailure>;
    fn symbol_name(&self, symbol: Self::Ref) -> Option<String>;
    fn dots(&self, dots: Self::Ref) -> Vec<DotsElement<Self::Ref>>;

    /// Print an object as source text.
    fn deparse(&self, obj: Self::Ref) -> String;
}

/// Identity key of a promise.
///
/// The address alone is recycled by the allocator; the code type and the
/// unwrapped byte-code body type tell apart structurally different promises
/// that land on the same address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PromiseKey {
    pub address: usize,
    pub code_type: SexpType,
    pub body_type: Option<SexpType>,
}

/// Turns a promise handle into its identity key.
pub trait PromiseKeyStrategy<H: HostRuntime> {
    /// `None` for a null reference or an object that is not a promise.
    fn promise_key(&self, host: &H, promise: H::Ref) -> Option<PromiseKey>;
}

/// Default key: `(address, code type, byte-code body type)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressTypeKey;

impl<H: HostRuntime> PromiseKeyStrategy<H> for AddressTypeKey {
    fn promise_key(&self, host: &H, promise: H::Ref) -> Option<PromiseKey> {
        if host.is_null(promise) || host.type_of(promise) != SexpType::Promise {
            return None;
        }
        let code = host.promise_code(promise);
        let code_type = host.type_of(code);
        let body_type = if code_type == SexpType::Bytecode {
            Some(host.type_of(host.bytecode_expr(code)))
        } else {
            None
        };
        Some(PromiseKey {
            address: host.address(promise),
            code_type,
            body_type,
        })
    }
}

/// Code type, followed by the body type when the code is byte-compiled.
pub fn promise_full_type<H: HostRuntime>(host: &H, promise: H::Ref) -> Vec<SexpType> {
    let code = host.promise_code(promise);
    let code_type = host.type_of(code);
    let mut full_type = vec![code_type];
    if code_type == SexpType::Bytecode {
        full_type.push(host.type_of(host.bytecode_expr(code)));
    }
    full_type
}
