//! Identity and argument-usage tracking for tracing a lazy-evaluation runtime.
//!
//! The host runtime fires probes (closure and builtin entry/exit, promise
//! creation, forcing and lookup) into a [`Tracer`]. The tracer gives every
//! promise, call, argument and function body a stable identity, keeps a
//! shadow stack of active calls and promises, records in which order each
//! call's arguments were first forced, and hands one flat [`TraceEvent`] per
//! probe to an [`EventSink`].

pub mod assembler;
pub mod call_state;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod ids;
pub mod logging;
pub mod probe_mask;
pub mod registry;
pub mod session;
pub mod sink;
pub mod stack;
pub mod tracer;

#[cfg(test)]
mod test_host;

pub use call_state::{CallState, ParameterMode, ParameterUse};
pub use config::TracerConfig;
pub use error::TracerError;
pub use events::{
    ArgumentRecord, BuiltinInfo, ClosureInfo, FunctionInfo, FunctionType, PromiseCreateInfo,
    PromiseInfo, StackParent, TraceEvent,
};
pub use host::{
    AddressTypeKey, DotsElement, HostRuntime, LookupFailure, PromiseKey, PromiseKeyStrategy,
    SexpType,
};
pub use ids::{ArgumentId, CallId, FunctionId, PromiseId};
pub use logging::init_logging;
pub use probe_mask::{ProbeGuard, ProbeMask, ProbeSet};
pub use registry::IdentityRegistry;
pub use session::{SessionSummary, TraceSession};
pub use sink::{EventSink, JsonLinesSink, MemorySink, NullSink};
pub use stack::{CallStack, StackEntry, StackKind};
pub use tracer::Tracer;
