//! Probe dispatch.
//!
//! The host calls one `on_*` method per probe firing. Each method assembles
//! the event, updates the shadow stack and usage state, and hands the record
//! to the sink. Entry probes assemble then push; exit probes assemble then pop.

use crate::assembler::{EventAssembler, PromisePhase};
use crate::config::TracerConfig;
use crate::events::{
    BuiltinInfo, ClosureInfo, FunctionType, PromiseCreateInfo, PromiseInfo, TraceEvent,
};
use crate::host::{AddressTypeKey, HostRuntime, PromiseKeyStrategy, SexpType};
use crate::probe_debug_log;
use crate::probe_mask::{ProbeMask, ProbeSet};
use crate::session::{SessionSummary, TraceSession};
use crate::sink::EventSink;
use crate::stack::StackEntry;

pub struct Tracer<H, S, K = AddressTypeKey>
where
    H: HostRuntime,
    S: EventSink,
    K: PromiseKeyStrategy<H>,
{
    host: H,
    sink: S,
    keys: K,
    config: TracerConfig,
    mask: ProbeMask,
    session: Option<TraceSession>,
}

impl<H: HostRuntime, S: EventSink> Tracer<H, S, AddressTypeKey> {
    pub fn new(host: H, sink: S, config: TracerConfig) -> Self {
        Self::with_key_strategy(host, sink, AddressTypeKey, config)
    }
}

impl<H, S, K> Tracer<H, S, K>
where
    H: HostRuntime,
    S: EventSink,
    K: PromiseKeyStrategy<H>,
{
    pub fn with_key_strategy(host: H, sink: S, keys: K, config: TracerConfig) -> Self {
        Self {
            host,
            sink,
            keys,
            config,
            mask: ProbeMask::new(),
            session: None,
        }
    }

    /// Start a fresh session. A session that is already open is discarded.
    pub fn open(&mut self) {
        if let Some(previous) = self.session.take() {
            log::warn!(
                "reopening trace session; discarding {:?}",
                previous.summary()
            );
        }
        log::debug!("trace session opened");
        self.session = Some(TraceSession::new());
    }

    /// Flush the sink and tear the session down.
    pub fn close(&mut self) -> Option<SessionSummary> {
        let session = self.session.take()?;
        if let Err(err) = self.sink.flush() {
            log::warn!("failed to flush trace sink: {}", err);
        }
        let summary = session.summary();
        if summary.open_entries > 0 {
            log::warn!(
                "trace session closed with {} unmatched stack entries",
                summary.open_entries
            );
        }
        log::info!(
            "trace session closed: {} calls, {} promises created, {} events",
            summary.calls,
            summary.promises_created,
            summary.events
        );
        Some(summary)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&TraceSession> {
        self.session.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Handle on the mask; clones share state with the tracer.
    pub fn probe_mask(&self) -> ProbeMask {
        self.mask.clone()
    }

    /// Session and assembler for `probe`, or `None` when masked or closed.
    fn assembler(&mut self, probe: ProbeSet) -> Option<EventAssembler<'_, H, K>> {
        if !self.mask.is_enabled(probe) {
            probe_debug_log!("probe {:?} masked", probe);
            return None;
        }
        let session = self.session.as_mut()?;
        Some(EventAssembler::new(
            &self.host,
            &self.keys,
            &self.mask,
            &self.config,
            session,
        ))
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(session) = self.session.as_mut() {
            persist(&mut self.sink, session, event);
        }
    }

    pub fn on_closure_entry(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
    ) -> Option<ClosureInfo> {
        let mut assembler = self.assembler(ProbeSet::CLOSURE_ENTRY)?;
        let info = assembler.closure_entry(call, op, rho);
        let defined = assembler.function_defined(op, &info.fn_id);

        if let Some(defined) = defined {
            self.emit(TraceEvent::FunctionDefined(defined));
        }
        self.emit(TraceEvent::ClosureEntry(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.begin_call(&info);
        }
        Some(info)
    }

    pub fn on_closure_exit(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        retval: H::Ref,
    ) -> Option<ClosureInfo> {
        let mut assembler = self.assembler(ProbeSet::CLOSURE_EXIT)?;
        let info = assembler.closure_exit(call, op, rho, retval);
        let defined = assembler.function_defined(op, &info.fn_id);

        if let Some(defined) = defined {
            self.emit(TraceEvent::FunctionDefined(defined));
        }
        self.emit(TraceEvent::ClosureExit(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.end_call(info.call_id);
        }
        Some(info)
    }

    pub fn on_builtin_entry(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        fn_type: FunctionType,
    ) -> Option<BuiltinInfo> {
        let mut assembler = self.assembler(ProbeSet::BUILTIN_ENTRY)?;
        let info = assembler.builtin_entry(call, op, rho, fn_type);
        let defined = assembler.function_defined(op, &info.fn_id);

        if let Some(defined) = defined {
            self.emit(TraceEvent::FunctionDefined(defined));
        }
        self.emit(TraceEvent::BuiltinEntry(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.stack.push(StackEntry::Call {
                call_id: info.call_id,
                function_id: info.fn_id.clone(),
            });
        }
        Some(info)
    }

    pub fn on_builtin_exit(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        fn_type: FunctionType,
        retval: H::Ref,
    ) -> Option<BuiltinInfo> {
        let mut assembler = self.assembler(ProbeSet::BUILTIN_EXIT)?;
        let info = assembler.builtin_exit(call, op, rho, fn_type, retval);
        let defined = assembler.function_defined(op, &info.fn_id);

        if let Some(defined) = defined {
            self.emit(TraceEvent::FunctionDefined(defined));
        }
        self.emit(TraceEvent::BuiltinExit(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.stack.pop();
        }
        Some(info)
    }

    pub fn on_promise_created(&mut self, promise: H::Ref) -> Option<PromiseCreateInfo> {
        let info = self
            .assembler(ProbeSet::PROMISE_CREATED)?
            .promise_created(promise);
        self.emit(TraceEvent::PromiseCreated(info.clone()));
        Some(info)
    }

    pub fn on_promise_force_entry(&mut self, promise: H::Ref) -> Option<PromiseInfo> {
        let info = self
            .assembler(ProbeSet::PROMISE_FORCE_ENTRY)?
            .promise(promise, PromisePhase::ForceEntry);
        self.emit(TraceEvent::PromiseForceEntry(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.note_force(info.prom_id);
            session.stack.push(StackEntry::Promise {
                promise_id: info.prom_id,
            });
        }
        Some(info)
    }

    pub fn on_promise_force_exit(&mut self, promise: H::Ref) -> Option<PromiseInfo> {
        let info = self
            .assembler(ProbeSet::PROMISE_FORCE_EXIT)?
            .promise(promise, PromisePhase::ForceExit);
        self.emit(TraceEvent::PromiseForceExit(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.note_forced_value(info.prom_id, info.return_type);
            session.stack.pop();
        }
        Some(info)
    }

    pub fn on_promise_lookup(&mut self, promise: H::Ref) -> Option<PromiseInfo> {
        let info = self
            .assembler(ProbeSet::PROMISE_LOOKUP)?
            .promise(promise, PromisePhase::Lookup);
        self.emit(TraceEvent::PromiseLookup(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.note_lookup(info.prom_id);
        }
        Some(info)
    }

    pub fn on_promise_expression_lookup(&mut self, promise: H::Ref) -> Option<PromiseInfo> {
        let info = self
            .assembler(ProbeSet::PROMISE_EXPRESSION_LOOKUP)?
            .promise(promise, PromisePhase::ExpressionLookup);
        self.emit(TraceEvent::PromiseExpressionLookup(info.clone()));
        if let Some(session) = self.session.as_mut() {
            session.note_metaprogram(info.prom_id);
        }
        Some(info)
    }

    /// The host reclaimed `obj`. Returns whether cached state was dropped.
    pub fn on_object_reclaimed(&mut self, obj: H::Ref) -> bool {
        if !self.mask.is_enabled(ProbeSet::OBJECT_RECLAIMED) {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if self.host.type_of(obj) != SexpType::Closure {
            return false;
        }
        let address = self.host.address(obj);
        let forgotten = session.registry.forget_function_definition(address);
        if forgotten {
            probe_debug_log!("forgot definition cached at {:#x}", address);
        }
        forgotten
    }
}

fn persist<S: EventSink>(sink: &mut S, session: &mut TraceSession, event: TraceEvent) {
    probe_debug_log!("{}", event.name());
    match sink.persist(&event) {
        Ok(()) => session.count_event(),
        Err(err) => log::warn!("dropping {} event: {}", event.name(), err),
    }
}
