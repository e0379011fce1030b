//! Builds event records from the live runtime and the session state.
//!
//! Entry and exit probes differ mostly in which stack rank resolves the
//! parent: at exit the exiting frame is still on the stack, so the parent is
//! one match further down.

use crate::call_state::ParameterMode;
use crate::config::TracerConfig;
use crate::events::{
    ArgumentRecord, BuiltinInfo, ClosureInfo, FunctionInfo, FunctionType, PromiseCreateInfo,
    PromiseInfo, StackParent, EXPRESSION_NOT_COMPUTED,
};
use crate::host::{promise_full_type, HostRuntime, PromiseKeyStrategy, SexpType};
use crate::ids::{CallId, FunctionId, PromiseId};
use crate::probe_mask::{ProbeMask, ProbeSet};
use crate::session::TraceSession;
use crate::stack::StackKind;

const MISSING_NAME: &str = "<missing name>";

/// Which moment of a promise's life a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromisePhase {
    ForceEntry,
    ForceExit,
    Lookup,
    ExpressionLookup,
}

pub struct EventAssembler<'a, H: HostRuntime, K: PromiseKeyStrategy<H>> {
    host: &'a H,
    keys: &'a K,
    mask: &'a ProbeMask,
    config: &'a TracerConfig,
    session: &'a mut TraceSession,
}

impl<'a, H: HostRuntime, K: PromiseKeyStrategy<H>> EventAssembler<'a, H, K> {
    pub fn new(
        host: &'a H,
        keys: &'a K,
        mask: &'a ProbeMask,
        config: &'a TracerConfig,
        session: &'a mut TraceSession,
    ) -> Self {
        Self {
            host,
            keys,
            mask,
            config,
            session,
        }
    }

    fn promise_id(&mut self, promise: H::Ref) -> PromiseId {
        let key = self.keys.promise_key(self.host, promise);
        self.session.registry.promise_id(key)
    }

    fn call_of_kind(&self, skip: usize) -> CallId {
        self.session
            .stack
            .from_back_of_kind(StackKind::Call, skip)
            .map(|entry| entry.call_id())
            .unwrap_or(CallId::INVALID)
    }

    fn promise_of_kind(&self, skip: usize) -> PromiseId {
        self.session
            .stack
            .from_back_of_kind(StackKind::Promise, skip)
            .map(|entry| entry.promise_id())
            .unwrap_or(PromiseId::INVALID)
    }

    fn stack_parent(&self, skip: usize) -> StackParent {
        StackParent::of(self.session.stack.from_back(skip))
    }

    fn resolve_function(&mut self, op: H::Ref, builtin: bool) -> FunctionId {
        let host = self.host;
        let definition = self
            .session
            .registry
            .function_definition(host.address(op), || host.deparse(op));
        self.session.registry.function_id(&definition, builtin)
    }

    fn qualified_name(&self, call: H::Ref, op: H::Ref) -> Option<String> {
        let name = self.host.call_name(call);
        match self.host.namespace_name(op) {
            Some(namespace) => Some(format!(
                "{}::{}",
                namespace,
                name.as_deref().unwrap_or(MISSING_NAME)
            )),
            None => name,
        }
    }

    /// Print `obj` with expression-lookup probes masked.
    fn deparse_quietly(&self, obj: H::Ref) -> String {
        let _guard = self.mask.suppress(ProbeSet::PROMISE_EXPRESSION_LOOKUP);
        self.host.deparse(obj)
    }

    /// Definition record for `fn_id`, the first time it is seen only.
    pub fn function_defined(&mut self, op: H::Ref, fn_id: &FunctionId) -> Option<FunctionInfo> {
        if !self.session.registry.register_inserted_function(fn_id) {
            return None;
        }
        let entry = self.session.registry.function_entry(fn_id)?;
        Some(FunctionInfo {
            fn_id: fn_id.clone(),
            builtin: entry.builtin,
            definition: entry.definition.clone(),
            definition_location: self.host.definition_location(op),
            fn_compiled: self.host.is_byte_compiled(op),
        })
    }

    pub fn closure_entry(&mut self, call: H::Ref, op: H::Ref, rho: H::Ref) -> ClosureInfo {
        let fn_id = self.resolve_function(op, false);
        let call_id = self.session.registry.call_id(self.host.is_null(op));
        let arguments = self.closure_arguments(call_id, op, rho);

        ClosureInfo {
            fn_id,
            fn_addr: self.host.address(op),
            fn_type: FunctionType::Closure,
            fn_compiled: self.host.is_byte_compiled(op),
            name: self.qualified_name(call, op),
            call_id,
            parent_call_id: self.call_of_kind(0),
            parent: self.stack_parent(0),
            in_prom_id: self.promise_of_kind(0),
            call_ptr: self.host.address(rho),
            definition_location: self.host.definition_location(op),
            callsite_location: self.host.callsite_location(1),
            call_expression: Some(self.deparse_quietly(call)),
            formal_parameter_count: self.host.formals(op).len(),
            arguments,
            force_order: String::new(),
            return_value_type: None,
        }
    }

    pub fn closure_exit(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        retval: H::Ref,
    ) -> ClosureInfo {
        let fn_id = self.resolve_function(op, false);
        let call_id = self.call_of_kind(0);

        let (arguments, force_order) = match self.session.active_call(call_id) {
            Some(active) => {
                let mut arguments = active.arguments.clone();
                for argument in &mut arguments {
                    if let Some(usage) =
                        active.state.parameter_use(argument.formal_parameter_position)
                    {
                        argument.apply_usage(usage);
                    }
                }
                (arguments, active.state.order().to_string())
            }
            None => {
                log::debug!("closure exit for call {} without a recorded entry", call_id);
                (self.closure_arguments(call_id, op, rho), String::new())
            }
        };

        ClosureInfo {
            fn_id,
            fn_addr: self.host.address(op),
            fn_type: FunctionType::Closure,
            fn_compiled: self.host.is_byte_compiled(op),
            name: self.qualified_name(call, op),
            call_id,
            parent_call_id: self.call_of_kind(1),
            parent: self.stack_parent(1),
            in_prom_id: self.promise_of_kind(0),
            call_ptr: self.host.address(rho),
            definition_location: self.host.definition_location(op),
            callsite_location: self.host.callsite_location(0),
            call_expression: None,
            formal_parameter_count: self.host.formals(op).len(),
            arguments,
            force_order,
            return_value_type: Some(self.host.type_of(retval)),
        }
    }

    /// Walk the formals of `op`, reading each binding from `rho` and
    /// unpacking dots groups into one record per element.
    fn closure_arguments(&mut self, call_id: CallId, op: H::Ref, rho: H::Ref) -> Vec<ArgumentRecord> {
        let mut arguments = Vec::new();
        for (position, name) in self.host.formals(op).into_iter().enumerate() {
            let value = match self.host.lookup_binding(rho, &name) {
                Ok(value) => value,
                Err(failure) => {
                    log::error!("{} (argument {:?} of call {})", failure, name, call_id);
                    arguments.push(self.unresolved_argument(name, position));
                    continue;
                }
            };

            if self.host.type_of(value) == SexpType::Dot {
                for element in self.host.dots(value) {
                    let tag = element.tag.unwrap_or_else(|| MISSING_NAME.to_string());
                    let record =
                        self.argument(tag, SexpType::Dot, element.value, rho, true, position);
                    arguments.push(record);
                }
                continue;
            }

            let value = self.dereference_symbol(call_id, &name, value, rho);
            let record = self.argument(name, SexpType::Symbol, value, rho, false, position);
            arguments.push(record);
        }
        arguments
    }

    /// A binding that is itself a symbol (unpromised argument under the JIT)
    /// stands for the value bound to that symbol.
    fn dereference_symbol(&self, call_id: CallId, name: &str, value: H::Ref, rho: H::Ref) -> H::Ref {
        if self.host.type_of(value) != SexpType::Symbol {
            return value;
        }
        let symbol = match self.host.symbol_name(value) {
            // the empty symbol marks a missing argument
            Some(symbol) if !symbol.is_empty() => symbol,
            _ => return value,
        };
        match self.host.lookup_binding(rho, &symbol) {
            Ok(bound) => bound,
            Err(failure) => {
                log::error!(
                    "{} (symbol {:?} bound to argument {:?} of call {})",
                    failure,
                    symbol,
                    name,
                    call_id
                );
                value
            }
        }
    }

    fn argument(
        &mut self,
        name: String,
        name_type: SexpType,
        value: H::Ref,
        rho: H::Ref,
        dot_argument: bool,
        position: usize,
    ) -> ArgumentRecord {
        let value_type = self.host.type_of(value);
        let (promise_id, parameter_mode) = if value_type == SexpType::Promise {
            let mode = if self.host.promise_env(value) == rho {
                ParameterMode::Default
            } else {
                ParameterMode::Custom
            };
            (self.promise_id(value), mode)
        } else {
            (PromiseId::INVALID, ParameterMode::Unknown)
        };

        ArgumentRecord {
            id: self.session.registry.argument_id(),
            name,
            name_type,
            value_type,
            formal_parameter_position: position,
            dot_argument,
            promise_id,
            parameter_mode,
            forced: false,
            looked_up: false,
            metaprogrammed: false,
            observed_type: value_type,
        }
    }

    fn unresolved_argument(&mut self, name: String, position: usize) -> ArgumentRecord {
        ArgumentRecord {
            id: self.session.registry.argument_id(),
            name,
            name_type: SexpType::Symbol,
            value_type: SexpType::Omega,
            formal_parameter_position: position,
            dot_argument: false,
            promise_id: PromiseId::INVALID,
            parameter_mode: ParameterMode::Unknown,
            forced: false,
            looked_up: false,
            metaprogrammed: false,
            observed_type: SexpType::Omega,
        }
    }

    pub fn builtin_entry(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        fn_type: FunctionType,
    ) -> BuiltinInfo {
        let fn_id = self.resolve_function(op, true);
        let parent_call_id = self.call_of_kind(0);
        let call_id = self.session.registry.call_id(self.host.is_null(op));

        BuiltinInfo {
            fn_id,
            fn_addr: self.host.address(op),
            fn_type,
            fn_compiled: self.host.is_byte_compiled(op),
            name: self.host.call_name(call),
            call_id,
            parent_call_id,
            parent: self.stack_parent(0),
            in_prom_id: self.promise_of_kind(0),
            call_ptr: self.host.address(rho),
            definition_location: self.host.definition_location(op),
            callsite_location: self.host.callsite_location(0),
            formal_parameter_count: self.host.primitive_arity(op),
            return_value_type: None,
        }
    }

    pub fn builtin_exit(
        &mut self,
        call: H::Ref,
        op: H::Ref,
        rho: H::Ref,
        fn_type: FunctionType,
        retval: H::Ref,
    ) -> BuiltinInfo {
        let fn_id = self.resolve_function(op, true);

        BuiltinInfo {
            fn_id,
            fn_addr: self.host.address(op),
            fn_type,
            fn_compiled: self.host.is_byte_compiled(op),
            name: self.host.call_name(call),
            call_id: self.call_of_kind(0),
            parent_call_id: self.call_of_kind(1),
            parent: self.stack_parent(1),
            in_prom_id: self.promise_of_kind(0),
            call_ptr: self.host.address(rho),
            definition_location: self.host.definition_location(op),
            callsite_location: self.host.callsite_location(0),
            formal_parameter_count: self.host.primitive_arity(op),
            return_value_type: Some(self.host.type_of(retval)),
        }
    }

    pub fn promise_created(&mut self, promise: H::Ref) -> PromiseCreateInfo {
        let key = self.keys.promise_key(self.host, promise);
        let prom_id = self.session.registry.create_promise_id(key, true);
        let in_call_id = self.call_of_kind(0);
        if prom_id.is_valid() {
            self.session.registry.set_promise_origin(prom_id, in_call_id);
        }

        let code = self.host.promise_code(promise);
        let expression = if self.config.compute_promise_expressions {
            self.deparse_quietly(code)
        } else {
            EXPRESSION_NOT_COMPUTED.to_string()
        };

        PromiseCreateInfo {
            prom_id,
            prom_type: self.host.type_of(code),
            full_type: promise_full_type(self.host, promise),
            parent: self.stack_parent(0),
            in_prom_id: self.promise_of_kind(0),
            in_call_id,
            depth: self.session.promise_depth(),
            expression,
        }
    }

    pub fn promise(&mut self, promise: H::Ref, phase: PromisePhase) -> PromiseInfo {
        let prom_id = self.promise_id(promise);
        let code = self.host.promise_code(promise);

        // at force exit the promise's own frame is still on top
        let skip = if phase == PromisePhase::ForceExit { 1 } else { 0 };
        let return_type = match phase {
            PromisePhase::ForceEntry | PromisePhase::ExpressionLookup => SexpType::Omega,
            PromisePhase::ForceExit | PromisePhase::Lookup => {
                self.host.type_of(self.host.promise_value(promise))
            }
        };

        PromiseInfo {
            prom_id,
            in_call_id: self.call_of_kind(0),
            from_call_id: self.session.registry.promise_origin(prom_id),
            prom_type: self.host.type_of(code),
            full_type: promise_full_type(self.host, promise),
            return_type,
            parent: self.stack_parent(skip),
            in_prom_id: self.promise_of_kind(skip),
            depth: self.session.promise_depth().saturating_sub(skip),
            declared: self.session.registry.negative_promise_already_inserted(prom_id),
        }
    }
}
