//! In-memory host runtime used by the unit and scenario tests.
//!
//! Objects live in a vector and are referred to by index. Promises carry an
//! explicit address so tests can place two different promises on the same
//! address and observe how identities behave under reuse.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::host::{DotsElement, HostRuntime, LookupFailure, SexpType};
use crate::probe_mask::{ProbeMask, ProbeSet};

pub(crate) type ObjRef = usize;

const NIL: ObjRef = 0;
const UNBOUND: ObjRef = 1;

#[derive(Debug, Clone)]
enum Binding {
    Value(ObjRef),
    Active,
}

#[derive(Debug, Clone)]
enum MockObj {
    Nil,
    Symbol(String),
    Language(String),
    Value(SexpType),
    Bytecode(ObjRef),
    Promise {
        address: usize,
        code: ObjRef,
        env: ObjRef,
        value: ObjRef,
    },
    Closure {
        formals: Vec<String>,
        body: String,
        namespace: Option<String>,
        location: Option<String>,
        compiled: bool,
    },
    Primitive {
        name: String,
        arity: i32,
        kind: SexpType,
    },
    Environment(HashMap<String, Binding>),
    Dots(Vec<(Option<String>, ObjRef)>),
    Call(Option<String>, String),
}

#[derive(Debug, Default)]
pub(crate) struct MockHost {
    objects: Vec<MockObj>,
    callsite: Option<String>,
    mask: Option<ProbeMask>,
    deparsed: RefCell<Vec<String>>,
    /// Whether the expression-lookup probe was masked at each deparse.
    deparse_masked: RefCell<Vec<bool>>,
}

impl MockHost {
    pub(crate) fn new() -> Self {
        let mut host = MockHost::default();
        host.objects.push(MockObj::Nil);
        host.objects.push(MockObj::Symbol("<unbound>".to_string()));
        host
    }

    fn alloc(&mut self, obj: MockObj) -> ObjRef {
        self.objects.push(obj);
        self.objects.len() - 1
    }

    pub(crate) fn nil(&self) -> ObjRef {
        NIL
    }

    pub(crate) fn env(&mut self) -> ObjRef {
        self.alloc(MockObj::Environment(HashMap::new()))
    }

    pub(crate) fn symbol(&mut self, name: &str) -> ObjRef {
        self.alloc(MockObj::Symbol(name.to_string()))
    }

    pub(crate) fn language(&mut self, text: &str) -> ObjRef {
        self.alloc(MockObj::Language(text.to_string()))
    }

    pub(crate) fn value(&mut self, ty: SexpType) -> ObjRef {
        self.alloc(MockObj::Value(ty))
    }

    pub(crate) fn bytecode(&mut self, expr: ObjRef) -> ObjRef {
        self.alloc(MockObj::Bytecode(expr))
    }

    pub(crate) fn promise_at(&mut self, address: usize, code: ObjRef, env: ObjRef) -> ObjRef {
        self.alloc(MockObj::Promise {
            address,
            code,
            env,
            value: UNBOUND,
        })
    }

    /// Unevaluated promise of `text` on an address of its own.
    pub(crate) fn promise(&mut self, text: &str, env: ObjRef) -> ObjRef {
        let code = self.language(text);
        let address = 0x10_0000 + self.objects.len() * 16;
        self.promise_at(address, code, env)
    }

    pub(crate) fn closure(&mut self, formals: &[&str], body: &str) -> ObjRef {
        self.alloc(MockObj::Closure {
            formals: formals.iter().map(|f| f.to_string()).collect(),
            body: body.to_string(),
            namespace: None,
            location: None,
            compiled: false,
        })
    }

    pub(crate) fn set_namespace(&mut self, function: ObjRef, namespace: &str) {
        if let Some(MockObj::Closure { namespace: ns, .. }) = self.objects.get_mut(function) {
            *ns = Some(namespace.to_string());
        }
    }

    pub(crate) fn set_location(&mut self, function: ObjRef, location: &str) {
        if let Some(MockObj::Closure { location: loc, .. }) = self.objects.get_mut(function) {
            *loc = Some(location.to_string());
        }
    }

    pub(crate) fn set_compiled(&mut self, function: ObjRef) {
        if let Some(MockObj::Closure { compiled, .. }) = self.objects.get_mut(function) {
            *compiled = true;
        }
    }

    pub(crate) fn primitive(&mut self, name: &str, arity: i32, kind: SexpType) -> ObjRef {
        self.alloc(MockObj::Primitive {
            name: name.to_string(),
            arity,
            kind,
        })
    }

    pub(crate) fn call(&mut self, name: &str, text: &str) -> ObjRef {
        self.alloc(MockObj::Call(Some(name.to_string()), text.to_string()))
    }

    pub(crate) fn anonymous_call(&mut self, text: &str) -> ObjRef {
        self.alloc(MockObj::Call(None, text.to_string()))
    }

    pub(crate) fn dots_of(&mut self, elements: &[(Option<&str>, ObjRef)]) -> ObjRef {
        let elements = elements
            .iter()
            .map(|(tag, value)| (tag.map(|t| t.to_string()), *value))
            .collect();
        self.alloc(MockObj::Dots(elements))
    }

    pub(crate) fn bind(&mut self, env: ObjRef, name: &str, value: ObjRef) {
        if let Some(MockObj::Environment(bindings)) = self.objects.get_mut(env) {
            bindings.insert(name.to_string(), Binding::Value(value));
        }
    }

    pub(crate) fn bind_active(&mut self, env: ObjRef, name: &str) {
        if let Some(MockObj::Environment(bindings)) = self.objects.get_mut(env) {
            bindings.insert(name.to_string(), Binding::Active);
        }
    }

    /// Store `value` as the promise's cached value.
    pub(crate) fn resolve(&mut self, promise: ObjRef, value: ObjRef) {
        if let Some(MockObj::Promise { value: slot, .. }) = self.objects.get_mut(promise) {
            *slot = value;
        }
    }

    pub(crate) fn set_callsite(&mut self, location: &str) {
        self.callsite = Some(location.to_string());
    }

    pub(crate) fn watch_mask(&mut self, mask: ProbeMask) {
        self.mask = Some(mask);
    }

    pub(crate) fn deparse_count(&self) -> usize {
        self.deparsed.borrow().len()
    }

    pub(crate) fn deparse_masked(&self) -> Vec<bool> {
        self.deparse_masked.borrow().clone()
    }
}

impl HostRuntime for MockHost {
    type Ref = ObjRef;

    fn is_null(&self, obj: ObjRef) -> bool {
        obj == NIL
    }

    fn type_of(&self, obj: ObjRef) -> SexpType {
        match self.objects.get(obj) {
            None | Some(MockObj::Nil) => SexpType::Nil,
            Some(MockObj::Symbol(_)) => SexpType::Symbol,
            Some(MockObj::Language(_)) | Some(MockObj::Call(..)) => SexpType::Language,
            Some(MockObj::Value(ty)) => *ty,
            Some(MockObj::Bytecode(_)) => SexpType::Bytecode,
            Some(MockObj::Promise { .. }) => SexpType::Promise,
            Some(MockObj::Closure { .. }) => SexpType::Closure,
            Some(MockObj::Primitive { kind, .. }) => *kind,
            Some(MockObj::Environment(_)) => SexpType::Environment,
            Some(MockObj::Dots(_)) => SexpType::Dot,
        }
    }

    fn address(&self, obj: ObjRef) -> usize {
        match self.objects.get(obj) {
            Some(MockObj::Promise { address, .. }) => *address,
            _ => 0x1000 + obj * 16,
        }
    }

    fn promise_code(&self, promise: ObjRef) -> ObjRef {
        match self.objects.get(promise) {
            Some(MockObj::Promise { code, .. }) => *code,
            _ => NIL,
        }
    }

    fn promise_env(&self, promise: ObjRef) -> ObjRef {
        match self.objects.get(promise) {
            Some(MockObj::Promise { env, .. }) => *env,
            _ => NIL,
        }
    }

    fn promise_value(&self, promise: ObjRef) -> ObjRef {
        match self.objects.get(promise) {
            Some(MockObj::Promise { value, .. }) => *value,
            _ => UNBOUND,
        }
    }

    fn bytecode_expr(&self, code: ObjRef) -> ObjRef {
        match self.objects.get(code) {
            Some(MockObj::Bytecode(expr)) => *expr,
            _ => NIL,
        }
    }

    fn formals(&self, function: ObjRef) -> Vec<String> {
        match self.objects.get(function) {
            Some(MockObj::Closure { formals, .. }) => formals.clone(),
            _ => Vec::new(),
        }
    }

    fn is_byte_compiled(&self, function: ObjRef) -> bool {
        matches!(
            self.objects.get(function),
            Some(MockObj::Closure { compiled: true, .. })
        )
    }

    fn primitive_arity(&self, function: ObjRef) -> i32 {
        match self.objects.get(function) {
            Some(MockObj::Primitive { arity, .. }) => *arity,
            _ => -1,
        }
    }

    fn namespace_name(&self, function: ObjRef) -> Option<String> {
        match self.objects.get(function) {
            Some(MockObj::Closure { namespace, .. }) => namespace.clone(),
            _ => None,
        }
    }

    fn definition_location(&self, function: ObjRef) -> Option<String> {
        match self.objects.get(function) {
            Some(MockObj::Closure { location, .. }) => location.clone(),
            _ => None,
        }
    }

    fn call_name(&self, call: ObjRef) -> Option<String> {
        match self.objects.get(call) {
            Some(MockObj::Call(name, _)) => name.clone(),
            _ => None,
        }
    }

    fn callsite_location(&self, _frame_offset: usize) -> Option<String> {
        self.callsite.clone()
    }

    fn lookup_binding(&self, env: ObjRef, name: &str) -> Result<ObjRef, LookupFailure> {
        match self.objects.get(env) {
            Some(MockObj::Environment(bindings)) => match bindings.get(name) {
                Some(Binding::Value(value)) if *value == UNBOUND => {
                    Err(LookupFailure::UnboundValue)
                }
                Some(Binding::Value(value)) => Ok(*value),
                Some(Binding::Active) => Err(LookupFailure::ActiveBinding),
                None => Err(LookupFailure::NotFound),
            },
            _ => Err(LookupFailure::EnvironmentIsNil),
        }
    }

    fn symbol_name(&self, symbol: ObjRef) -> Option<String> {
        match self.objects.get(symbol) {
            Some(MockObj::Symbol(name)) => Some(name.clone()),
            _ => None,
        }
    }

    fn dots(&self, dots: ObjRef) -> Vec<DotsElement<ObjRef>> {
        match self.objects.get(dots) {
            Some(MockObj::Dots(elements)) => elements
                .iter()
                .map(|(tag, value)| DotsElement {
                    tag: tag.clone(),
                    value: *value,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn deparse(&self, obj: ObjRef) -> String {
        let text = match self.objects.get(obj) {
            None | Some(MockObj::Nil) => "NULL".to_string(),
            Some(MockObj::Symbol(name)) => name.clone(),
            Some(MockObj::Language(text)) | Some(MockObj::Call(_, text)) => text.clone(),
            Some(MockObj::Value(ty)) => format!("<{:?}>", ty),
            Some(MockObj::Bytecode(expr)) => format!("<bytecode: {}>", self.deparse(*expr)),
            Some(MockObj::Promise { .. }) => "<promise>".to_string(),
            Some(MockObj::Closure { formals, body, .. }) => {
                format!("function({}) {}", formals.join(", "), body)
            }
            Some(MockObj::Primitive { name, .. }) => format!(".Primitive(\"{}\")", name),
            Some(MockObj::Environment(_)) => "<environment>".to_string(),
            Some(MockObj::Dots(_)) => "...".to_string(),
        };
        let masked = self
            .mask
            .as_ref()
            .map(|mask| !mask.is_enabled(ProbeSet::PROMISE_EXPRESSION_LOOKUP))
            .unwrap_or(false);
        self.deparse_masked.borrow_mut().push(masked);
        self.deparsed.borrow_mut().push(text.clone());
        text
    }
}
