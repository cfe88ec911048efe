//! The virtual machine.
//!
//! A single-threaded stack machine. Execution state is the value stack,
//! the call frame stack, and the globals map pre-populated from the
//! builtin registry. The dispatch loop is flat: script calls push a
//! [`Frame`] instead of recursing, so the VM call depth limit is the
//! only recursion bound and deep scripts cannot exhaust the host stack.
//!
//! Locals are heap cells (`Rc<RefCell<Value>>`). Closures capture the
//! cell, not the value, which gives capture-by-reference semantics and
//! keeps captured variables alive after their frame returns.
//!
//! Errors unwind through per-frame handler stacks. A handler with a
//! catch target receives the raised value on the stack; a finally-only
//! handler stashes the error as *pending*, runs the exceptional finally
//! copy, and `END_FINALLY` resumes unwinding.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use mythos_emit::{CodeObject, Constant, Op};
use mythos_util::Span;

use crate::builtins::{self, BuiltinFn, HostEnv};
use crate::error::{ErrorKind, FrameInfo, VmError};
use crate::value::{Class, Closure, Instance, Value, ValueIter};

/// Default call depth limit; a limit error is raised long before the
/// host stack is in danger.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// An exception handler registered by `PUSH_TRY`.
struct TryHandler {
    catch_ip: Option<usize>,
    finally_ip: Option<usize>,
    stack_depth: usize,
}

/// One call activation.
struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    locals: Vec<Rc<RefCell<Value>>>,
    handlers: Vec<TryHandler>,
    /// Value stack height at frame entry; restored on return/unwind.
    stack_base: usize,
    /// Constructor frames discard their return value; the instance was
    /// pushed just below `stack_base` by `NEW`.
    is_ctor: bool,
}

enum Flow {
    Continue,
    Done(Value),
}

/// The Mythos virtual machine.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: FxHashMap<String, Value>,
    host: HostEnv,
    /// Error travelling through an exceptional finally block.
    pending: Option<VmError>,
    max_depth: usize,
}

impl Vm {
    /// A VM wired to stdin/stdout with the default builtin registry.
    pub fn new() -> Self {
        Self::with_host(HostEnv::stdio())
    }

    /// A VM with a custom host environment (tests use a buffered one).
    pub fn with_host(host: HostEnv) -> Self {
        let mut vm = Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: FxHashMap::default(),
            host,
            pending: None,
            max_depth: DEFAULT_MAX_DEPTH,
        };
        for entry in builtins::defaults() {
            vm.install(entry);
        }
        vm
    }

    /// Register a host callable under a global name.
    pub fn register_builtin(
        &mut self,
        name: &str,
        arity_hint: Option<u8>,
        func: impl Fn(&mut HostEnv, &[Value]) -> Result<Value, VmError> + 'static,
    ) {
        self.install(BuiltinFn {
            name: name.to_string(),
            arity_hint,
            func: Box::new(func),
        });
    }

    fn install(&mut self, entry: BuiltinFn) {
        self.globals
            .insert(entry.name.clone(), Value::Builtin(Rc::new(entry)));
    }

    /// Override the call depth limit.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    /// Read a global, mostly for embedders and tests.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Execute a compiled program.
    ///
    /// Globals persist across calls (the REPL relies on this); the value
    /// and frame stacks are reset on entry.
    pub fn run(&mut self, code: Rc<CodeObject>) -> Result<Value, VmError> {
        self.stack.clear();
        self.frames.clear();
        self.pending = None;

        let closure = Rc::new(Closure::new(code, Vec::new()));
        self.push_frame(closure, Vec::new(), false, Span::DUMMY)?;
        self.execute()
    }

    // =========================================================================
    // DISPATCH LOOP
    // =========================================================================

    fn execute(&mut self) -> Result<Value, VmError> {
        loop {
            let (op, span) = {
                let frame = self.frames.last().expect("no active frame");
                let inst = &frame.closure.code.instructions[frame.ip];
                (inst.op.clone(), inst.span)
            };
            self.frames.last_mut().expect("no active frame").ip += 1;

            match self.step(op, span) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Done(value)) => return Ok(value),
                Err(err) => self.unwind(err)?,
            }
        }
    }

    fn step(&mut self, op: Op, span: Span) -> Result<Flow, VmError> {
        match op {
            Op::LoadConst(k) => {
                let value = {
                    let code = &self.frames.last().expect("no frame").closure.code;
                    const_value(&code.consts[k as usize])
                };
                self.stack.push(value);
            }
            Op::LoadLocal(slot) => {
                let frame = self.frames.last().expect("no frame");
                let value = frame.locals[slot as usize].borrow().clone();
                self.stack.push(value);
            }
            Op::StoreLocal(slot) => {
                let value = self.pop();
                let frame = self.frames.last().expect("no frame");
                *frame.locals[slot as usize].borrow_mut() = value;
            }
            Op::LoadGlobal(n) => {
                let name = self.name_at(n);
                match self.globals.get(&name) {
                    Some(value) => {
                        let value = value.clone();
                        self.stack.push(value);
                    }
                    None => {
                        return Err(VmError::name_error(
                            format!("name '{}' is not defined", name),
                            span,
                        ))
                    }
                }
            }
            Op::StoreGlobal(n) => {
                let name = self.name_at(n);
                let value = self.pop();
                self.globals.insert(name, value);
            }
            Op::LoadUpval(u) => {
                let frame = self.frames.last().expect("no frame");
                let value = frame.closure.upvalues[u as usize].borrow().clone();
                self.stack.push(value);
            }
            Op::StoreUpval(u) => {
                let value = self.pop();
                let frame = self.frames.last().expect("no frame");
                *frame.closure.upvalues[u as usize].borrow_mut() = value;
            }

            Op::Pop => {
                self.pop();
            }
            Op::Dup => {
                let top = self.stack.last().expect("operand stack underflow").clone();
                self.stack.push(top);
            }
            Op::Dup2 => {
                let len = self.stack.len();
                let a = self.stack[len - 2].clone();
                let b = self.stack[len - 1].clone();
                self.stack.push(a);
                self.stack.push(b);
            }

            Op::Add => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(add_values(&lhs, &rhs, span)?);
            }
            Op::Sub => self.numeric_binop("-", span, |a, b| a - b)?,
            Op::Mul => self.numeric_binop("*", span, |a, b| a * b)?,
            Op::Div => self.numeric_binop("/", span, |a, b| a / b)?,
            Op::Mod => self.numeric_binop("%", span, |a, b| a % b)?,
            Op::Pow => self.numeric_binop("^", span, f64::powf)?,
            Op::Neg => {
                let value = self.pop();
                match value {
                    Value::Number(n) => self.stack.push(Value::Number(-n)),
                    other => {
                        return Err(VmError::type_error(
                            format!("cannot negate {}", other.type_name()),
                            span,
                        ))
                    }
                }
            }

            Op::Eq => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(Value::Bool(lhs.equals(&rhs)));
            }
            Op::Ne => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(Value::Bool(!lhs.equals(&rhs)));
            }
            Op::Lt => self.compare_op("<", span, |o| o == std::cmp::Ordering::Less)?,
            Op::Gt => self.compare_op(">", span, |o| o == std::cmp::Ordering::Greater)?,
            Op::Le => self.compare_op("<=", span, |o| o != std::cmp::Ordering::Greater)?,
            Op::Ge => self.compare_op(">=", span, |o| o != std::cmp::Ordering::Less)?,
            Op::Not => {
                let value = self.pop();
                self.stack.push(Value::Bool(!value.is_truthy()));
            }

            Op::Jump(off) => self.jump(off),
            Op::JumpIfFalse(off) => {
                let value = self.pop();
                if !value.is_truthy() {
                    self.jump(off);
                }
            }
            Op::JumpIfTrue(off) => {
                let value = self.pop();
                if value.is_truthy() {
                    self.jump(off);
                }
            }

            Op::Call(argc) => {
                let args = self.drain_args(argc as usize);
                let callee = self.pop();
                self.call_value(callee, args, span)?;
            }
            Op::CallMethod { name, argc } => self.call_method(name, argc, span)?,
            Op::Return => {
                let value = self.pop();
                let frame = self.frames.pop().expect("no frame to return from");
                self.stack.truncate(frame.stack_base);
                if frame.is_ctor {
                    // the instance is already on the stack; the
                    // constructor's return value is discarded
                } else if self.frames.is_empty() {
                    return Ok(Flow::Done(value));
                } else {
                    self.stack.push(value);
                }
            }

            Op::MakeFunction(p) => {
                let closure = self.make_closure(p);
                self.stack.push(Value::Function(closure));
            }

            Op::MakeArray(n) => {
                let elements = self.drain_args(n as usize);
                self.stack.push(Value::Array(Rc::new(RefCell::new(elements))));
            }
            Op::MakeObject(n) => {
                let mut flat = self.drain_args(2 * n as usize);
                let mut map = IndexMap::with_capacity(n as usize);
                for pair in flat.chunks_exact_mut(2) {
                    let key = match &pair[0] {
                        Value::Str(s) => s.to_string(),
                        other => {
                            return Err(VmError::type_error(
                                format!("object key must be a string, got {}", other.type_name()),
                                span,
                            ))
                        }
                    };
                    map.insert(key, pair[1].clone());
                }
                self.stack.push(Value::Object(Rc::new(RefCell::new(map))));
            }

            Op::GetMember(n) => {
                let name = self.name_at(n);
                let object = self.pop();
                let value = get_member(&object, &name, span)?;
                self.stack.push(value);
            }
            Op::SetMember(n) => {
                let name = self.name_at(n);
                let value = self.pop();
                let object = self.pop();
                match &object {
                    Value::Object(map) => {
                        map.borrow_mut().insert(name, value.clone());
                    }
                    Value::Instance(instance) => {
                        instance.fields.borrow_mut().insert(name, value.clone());
                    }
                    other => {
                        return Err(VmError::type_error(
                            format!("cannot set member '{}' on {}", name, other.type_name()),
                            span,
                        ))
                    }
                }
                self.stack.push(value);
            }
            Op::GetIndex => {
                let index = self.pop();
                let object = self.pop();
                self.stack.push(get_index(&object, &index, span)?);
            }
            Op::SetIndex => {
                let value = self.pop();
                let index = self.pop();
                let object = self.pop();
                set_index(&object, &index, value.clone(), span)?;
                self.stack.push(value);
            }

            Op::MakeClass(c) => {
                let proto = {
                    let code = &self.frames.last().expect("no frame").closure.code;
                    code.classes[c as usize].clone()
                };
                let base = match self.pop() {
                    Value::Null => None,
                    Value::Class(base) => Some(base),
                    other => {
                        return Err(VmError::type_error(
                            format!(
                                "base of class {} must be a class, got {}",
                                proto.name,
                                other.type_name()
                            ),
                            span,
                        ))
                    }
                };
                let mut methods = IndexMap::with_capacity(proto.methods.len());
                for (method_name, proto_idx) in &proto.methods {
                    methods.insert(method_name.clone(), self.make_closure(*proto_idx));
                }
                let class = Rc::new(Class {
                    name: proto.name.clone(),
                    methods,
                    base,
                });
                for method in class.methods.values() {
                    *method.owner.borrow_mut() = Some(Rc::clone(&class));
                }
                self.stack.push(Value::Class(class));
            }
            Op::New(argc) => {
                let args = self.drain_args(argc as usize);
                match self.pop() {
                    Value::Class(class) => self.construct(class, args, span)?,
                    other => {
                        return Err(VmError::type_error(
                            format!("{} is not a class", other.type_name()),
                            span,
                        ))
                    }
                }
            }
            Op::LoadThis => {
                let frame = self.frames.last().expect("no frame");
                match frame.locals.first() {
                    Some(cell) => {
                        let value = cell.borrow().clone();
                        self.stack.push(value);
                    }
                    None => {
                        return Err(VmError::type_error("'this' outside of a method", span));
                    }
                }
            }
            Op::LoadSuper(n) => {
                let name = self.name_at(n);
                let owner = {
                    let frame = self.frames.last().expect("no frame");
                    frame.closure.owner.borrow().clone()
                };
                let Some(owner) = owner else {
                    return Err(VmError::type_error("'super' outside of a method", span));
                };
                let Some(base) = owner.base.as_ref() else {
                    return Err(VmError::type_error(
                        format!("class {} has no base class", owner.name),
                        span,
                    ));
                };
                match base.find_method(&name) {
                    Some(method) => self.stack.push(Value::Function(method)),
                    None => {
                        return Err(VmError::type_error(
                            format!("base of class {} has no method '{}'", owner.name, name),
                            span,
                        ))
                    }
                }
            }

            Op::PushTry { catch, finally } => {
                let depth = self.stack.len();
                let frame = self.frames.last_mut().expect("no frame");
                let ip = frame.ip;
                frame.handlers.push(TryHandler {
                    catch_ip: catch.map(|off| offset_ip(ip, off)),
                    finally_ip: finally.map(|off| offset_ip(ip, off)),
                    stack_depth: depth,
                });
            }
            Op::PopTry => {
                let frame = self.frames.last_mut().expect("no frame");
                frame.handlers.pop().expect("POP_TRY without handler");
            }
            Op::Throw => {
                let value = self.pop();
                let message = value.display();
                return Err(VmError::thrown(value, message, span));
            }
            Op::EndFinally => {
                let err = self
                    .pending
                    .take()
                    .expect("END_FINALLY without a pending error");
                return Err(err);
            }

            Op::GetIter => {
                let value = self.pop();
                let iter = match value {
                    Value::Array(array) => ValueIter::Array { array, index: 0 },
                    Value::Object(map) => ValueIter::Keys {
                        keys: map.borrow().keys().cloned().collect(),
                        index: 0,
                    },
                    Value::Str(s) => ValueIter::Chars {
                        chars: s.chars().collect(),
                        index: 0,
                    },
                    Value::Range(range) => ValueIter::Range {
                        next: range.start,
                        end: range.end,
                        step: range.step,
                    },
                    already @ Value::Iter(_) => {
                        self.stack.push(already);
                        return Ok(Flow::Continue);
                    }
                    other => {
                        return Err(VmError::type_error(
                            format!("{} is not iterable", other.type_name()),
                            span,
                        ))
                    }
                };
                self.stack.push(Value::Iter(Rc::new(RefCell::new(iter))));
            }
            Op::ForIter(off) => {
                let next = {
                    match self.stack.last().expect("operand stack underflow") {
                        Value::Iter(iter) => iter.borrow_mut().advance(),
                        other => {
                            return Err(VmError::type_error(
                                format!("{} is not an iterator", other.type_name()),
                                span,
                            ))
                        }
                    }
                };
                match next {
                    Some(value) => self.stack.push(value),
                    None => {
                        self.pop();
                        self.jump(off);
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    fn call_value(&mut self, callee: Value, args: Vec<Value>, span: Span) -> Result<(), VmError> {
        match callee {
            Value::Function(closure) => self.push_frame(closure, args, false, span),
            Value::Builtin(entry) => {
                let result = (entry.func)(&mut self.host, &args).map_err(|e| e.with_span(span))?;
                self.stack.push(result);
                Ok(())
            }
            Value::Class(class) => self.construct(class, args, span),
            other => Err(VmError::type_error(
                format!("{} is not callable", other.type_name()),
                span,
            )),
        }
    }

    fn call_method(&mut self, name: u32, argc: u8, span: Span) -> Result<(), VmError> {
        let method_name = self.name_at(name);
        let recv_idx = self.stack.len() - 1 - argc as usize;
        let recv = self.stack[recv_idx].clone();

        match recv {
            Value::Instance(instance) => {
                let field = instance.fields.borrow().get(&method_name).cloned();
                if let Some(callable) = field {
                    // an own field shadows class methods and is called
                    // as a plain function, without `this`
                    let args = self.drain_args(argc as usize);
                    self.pop();
                    self.call_value(callable, args, span)
                } else if let Some(method) = instance.class.find_method(&method_name) {
                    let mut args = vec![Value::Instance(Rc::clone(&instance))];
                    args.extend(self.drain_args(argc as usize));
                    self.pop();
                    self.push_frame(method, args, false, span)
                } else {
                    Err(VmError::type_error(
                        format!(
                            "{} instance has no method '{}'",
                            instance.class.name, method_name
                        ),
                        span,
                    ))
                }
            }
            Value::Object(map) => {
                // missing members read as null; calling null reports
                // "not callable" like any other non-callable member
                let callable = map.borrow().get(&method_name).cloned().unwrap_or(Value::Null);
                let args = self.drain_args(argc as usize);
                self.pop();
                self.call_value(callable, args, span)
            }
            Value::Class(class) => match class.find_method(&method_name) {
                // unbound call: the caller passes `this` explicitly
                Some(method) => {
                    let args = self.drain_args(argc as usize);
                    self.pop();
                    self.push_frame(method, args, false, span)
                }
                None => Err(VmError::type_error(
                    format!("class {} has no method '{}'", class.name, method_name),
                    span,
                )),
            },
            other => Err(VmError::type_error(
                format!("{} has no methods", other.type_name()),
                span,
            )),
        }
    }

    fn construct(&mut self, class: Rc<Class>, args: Vec<Value>, span: Span) -> Result<(), VmError> {
        let instance = Rc::new(Instance {
            class: Rc::clone(&class),
            fields: RefCell::new(IndexMap::new()),
        });
        match class.find_method("constructor") {
            Some(ctor) => {
                // result slot; the constructor frame sits above it
                self.stack.push(Value::Instance(Rc::clone(&instance)));
                let mut full_args = vec![Value::Instance(instance)];
                full_args.extend(args);
                self.push_frame(ctor, full_args, true, span)
            }
            None => {
                // no constructor: arguments are discarded
                self.stack.push(Value::Instance(instance));
                Ok(())
            }
        }
    }

    fn push_frame(
        &mut self,
        closure: Rc<Closure>,
        args: Vec<Value>,
        is_ctor: bool,
        span: Span,
    ) -> Result<(), VmError> {
        if self.frames.len() >= self.max_depth {
            return Err(VmError::new(
                ErrorKind::Error,
                format!("maximum call depth exceeded ({})", self.max_depth),
                span,
            ));
        }

        let code = &closure.code;
        let num_locals = (code.num_locals as usize).max(code.params.len());
        let num_params = code.params.len();
        let mut locals = Vec::with_capacity(num_locals);
        for index in 0..num_locals {
            // missing arguments fill with null; extras are discarded
            let value = if index < num_params {
                args.get(index).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            locals.push(Rc::new(RefCell::new(value)));
        }

        self.frames.push(Frame {
            closure,
            ip: 0,
            locals,
            handlers: Vec::new(),
            stack_base: self.stack.len(),
            is_ctor,
        });
        Ok(())
    }

    fn make_closure(&self, proto_idx: u32) -> Rc<Closure> {
        let frame = self.frames.last().expect("no frame");
        let proto = Rc::clone(&frame.closure.code.protos[proto_idx as usize]);
        let mut upvalues = Vec::with_capacity(proto.upvals.len());
        for desc in &proto.upvals {
            let cell = if desc.is_local {
                Rc::clone(&frame.locals[desc.index as usize])
            } else {
                Rc::clone(&frame.closure.upvalues[desc.index as usize])
            };
            upvalues.push(cell);
        }
        Rc::new(Closure::new(proto, upvalues))
    }

    // =========================================================================
    // UNWINDING
    // =========================================================================

    /// Route an error to the nearest handler, or return it to the
    /// embedder when no frame can handle it.
    fn unwind(&mut self, mut err: VmError) -> Result<(), VmError> {
        if err.stack.is_empty() {
            err.stack = self.capture_stack();
        }
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Err(err);
            };
            match frame.handlers.pop() {
                Some(handler) => {
                    self.stack.truncate(handler.stack_depth);
                    if let Some(catch_ip) = handler.catch_ip {
                        frame.ip = catch_ip;
                        let value = catch_value(&err);
                        self.stack.push(value);
                        return Ok(());
                    }
                    if let Some(finally_ip) = handler.finally_ip {
                        frame.ip = finally_ip;
                        self.pending = Some(err);
                        return Ok(());
                    }
                }
                None => {
                    let frame = self.frames.pop().expect("frame vanished");
                    self.stack.truncate(frame.stack_base);
                    if frame.is_ctor {
                        // drop the result slot pushed by NEW
                        self.stack.pop();
                    }
                }
            }
        }
    }

    fn capture_stack(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .map(|frame| {
                let ip = frame.ip.saturating_sub(1);
                let span = frame
                    .closure
                    .code
                    .instructions
                    .get(ip)
                    .map(|inst| inst.span)
                    .unwrap_or(Span::DUMMY);
                FrameInfo {
                    function: frame.closure.code.name.clone(),
                    span,
                }
            })
            .collect()
    }

    // =========================================================================
    // SMALL HELPERS
    // =========================================================================

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn drain_args(&mut self, count: usize) -> Vec<Value> {
        let at = self.stack.len() - count;
        self.stack.split_off(at)
    }

    fn jump(&mut self, offset: i32) {
        let frame = self.frames.last_mut().expect("no frame");
        frame.ip = offset_ip(frame.ip, offset);
    }

    fn name_at(&self, index: u32) -> String {
        self.frames.last().expect("no frame").closure.code.names[index as usize].clone()
    }

    fn numeric_binop(
        &mut self,
        op: &str,
        span: Span,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<(), VmError> {
        let rhs = self.pop();
        let lhs = self.pop();
        match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(Value::Number(f(*a, *b)));
                Ok(())
            }
            _ => Err(VmError::type_error(
                format!(
                    "unsupported operand types for {}: {} and {}",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                ),
                span,
            )),
        }
    }

    fn compare_op(
        &mut self,
        op: &str,
        span: Span,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> Result<(), VmError> {
        let rhs = self.pop();
        let lhs = self.pop();
        let result = match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => match a.partial_cmp(b) {
                Some(ordering) => accept(ordering),
                // comparisons involving NaN are false
                None => false,
            },
            (Value::Str(a), Value::Str(b)) => accept(a.cmp(b)),
            _ => {
                return Err(VmError::type_error(
                    format!(
                        "cannot compare {} and {} with {}",
                        lhs.type_name(),
                        rhs.type_name(),
                        op
                    ),
                    span,
                ))
            }
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// FREE HELPERS
// =============================================================================

fn offset_ip(ip: usize, offset: i32) -> usize {
    (ip as i64 + offset as i64) as usize
}

fn const_value(constant: &Constant) -> Value {
    match constant {
        Constant::Number(n) => Value::Number(*n),
        Constant::Str(s) => Value::Str(s.as_str().into()),
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Null => Value::Null,
    }
}

/// The value a catch binding receives.
fn catch_value(err: &VmError) -> Value {
    if let Some(value) = &err.value {
        return value.clone();
    }
    let mut map = IndexMap::new();
    map.insert("kind".to_string(), Value::Str(err.kind.to_string().into()));
    map.insert(
        "message".to_string(),
        Value::Str(err.message.as_str().into()),
    );
    map.insert("line".to_string(), Value::Number(err.span.line as f64));
    map.insert("column".to_string(), Value::Number(err.span.column as f64));
    Value::Object(Rc::new(RefCell::new(map)))
}

fn add_values(lhs: &Value, rhs: &Value, span: Span) -> Result<Value, VmError> {
    use crate::value::format_number;
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b).into())),
        (Value::Str(a), Value::Number(b)) => {
            Ok(Value::Str(format!("{}{}", a, format_number(*b)).into()))
        }
        (Value::Number(a), Value::Str(b)) => {
            Ok(Value::Str(format!("{}{}", format_number(*a), b).into()))
        }
        _ => Err(VmError::type_error(
            format!(
                "unsupported operand types for +: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
            span,
        )),
    }
}

fn get_member(object: &Value, name: &str, span: Span) -> Result<Value, VmError> {
    match object {
        // missing members read as null on dotted access
        Value::Object(map) => Ok(map.borrow().get(name).cloned().unwrap_or(Value::Null)),
        Value::Instance(instance) => {
            if let Some(value) = instance.fields.borrow().get(name) {
                return Ok(value.clone());
            }
            Ok(instance
                .class
                .find_method(name)
                .map(Value::Function)
                .unwrap_or(Value::Null))
        }
        Value::Class(class) => Ok(class
            .find_method(name)
            .map(Value::Function)
            .unwrap_or(Value::Null)),
        other => Err(VmError::type_error(
            format!("cannot read member '{}' of {}", name, other.type_name()),
            span,
        )),
    }
}

fn array_index(index: &Value, span: Span) -> Result<Option<i64>, VmError> {
    match index {
        Value::Number(n) => {
            if n.fract() != 0.0 || !n.is_finite() {
                return Err(VmError::type_error(
                    "array index must be an integer",
                    span,
                ));
            }
            Ok(Some(*n as i64))
        }
        _ => Ok(None),
    }
}

fn get_index(object: &Value, index: &Value, span: Span) -> Result<Value, VmError> {
    match object {
        Value::Array(array) => match array_index(index, span)? {
            Some(i) => {
                // out-of-range reads yield null, not an error
                if i < 0 {
                    return Ok(Value::Null);
                }
                Ok(array.borrow().get(i as usize).cloned().unwrap_or(Value::Null))
            }
            None => Err(VmError::type_error(
                format!("array index must be a number, got {}", index.type_name()),
                span,
            )),
        },
        Value::Object(map) => match index {
            // bracket access on objects is strict
            Value::Str(key) => map.borrow().get(&**key).cloned().ok_or_else(|| {
                VmError::key_error(format!("missing key {:?}", key), span)
            }),
            other => Err(VmError::type_error(
                format!("object key must be a string, got {}", other.type_name()),
                span,
            )),
        },
        Value::Str(s) => match array_index(index, span)? {
            Some(i) => {
                if i < 0 {
                    return Ok(Value::Null);
                }
                Ok(s.chars()
                    .nth(i as usize)
                    .map(|c| Value::Str(c.to_string().into()))
                    .unwrap_or(Value::Null))
            }
            None => Err(VmError::type_error(
                format!("string index must be a number, got {}", index.type_name()),
                span,
            )),
        },
        other => Err(VmError::type_error(
            format!("{} is not indexable", other.type_name()),
            span,
        )),
    }
}

fn set_index(object: &Value, index: &Value, value: Value, span: Span) -> Result<(), VmError> {
    match object {
        Value::Array(array) => match array_index(index, span)? {
            Some(i) => {
                let mut elements = array.borrow_mut();
                let len = elements.len();
                if i < 0 || i as usize >= len {
                    return Err(VmError::index_error(
                        format!("array index {} out of range (len {})", i, len),
                        span,
                    ));
                }
                elements[i as usize] = value;
                Ok(())
            }
            None => Err(VmError::type_error(
                format!("array index must be a number, got {}", index.type_name()),
                span,
            )),
        },
        Value::Object(map) => match index {
            Value::Str(key) => {
                map.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            other => Err(VmError::type_error(
                format!("object key must be a string, got {}", other.type_name()),
                span,
            )),
        },
        other => Err(VmError::type_error(
            format!("cannot index-assign into {}", other.type_name()),
            span,
        )),
    }
}
