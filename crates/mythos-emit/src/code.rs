//! Bytecode data model: opcodes, constants, and code objects.
//!
//! A [`CodeObject`] is the immutable result of compiling one function
//! (the top-level program is itself a zero-parameter function). It owns
//! a flat instruction list, a constant pool, a name table for
//! global/member access, nested function prototypes, and class
//! prototypes. Every instruction carries the span of the source that
//! produced it so runtime errors can be localised.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use mythos_util::Span;

/// A single instruction with its source position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub op: Op,
    pub span: Span,
}

/// The instruction set of the Mythos virtual machine.
///
/// Jump operands are signed offsets relative to the instruction after
/// the jump (the VM has already advanced `ip` when it applies them).
/// Name operands index the owning code object's [`CodeObject::names`]
/// table; constant operands index [`CodeObject::consts`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Push `consts[k]`.
    LoadConst(u32),

    /// Push the value of local slot `s`.
    LoadLocal(u32),
    /// Pop into local slot `s`.
    StoreLocal(u32),
    /// Push the global named `names[n]`; `NameError` if absent.
    LoadGlobal(u32),
    /// Pop into the global named `names[n]`.
    StoreGlobal(u32),
    /// Push the value of upvalue `u`.
    LoadUpval(u32),
    /// Pop into upvalue `u`.
    StoreUpval(u32),

    /// Discard the top of stack.
    Pop,
    /// Duplicate the top of stack.
    Dup,
    /// Duplicate the top two stack slots.
    Dup2,

    /// Arithmetic; `Add` also concatenates strings.
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// Numeric negation.
    Neg,

    /// Comparisons push a `Bool`.
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Truthiness negation.
    Not,

    /// Unconditional relative jump.
    Jump(i32),
    /// Pop; jump if the value is falsy.
    JumpIfFalse(i32),
    /// Pop; jump if the value is truthy.
    JumpIfTrue(i32),

    /// Call with `argc` arguments; stack is `[callee, args...]`.
    Call(u8),
    /// Bound call: stack is `[recv, args...]`; the method name comes
    /// from the name table and the receiver becomes `this`.
    CallMethod { name: u32, argc: u8 },
    /// Return the top of stack to the caller.
    Return,

    /// Instantiate `protos[p]` as a closure, capturing upvalues from
    /// the current frame.
    MakeFunction(u32),

    /// Pop `n` elements into a new array.
    MakeArray(u32),
    /// Pop `n` key/value pairs into a new insertion-ordered object.
    MakeObject(u32),

    /// Pop an object; push its member `names[n]`.
    GetMember(u32),
    /// Pop value and object; set member; push the value back.
    SetMember(u32),
    /// Pop index and object; push the element.
    GetIndex,
    /// Pop value, index, and object; store; push the value back.
    SetIndex,

    /// Pop the base class (or null); build `classes[c]`; push the class.
    MakeClass(u32),
    /// Pop `argc` args and a class; allocate, run `constructor`, push
    /// the instance.
    New(u8),
    /// Push the current frame's `this` (local slot 0 of a method).
    LoadThis,
    /// Push the method `names[n]` resolved against the base of the
    /// class that defined the currently executing method.
    LoadSuper(u32),

    /// Register an exception handler covering code until `PopTry`.
    PushTry {
        catch: Option<i32>,
        finally: Option<i32>,
    },
    /// Deregister the innermost handler.
    PopTry,
    /// Pop a value and raise it.
    Throw,
    /// End of an exceptional-entry finally block: resume unwinding with
    /// the pending error.
    EndFinally,

    /// Pop an iterable; push an iterator over it.
    GetIter,
    /// Advance the iterator on top of the stack: push the next value,
    /// or pop the iterator and jump when exhausted.
    ForIter(i32),
}

impl Op {
    /// Uppercase mnemonic, used by the disassembler.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::LoadConst(_) => "LOAD_CONST",
            Op::LoadLocal(_) => "LOAD_LOCAL",
            Op::StoreLocal(_) => "STORE_LOCAL",
            Op::LoadGlobal(_) => "LOAD_GLOBAL",
            Op::StoreGlobal(_) => "STORE_GLOBAL",
            Op::LoadUpval(_) => "LOAD_UPVAL",
            Op::StoreUpval(_) => "STORE_UPVAL",
            Op::Pop => "POP",
            Op::Dup => "DUP",
            Op::Dup2 => "DUP2",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Pow => "POW",
            Op::Neg => "NEG",
            Op::Eq => "EQ",
            Op::Ne => "NE",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::Le => "LE",
            Op::Ge => "GE",
            Op::Not => "NOT",
            Op::Jump(_) => "JUMP",
            Op::JumpIfFalse(_) => "JUMP_IF_FALSE",
            Op::JumpIfTrue(_) => "JUMP_IF_TRUE",
            Op::Call(_) => "CALL",
            Op::CallMethod { .. } => "CALL_METHOD",
            Op::Return => "RETURN",
            Op::MakeFunction(_) => "MAKE_FUNCTION",
            Op::MakeArray(_) => "MAKE_ARRAY",
            Op::MakeObject(_) => "MAKE_OBJECT",
            Op::GetMember(_) => "GET_MEMBER",
            Op::SetMember(_) => "SET_MEMBER",
            Op::GetIndex => "GET_INDEX",
            Op::SetIndex => "SET_INDEX",
            Op::MakeClass(_) => "MAKE_CLASS",
            Op::New(_) => "NEW",
            Op::LoadThis => "LOAD_THIS",
            Op::LoadSuper(_) => "LOAD_SUPER",
            Op::PushTry { .. } => "PUSH_TRY",
            Op::PopTry => "POP_TRY",
            Op::Throw => "THROW",
            Op::EndFinally => "END_FINALLY",
            Op::GetIter => "GET_ITER",
            Op::ForIter(_) => "FOR_ITER",
        }
    }
}

/// A compile-time constant in the pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Null => write!(f, "null"),
        }
    }
}

/// How a closure captures one upvalue at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvalDesc {
    /// `true`: capture local slot `index` of the enclosing frame.
    /// `false`: forward upvalue `index` of the enclosing closure.
    pub is_local: bool,
    pub index: u32,
}

/// Compile-time description of a class declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassProto {
    pub name: String,
    /// Method name plus index into the owning code object's `protos`.
    pub methods: Vec<(String, u32)>,
}

/// The immutable output of compiling one function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeObject {
    /// Function name, `<main>` for the program, `<lambda>` for arrows.
    pub name: String,

    /// Declared parameter names, in order. Methods have `this` first.
    pub params: Vec<String>,

    /// Total local slot count, parameters included.
    pub num_locals: u32,

    /// Declared local variable names, slot-indexed.
    pub local_names: Vec<String>,

    /// The instruction list.
    pub instructions: Vec<Inst>,

    /// Constant pool.
    pub consts: Vec<Constant>,

    /// Interned global / member / method names.
    pub names: Vec<String>,

    /// Nested function prototypes referenced by `MakeFunction` and
    /// class methods.
    pub protos: Vec<Rc<CodeObject>>,

    /// Class prototypes referenced by `MakeClass`.
    pub classes: Vec<ClassProto>,

    /// Descriptors for the upvalues this function captures, consumed by
    /// the enclosing frame's `MakeFunction`.
    pub upvals: Vec<UpvalDesc>,
}

impl CodeObject {
    /// Human-readable listing of this code object and its nested
    /// prototypes.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out);
        out
    }

    fn disassemble_into(&self, out: &mut String) {
        use std::fmt::Write;

        let _ = writeln!(out, "== {} ({} params, {} locals) ==", self.name, self.params.len(), self.num_locals);
        let mut last_line = 0;
        for (offset, inst) in self.instructions.iter().enumerate() {
            let line = if inst.span.line != last_line {
                last_line = inst.span.line;
                format!("{:4}", inst.span.line)
            } else {
                "   |".to_string()
            };
            let _ = write!(out, "{:04} {} {:<14}", offset, line, inst.op.mnemonic());
            match &inst.op {
                Op::LoadConst(k) => {
                    let _ = write!(out, " {:<4} ; {}", k, self.consts[*k as usize]);
                }
                Op::LoadLocal(s) | Op::StoreLocal(s) => {
                    let name = self
                        .local_names
                        .get(*s as usize)
                        .map(String::as_str)
                        .unwrap_or("?");
                    let _ = write!(out, " {:<4} ; {}", s, name);
                }
                Op::LoadGlobal(n)
                | Op::StoreGlobal(n)
                | Op::GetMember(n)
                | Op::SetMember(n)
                | Op::LoadSuper(n) => {
                    let _ = write!(out, " {:<4} ; {}", n, self.names[*n as usize]);
                }
                Op::LoadUpval(u) | Op::StoreUpval(u) => {
                    let _ = write!(out, " {}", u);
                }
                Op::Jump(off) | Op::JumpIfFalse(off) | Op::JumpIfTrue(off) | Op::ForIter(off) => {
                    let target = offset as i64 + 1 + *off as i64;
                    let _ = write!(out, " {:<4} ; -> {:04}", off, target);
                }
                Op::Call(argc) | Op::New(argc) => {
                    let _ = write!(out, " {}", argc);
                }
                Op::CallMethod { name, argc } => {
                    let _ = write!(out, " {:<4} {} ; {}", name, argc, self.names[*name as usize]);
                }
                Op::MakeFunction(p) => {
                    let _ = write!(out, " {:<4} ; {}", p, self.protos[*p as usize].name);
                }
                Op::MakeArray(n) | Op::MakeObject(n) => {
                    let _ = write!(out, " {}", n);
                }
                Op::MakeClass(c) => {
                    let _ = write!(out, " {:<4} ; {}", c, self.classes[*c as usize].name);
                }
                Op::PushTry { catch, finally } => {
                    let show = |slot: &Option<i32>| match slot {
                        Some(off) => format!("{:04}", offset as i64 + 1 + *off as i64),
                        None => "----".to_string(),
                    };
                    let _ = write!(out, " catch -> {} finally -> {}", show(catch), show(finally));
                }
                _ => {}
            }
            let _ = writeln!(out);
        }

        for proto in &self.protos {
            let _ = writeln!(out);
            proto.disassemble_into(out);
        }
    }
}
