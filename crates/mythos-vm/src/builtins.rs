//! The builtin function registry and host environment.
//!
//! Builtins are opaque host callables injected into the global
//! environment before execution. The default set covers console I/O,
//! conversions, and basic math; hosts add their own (graphics, web,
//! physics) through [`crate::Vm::register_builtin`].

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use mythos_util::Span;

use crate::error::VmError;
use crate::value::{RangeValue, Value};

/// Signature of a host callable.
pub type BuiltinImpl = Box<dyn Fn(&mut HostEnv, &[Value]) -> Result<Value, VmError>>;

/// A named host function with an arity hint.
pub struct BuiltinFn {
    pub name: String,
    /// Advisory parameter count; enforcement is up to the callable.
    pub arity_hint: Option<u8>,
    pub func: BuiltinImpl,
}

/// The I/O environment builtins run against.
///
/// Production code uses [`HostEnv::stdio`]; tests capture output with
/// [`HostEnv::buffered`].
pub struct HostEnv {
    pub out: Box<dyn Write>,
    /// Reads one input line, given a prompt that has already been
    /// flushed to `out`.
    pub read_line: Box<dyn FnMut() -> io::Result<String>>,
}

impl HostEnv {
    /// Standard input/output.
    pub fn stdio() -> Self {
        Self {
            out: Box::new(io::stdout()),
            read_line: Box::new(|| {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                Ok(line)
            }),
        }
    }

    /// Captures output into a shared buffer and reads empty input.
    pub fn buffered() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let env = Self {
            out: Box::new(SharedBuf(Rc::clone(&buffer))),
            read_line: Box::new(|| Ok(String::new())),
        };
        (env, buffer)
    }
}

/// `Write` into an `Rc<RefCell<Vec<u8>>>` so tests can inspect output
/// after the VM is done.
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The default registry entries.
pub fn defaults() -> Vec<BuiltinFn> {
    vec![
        builtin("print", None, print),
        builtin("input", Some(1), input),
        builtin("len", Some(1), len),
        builtin("range", Some(2), range),
        builtin("string", Some(1), to_string),
        builtin("number", Some(1), to_number),
        builtin("boolean", Some(1), to_boolean),
        builtin("abs", Some(1), |_, args| num1("abs", args, f64::abs)),
        builtin("sqrt", Some(1), |_, args| num1("sqrt", args, f64::sqrt)),
        builtin("floor", Some(1), |_, args| num1("floor", args, f64::floor)),
        builtin("ceil", Some(1), |_, args| num1("ceil", args, f64::ceil)),
        builtin("round", Some(1), |_, args| num1("round", args, f64::round)),
        builtin("pow", Some(2), pow),
        builtin("min", None, |_, args| fold_numbers("min", args, f64::min)),
        builtin("max", None, |_, args| fold_numbers("max", args, f64::max)),
    ]
}

fn builtin(
    name: &str,
    arity_hint: Option<u8>,
    func: impl Fn(&mut HostEnv, &[Value]) -> Result<Value, VmError> + 'static,
) -> BuiltinFn {
    BuiltinFn {
        name: name.to_string(),
        arity_hint,
        func: Box::new(func),
    }
}

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), VmError> {
    if args.len() != expected {
        return Err(VmError::arity_error(
            format!(
                "{}() takes exactly {} argument{} ({} given)",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
            Span::DUMMY,
        ));
    }
    Ok(())
}

fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64, VmError> {
    match &args[index] {
        Value::Number(n) => Ok(*n),
        other => Err(VmError::type_error(
            format!("{}() expects a number, got {}", name, other.type_name()),
            Span::DUMMY,
        )),
    }
}

fn num1(name: &str, args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, VmError> {
    arity(name, args, 1)?;
    Ok(Value::Number(f(number_arg(name, args, 0)?)))
}

fn fold_numbers(name: &str, args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value, VmError> {
    if args.is_empty() {
        return Err(VmError::arity_error(
            format!("{}() takes at least 1 argument (0 given)", name),
            Span::DUMMY,
        ));
    }
    let mut acc = number_arg(name, args, 0)?;
    for index in 1..args.len() {
        acc = f(acc, number_arg(name, args, index)?);
    }
    Ok(Value::Number(acc))
}

// =============================================================================
// THE DEFAULT SET
// =============================================================================

fn print(host: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    let line = args
        .iter()
        .map(Value::display)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(host.out, "{}", line)
        .map_err(|e| VmError::new(crate::error::ErrorKind::Error, e.to_string(), Span::DUMMY))?;
    Ok(Value::Null)
}

fn input(host: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    if args.len() > 1 {
        return Err(VmError::arity_error(
            format!("input() takes at most 1 argument ({} given)", args.len()),
            Span::DUMMY,
        ));
    }
    if let Some(prompt) = args.first() {
        let text = prompt.display();
        let _ = write!(host.out, "{}", text);
        let _ = host.out.flush();
    }
    let line = (host.read_line)()
        .map_err(|e| VmError::new(crate::error::ErrorKind::Error, e.to_string(), Span::DUMMY))?;
    Ok(Value::Str(line.trim_end_matches(['\n', '\r']).into()))
}

fn len(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    arity("len", args, 1)?;
    let length = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Array(a) => a.borrow().len(),
        Value::Object(o) => o.borrow().len(),
        other => {
            return Err(VmError::type_error(
                format!("len() expects a string, array, or object, got {}", other.type_name()),
                Span::DUMMY,
            ))
        }
    };
    Ok(Value::Number(length as f64))
}

fn range(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    let (start, end, step) = match args.len() {
        1 => (0.0, number_arg("range", args, 0)?, 1.0),
        2 => (
            number_arg("range", args, 0)?,
            number_arg("range", args, 1)?,
            1.0,
        ),
        3 => (
            number_arg("range", args, 0)?,
            number_arg("range", args, 1)?,
            number_arg("range", args, 2)?,
        ),
        given => {
            return Err(VmError::arity_error(
                format!("range() takes 1 to 3 arguments ({} given)", given),
                Span::DUMMY,
            ))
        }
    };
    if step == 0.0 {
        return Err(VmError::type_error("range() step must not be zero", Span::DUMMY));
    }
    Ok(Value::Range(Rc::new(RangeValue { start, end, step })))
}

fn to_string(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    arity("string", args, 1)?;
    Ok(Value::Str(args[0].display().into()))
}

fn to_number(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    arity("number", args, 1)?;
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
            VmError::type_error(format!("cannot convert {:?} to a number", s), Span::DUMMY)
        }),
        other => Err(VmError::type_error(
            format!("cannot convert {} to a number", other.type_name()),
            Span::DUMMY,
        )),
    }
}

fn to_boolean(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    arity("boolean", args, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

fn pow(_: &mut HostEnv, args: &[Value]) -> Result<Value, VmError> {
    arity("pow", args, 2)?;
    let base = number_arg("pow", args, 0)?;
    let exponent = number_arg("pow", args, 1)?;
    Ok(Value::Number(base.powf(exponent)))
}
