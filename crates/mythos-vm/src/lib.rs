//! mythos-vm - The Mythos virtual machine.
//!
//! Final stage of the pipeline: a single-threaded, synchronous stack
//! machine executing [`CodeObject`](mythos_emit::CodeObject)s produced
//! by `mythos-emit`.
//!
//! ```text
//! CodeObject --> [Vm::run] --> Value / VmError
//! ```
//!
//! The crate owns the runtime [`Value`] model, the default builtin
//! registry (`print`, `len`, `range`, ...), and the error values that
//! unwind through call frames. Embedders create a [`Vm`], optionally
//! [`Vm::register_builtin`] host functions, and call [`Vm::run`]; the
//! globals map survives across runs, which is what a REPL needs.

mod builtins;
mod edge_cases;
mod error;
mod machine;
mod value;

pub use builtins::{BuiltinFn, BuiltinImpl, HostEnv};
pub use error::{ErrorKind, FrameInfo, VmError};
pub use machine::{Vm, DEFAULT_MAX_DEPTH};
pub use value::{format_number, Class, Closure, Instance, RangeValue, Value, ValueIter};
