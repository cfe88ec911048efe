//! mythos-emit - Bytecode compilation for Mythos.
//!
//! The third phase of the pipeline: a tree walk over the parsed AST that
//! produces a [`CodeObject`] per function for the stack VM to execute.
//!
//! ```text
//! AST --> [Emitter] --> CodeObject --> [VM]
//! ```
//!
//! The crate also owns the instruction set ([`Op`]), the constant pool
//! model, a disassembler for `--emit bytecode`, and the versioned
//! on-disk image format written by `mythos build`.

pub mod code;
mod edge_cases;
pub mod emit;
pub mod image;

pub use code::{ClassProto, CodeObject, Constant, Inst, Op, UpvalDesc};
pub use emit::compile;
pub use image::{
    from_image_str, load_image, save_image, to_image_string, ImageError, IMAGE_EXTENSION,
    IMAGE_MAGIC, IMAGE_VERSION,
};
