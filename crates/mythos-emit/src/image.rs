//! On-disk code object images.
//!
//! `mythos build` serialises the top-level [`CodeObject`] into a
//! versioned JSON document; the loader verifies the magic and version
//! before handing the code back to the VM. JSON is sufficient here
//! because constants originate from source literals, so the pool never
//! contains NaN or infinity.

use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::code::CodeObject;

/// Magic tag identifying a Mythos code image.
pub const IMAGE_MAGIC: &str = "mythc";

/// Current image format version.
pub const IMAGE_VERSION: u32 = 1;

/// Conventional file extension for compiled images.
pub const IMAGE_EXTENSION: &str = "mythc";

#[derive(Serialize, Deserialize)]
struct Image {
    magic: String,
    version: u32,
    code: Rc<CodeObject>,
}

/// Errors from saving or loading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read or write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed image: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("not a Mythos code image (bad magic)")]
    BadMagic,

    #[error("unsupported image version {0} (expected {IMAGE_VERSION})")]
    UnsupportedVersion(u32),
}

/// Serialise a code object to the image text format.
pub fn to_image_string(code: &Rc<CodeObject>) -> Result<String, ImageError> {
    let image = Image {
        magic: IMAGE_MAGIC.to_string(),
        version: IMAGE_VERSION,
        code: Rc::clone(code),
    };
    Ok(serde_json::to_string(&image)?)
}

/// Parse an image produced by [`to_image_string`].
pub fn from_image_str(text: &str) -> Result<Rc<CodeObject>, ImageError> {
    let image: Image = serde_json::from_str(text)?;
    if image.magic != IMAGE_MAGIC {
        return Err(ImageError::BadMagic);
    }
    if image.version != IMAGE_VERSION {
        return Err(ImageError::UnsupportedVersion(image.version));
    }
    Ok(image.code)
}

/// Write a code object image to disk.
pub fn save_image(code: &Rc<CodeObject>, path: &Path) -> Result<(), ImageError> {
    let text = to_image_string(code)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Load a code object image from disk.
pub fn load_image(path: &Path) -> Result<Rc<CodeObject>, ImageError> {
    let text = std::fs::read_to_string(path)?;
    from_image_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Constant, Inst, Op};
    use mythos_util::Span;

    fn sample_code() -> Rc<CodeObject> {
        let inner = Rc::new(CodeObject {
            name: "f".into(),
            params: vec!["a".into()],
            num_locals: 1,
            local_names: vec!["a".into()],
            instructions: vec![
                Inst {
                    op: Op::LoadLocal(0),
                    span: Span::new(0, 1, 1, 1),
                },
                Inst {
                    op: Op::Return,
                    span: Span::new(0, 1, 1, 1),
                },
            ],
            consts: vec![],
            names: vec![],
            protos: vec![],
            classes: vec![],
            upvals: vec![],
        });
        Rc::new(CodeObject {
            name: "<main>".into(),
            params: vec![],
            num_locals: 0,
            local_names: vec![],
            instructions: vec![
                Inst {
                    op: Op::MakeFunction(0),
                    span: Span::new(0, 1, 1, 1),
                },
                Inst {
                    op: Op::StoreGlobal(0),
                    span: Span::new(0, 1, 1, 1),
                },
                Inst {
                    op: Op::LoadConst(0),
                    span: Span::new(0, 1, 1, 1),
                },
                Inst {
                    op: Op::Return,
                    span: Span::new(0, 1, 1, 1),
                },
            ],
            consts: vec![Constant::Null],
            names: vec!["f".into()],
            protos: vec![inner],
            classes: vec![],
            upvals: vec![],
        })
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let code = sample_code();
        let text = to_image_string(&code).unwrap();
        let loaded = from_image_str(&text).unwrap();
        assert_eq!(*loaded, *code);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let code = sample_code();
        let text = to_image_string(&code).unwrap().replace("mythc", "nope!");
        assert!(matches!(from_image_str(&text), Err(ImageError::BadMagic)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let code = sample_code();
        let text = to_image_string(&code)
            .unwrap()
            .replace("\"version\":1", "\"version\":99");
        assert!(matches!(
            from_image_str(&text),
            Err(ImageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            from_image_str("{not json"),
            Err(ImageError::Malformed(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.mythc");
        let code = sample_code();
        save_image(&code, &path).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(*loaded, *code);
    }
}
