//! `mythos build` - write a compiled code image.

use std::path::PathBuf;

use mythos_drv::{build_file, SessionError};

pub fn execute(file: PathBuf, output: Option<PathBuf>) -> Result<(), SessionError> {
    let out_path = build_file(&file, output.as_deref())?;
    println!("wrote {}", out_path.display());
    Ok(())
}
