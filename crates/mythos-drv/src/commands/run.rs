//! `mythos run` - compile and execute a file.

use std::path::PathBuf;

use mythos_drv::{Config, EmitKind, Session, SessionError};

pub fn execute(file: PathBuf, emit: Option<EmitKind>) -> Result<(), SessionError> {
    let config = Config {
        emit: emit.unwrap_or_default(),
    };
    let mut session = Session::new(config);
    if let Some(dump) = session.run_file(&file)? {
        print!("{}", dump);
    }
    Ok(())
}
