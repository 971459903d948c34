//! Module resolution for `load`.
//!
//! An identifier naming an existing file is loaded directly. Otherwise each
//! search path directory is probed in order, trying `<dir>/<id>.rsn` and then
//! `<dir>/<id><DLL_SUFFIX>`; the first hit wins.

use std::path::{Path, PathBuf};

use crate::{
    config::SCRIPT_SUFFIX,
    diagnostics::Result,
    loader,
    runtime::Interpreter,
    search_path::SearchPath,
    throw,
    value::Value,
};

/// Outcome of looking up an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The identifier itself names a file.
    DirectPath(PathBuf),
    Script(PathBuf),
    Native(PathBuf),
    NotFound,
}

/// Decides what `load(identifier)` would run, without running it.
pub fn resolve(identifier: &str, search_path: Option<&SearchPath>) -> Result<Resolution> {
    let direct = Path::new(identifier);
    if direct.exists() {
        tracing::debug!(identifier, "resolved as direct path");
        return Ok(Resolution::DirectPath(direct.to_path_buf()));
    }
    let Some(search_path) = search_path else {
        throw!(Config, "module search path not defined");
    };
    for dir in search_path.snapshot() {
        let base = Path::new(&dir).join(identifier);
        let script = with_suffix(&base, SCRIPT_SUFFIX);
        tracing::debug!(candidate = %script.display(), "probing script");
        if script.exists() {
            return Ok(Resolution::Script(script));
        }
        if cfg!(feature = "native") {
            let native = with_suffix(&base, std::env::consts::DLL_SUFFIX);
            tracing::debug!(candidate = %native.display(), "probing native extension");
            if native.exists() {
                return Ok(Resolution::Native(native));
            }
        }
    }
    Ok(Resolution::NotFound)
}

/// Resolves `identifier` and evaluates the script or runs the extension it
/// names. `search_path` is the path attached to the `load` that was called.
pub fn load(
    interpreter: &mut Interpreter,
    identifier: &str,
    search_path: Option<&SearchPath>,
) -> Result<Value> {
    match resolve(identifier, search_path)? {
        Resolution::DirectPath(path) | Resolution::Script(path) => {
            let source = loader::load_source(Some(&path))?;
            interpreter.eval_script(source)
        }
        Resolution::Native(path) => load_native(interpreter, identifier, &path),
        Resolution::NotFound => throw!(NotFound, "can't find a candidate for module '{identifier}'"),
    }
}

#[cfg(feature = "native")]
fn load_native(interpreter: &mut Interpreter, identifier: &str, path: &Path) -> Result<Value> {
    crate::native::load(interpreter, identifier, path)
}

#[cfg(not(feature = "native"))]
fn load_native(_: &mut Interpreter, identifier: &str, path: &Path) -> Result<Value> {
    throw!(
        DynamicLoad,
        "native extension '{identifier}' at '{}' cannot be loaded: support not compiled in",
        path.display()
    )
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
