//! Native extension bridge.
//!
//! A native extension is a dynamic library exporting one symbol named after
//! the identifier it is loaded by:
//!
//! ```text
//! unsafe extern "C" fn(context: *mut c_void, environment: *const c_void) -> bool
//! ```
//!
//! `context` points at the calling [`Interpreter`] and `environment` at the
//! root namespace ([`EnvironmentRef`]). Both are Rust types, so an extension
//! must be built against the same `resin` version with the same compiler as
//! the host. The [`extension!`](crate::extension) macro writes a conforming
//! entry point:
//!
//! ```ignore
//! fn install(_: &mut resin::Interpreter, env: &resin::EnvironmentRef) -> resin::Result<()> {
//!     env.borrow_mut().define("answer".into(), resin::Value::int(42), false);
//!     Ok(())
//! }
//!
//! resin::extension!(answer, install);
//! ```
//!
//! Opened libraries are never unloaded.

use std::{any::Any, ffi::c_void, panic::AssertUnwindSafe};

use crate::{
    diagnostics::Result, environment::EnvironmentRef, host_error, runtime::Interpreter,
};

/// Safe body of an extension's entry point.
pub type Init = fn(&mut Interpreter, &EnvironmentRef) -> Result<()>;

/// Signature of the exported entry point.
pub type EntryPoint = unsafe extern "C" fn(*mut c_void, *const c_void) -> bool;

/// Defines the exported entry point `$name` around `$init`.
#[macro_export]
macro_rules! extension {
    ($name:ident, $init:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            context: *mut ::std::ffi::c_void,
            environment: *const ::std::ffi::c_void,
        ) -> bool {
            unsafe { $crate::native::enter(context, environment, $init) }
        }
    };
}

/// Runs `init` on behalf of an entry point.
///
/// A failure or panic in `init` is recorded on the interpreter and reported
/// as `false`; the host picks the recorded error up after the call returns.
///
/// # Safety
///
/// `context` must point to a live `Interpreter` and `environment` to a live
/// `EnvironmentRef`, both created by the same build of this crate.
pub unsafe fn enter(context: *mut c_void, environment: *const c_void, init: Init) -> bool {
    if context.is_null() || environment.is_null() {
        return false;
    }
    let interpreter = unsafe { &mut *context.cast::<Interpreter>() };
    let env = unsafe { &*environment.cast::<EnvironmentRef>() };
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| init(&mut *interpreter, env)));
    let error = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(err)) => err,
        Err(payload) => host_error!(
            Evaluation,
            "native extension panicked: {}",
            panic_message(payload.as_ref())
        ),
    };
    interpreter.set_pending(error);
    false
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(feature = "native")]
pub use self::bridge::load;

#[cfg(feature = "native")]
mod bridge {
    use std::{
        collections::HashMap,
        ffi::c_void,
        fs,
        path::{Path, PathBuf},
        sync::{Arc, OnceLock},
    };

    use libloading::Library;
    use parking_lot::Mutex;

    use super::EntryPoint;
    use crate::{
        diagnostics::Result, environment::EnvironmentRef, host_error, runtime::Interpreter,
        throw, value::Value,
    };

    /// Libraries opened so far, keyed by canonical path.
    fn libraries() -> &'static Mutex<HashMap<PathBuf, Arc<Library>>> {
        static LIBRARIES: OnceLock<Mutex<HashMap<PathBuf, Arc<Library>>>> = OnceLock::new();
        LIBRARIES.get_or_init(|| Mutex::new(HashMap::new()))
    }

    /// Opens the extension at `path`, looks up `identifier` and runs it
    /// against the interpreter's root namespace.
    pub fn load(interpreter: &mut Interpreter, identifier: &str, path: &Path) -> Result<Value> {
        let library = open(path)?;
        let entry: EntryPoint = match unsafe { library.get::<EntryPoint>(identifier.as_bytes()) } {
            Ok(symbol) => *symbol,
            Err(err) => throw!(
                DynamicLoad,
                "couldn't get initialiser for native extension '{}': {err}",
                path.display()
            ),
        };
        tracing::debug!(identifier, path = %path.display(), "running native entry point");
        let root: EnvironmentRef = interpreter.globals().clone();
        let succeeded = unsafe {
            entry(
                (interpreter as *mut Interpreter).cast::<c_void>(),
                (&root as *const EnvironmentRef).cast::<c_void>(),
            )
        };
        if succeeded {
            return Ok(Value::bool(true));
        }
        match interpreter.take_pending() {
            Some(err) => Err(err),
            None => throw!(
                Evaluation,
                "native extension '{identifier}' failed without reporting an error"
            ),
        }
    }

    fn open(path: &Path) -> Result<Arc<Library>> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(library) = libraries().lock().get(&key) {
            tracing::debug!(path = %key.display(), "reusing open native extension");
            return Ok(Arc::clone(library));
        }
        tracing::debug!(path = %key.display(), "opening native extension");
        let library = open_library(path).map(Arc::new).map_err(|err| {
            host_error!(
                DynamicLoad,
                "couldn't open native extension '{}': {err}",
                path.display()
            )
        })?;
        let mut cache = libraries().lock();
        Ok(Arc::clone(cache.entry(key).or_insert(library)))
    }

    #[cfg(unix)]
    fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

        unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
    }

    #[cfg(not(unix))]
    fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
        unsafe { Library::new(path) }
    }
}
