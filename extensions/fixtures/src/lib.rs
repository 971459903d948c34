//! Entry points with known outcomes. Each is exported under its own name, so
//! the library is copied once per identifier it should be loaded as.

use std::{
    ffi::c_void,
    sync::atomic::{AtomicI64, Ordering},
};

use resin::{throw, value::Value, EnvironmentRef, Interpreter, Result};

static LOADS: AtomicI64 = AtomicI64::new(0);

fn refuse(_: &mut Interpreter, _: &EnvironmentRef) -> Result<()> {
    throw!(Config, "fixture refused to initialise")
}

fn explode(_: &mut Interpreter, _: &EnvironmentRef) -> Result<()> {
    panic!("fixture blew up")
}

/// Defines `load_count`, the number of times this entry point has run.
fn count(_: &mut Interpreter, env: &EnvironmentRef) -> Result<()> {
    let loads = LOADS.fetch_add(1, Ordering::SeqCst) + 1;
    env.borrow_mut()
        .define("load_count".into(), Value::int(loads), true);
    Ok(())
}

resin::extension!(refusing, refuse);
resin::extension!(exploding, explode);
resin::extension!(counting, count);

/// Fails without recording why.
#[no_mangle]
pub unsafe extern "C" fn silent(_: *mut c_void, _: *const c_void) -> bool {
    false
}
