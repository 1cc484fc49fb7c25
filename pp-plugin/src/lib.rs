#![allow(non_snake_case)]

pub mod config;
pub mod error;
pub mod exports;
pub mod logging;
pub mod natives;
pub mod strings;
pub mod version;

use std::ffi::{c_int, c_uint, c_void};
use std::sync::OnceLock;

use amx::Amx;
use plugin_abi::{PLUGIN_DATA_AMX_EXPORTS, PLUGIN_DATA_LOGPRINTF, SUPPORTS_AMX_NATIVES, SUPPORTS_VERSION};
use tracing::{debug, info, warn};

use crate::config::{PLUGIN_NAME, PLUGIN_VERSION, split_version};
use crate::error::{AMX_ERR_NONE, AmxError};
use crate::exports::AmxExports;
use crate::logging::{HostLog, LogPrintf};

static EXPORTS: OnceLock<AmxExports> = OnceLock::new();

/// The AMX API table received in `Load`.
pub fn host_exports() -> Option<&'static AmxExports> {
    EXPORTS.get()
}

#[unsafe(no_mangle)]
pub extern "system" fn Supports() -> c_uint {
    SUPPORTS_VERSION | SUPPORTS_AMX_NATIVES
}

/// # Safety
/// `data` must be the plugin data array the host passes to plugins.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn Load(data: *const *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }
    let (table, logprintf) = unsafe {
        (
            data.add(PLUGIN_DATA_AMX_EXPORTS).read(),
            data.add(PLUGIN_DATA_LOGPRINTF).read(),
        )
    };
    let Some(exports) = (unsafe { AmxExports::from_raw(table) }) else {
        return false;
    };
    if logprintf.is_null() {
        return false;
    }
    let logprintf = unsafe { std::mem::transmute::<*mut c_void, LogPrintf>(logprintf) };

    if EXPORTS.set(exports).is_err() {
        warn!("{PLUGIN_NAME} loaded twice, keeping the first AMX API table");
    }
    if let Err(err) = logging::init(HostLog::logprintf(logprintf)) {
        warn!("logging already initialized: {err}");
    }
    info!("  {PLUGIN_NAME} plugin v{} is OK", split_version(PLUGIN_VERSION));
    true
}

#[unsafe(no_mangle)]
pub extern "system" fn Unload() {
    info!("  {PLUGIN_NAME} plugin was unloaded");
}

/// # Safety
/// `amx` must be a script the host has just loaded.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn AmxLoad(amx: *mut Amx) -> c_int {
    let Some(exports) = host_exports() else {
        return AmxError::Init.code();
    };
    match unsafe { load_script(exports, amx) } {
        Ok(()) => AMX_ERR_NONE,
        Err(err) => err.code(),
    }
}

unsafe fn load_script(exports: &AmxExports, amx: *mut Amx) -> Result<(), AmxError> {
    if let Err(mismatch) = unsafe { version::check_include_version(exports, amx) } {
        warn!("{mismatch}");
        warn!("{PLUGIN_NAME}: Please recompile your script with the latest version of include file.");
        return Err(AmxError::Version);
    }

    let list = natives::native_list();
    // The host reports natives other plugins have yet to register as an
    // error; the script is still usable.
    if let Err(err) = unsafe { exports.register(amx, &list) } {
        debug!("amx_Register: {err}");
    }

    if unsafe { natives::hook_is_player_connected_in(amx) } {
        info!("IsPlayerConnected hooked successfully");
    }
    Ok(())
}

#[unsafe(no_mangle)]
pub extern "system" fn AmxUnload(_amx: *mut Amx) -> c_int {
    AMX_ERR_NONE
}
