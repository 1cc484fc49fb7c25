//! Natives the plugin registers with every script, and the
//! `IsPlayerConnected` hook.

use std::ffi::CString;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use amx::{
    ACTIVE_EPOCH, Amx, AmxNative, AmxNativeInfo, CELL_SIZE, Cell, HostAmx, UCell,
    UNKNOWN_NATIVE, identify_caller, install_hook,
};
use plugin_abi::{
    NATIVE_CHECK_ARGS_TEST, NATIVE_HELLO_WORLD, NATIVE_PRINT_NUMBER, NATIVE_PRINT_STRING, NATIVES,
};
use tracing::{info, warn};

use crate::config::PLUGIN_NAME;
use crate::error::AmxError;
use crate::exports::AmxExports;
use crate::host_exports;
use crate::strings::get_string;

/// Whether a native called with `params[0] == arg_bytes` received at least
/// `expected` arguments.
pub fn has_arguments(arg_bytes: Cell, expected: usize) -> bool {
    i64::from(arg_bytes) / CELL_SIZE as i64 >= expected as i64
}

/// Name of the native `amx` is executing.
///
/// # Safety
/// `amx` must be null or a VM owned by the host that `exports` belongs to.
pub unsafe fn current_native(exports: &AmxExports, amx: *mut Amx) -> String {
    let Ok(exec) = exports.exec_fn() else {
        return UNKNOWN_NATIVE.to_string_lossy().into_owned();
    };
    match unsafe { HostAmx::new(amx, exec) } {
        Some(mut vm) => identify_caller(&mut vm).to_string_lossy().into_owned(),
        None => UNKNOWN_NATIVE.to_string_lossy().into_owned(),
    }
}

/// Raises a parameter error in `amx` unless `params` carries at least
/// `expected` arguments.
///
/// # Safety
/// `params` must point at the argument block of a native call made by `amx`.
pub unsafe fn check_arguments(
    exports: &AmxExports,
    amx: *mut Amx,
    params: *const Cell,
    expected: usize,
) -> bool {
    let arg_bytes = unsafe { params.read() };
    if has_arguments(arg_bytes, expected) {
        return true;
    }
    if let Err(err) = unsafe { exports.raise_error(amx, AmxError::Params) } {
        warn!("cannot raise error in script: {err}");
    }
    let name = unsafe { current_native(exports, amx) };
    warn!(
        "{PLUGIN_NAME}:{name}: Incorrect number of arguments (expected {expected}, got {}).",
        i64::from(arg_bytes) / CELL_SIZE as i64
    );
    false
}

unsafe extern "C" fn hello_world(amx: *mut Amx, _params: *const Cell) -> Cell {
    let Some(exports) = host_exports() else {
        return 0;
    };
    let name = unsafe { current_native(exports, amx) };
    info!("{name}: This line was printed from a plugin");
    1
}

unsafe extern "C" fn print_number(amx: *mut Amx, params: *const Cell) -> Cell {
    let Some(exports) = host_exports() else {
        return 0;
    };
    if !unsafe { check_arguments(exports, amx, params, 1) } {
        return 0;
    }
    let number = unsafe { params.add(1).read() };
    let name = unsafe { current_native(exports, amx) };
    info!("{name}: {number}");
    1
}

unsafe extern "C" fn print_string(amx: *mut Amx, params: *const Cell) -> Cell {
    let Some(exports) = host_exports() else {
        return 0;
    };
    if !unsafe { check_arguments(exports, amx, params, 1) } {
        return 0;
    }
    let value = match unsafe { get_string(exports, amx, params.add(1).read()) } {
        Ok(value) => value,
        Err(err) => {
            if let Err(raise_err) = unsafe { exports.raise_error(amx, err) } {
                warn!("cannot raise {err} in script: {raise_err}");
            }
            return 0;
        }
    };
    let name = unsafe { current_native(exports, amx) };
    info!("{name}: {value}");
    1
}

unsafe extern "C" fn check_args_test(amx: *mut Amx, params: *const Cell) -> Cell {
    let Some(exports) = host_exports() else {
        return 0;
    };
    if !unsafe { check_arguments(exports, amx, params, 1) } {
        return 0;
    }
    // The include file declares this native without arguments.
    warn!("This line shouldn't be printed");
    1
}

pub fn native_function(index: u16) -> Option<AmxNative> {
    let native: AmxNative = match index {
        NATIVE_HELLO_WORLD => hello_world,
        NATIVE_PRINT_NUMBER => print_number,
        NATIVE_PRINT_STRING => print_string,
        NATIVE_CHECK_ARGS_TEST => check_args_test,
        _ => return None,
    };
    Some(native)
}

fn native_names() -> &'static [CString] {
    static NAMES: OnceLock<Vec<CString>> = OnceLock::new();
    NAMES.get_or_init(|| {
        NATIVES
            .iter()
            .filter_map(|native| CString::new(native.name).ok())
            .collect()
    })
}

/// Registration list for `amx_Register`, in the order of [`NATIVES`].
pub fn native_list() -> Vec<AmxNativeInfo> {
    NATIVES
        .iter()
        .zip(native_names())
        .filter_map(|(native, name)| {
            Some(AmxNativeInfo {
                name: name.as_ptr(),
                func: native_function(native.index)?,
            })
        })
        .collect()
}

/// Points the stub of native `name` in the script of `amx` at `replacement`,
/// returning the address it held before. The address is zero for a native the
/// host has not bound yet.
///
/// # Safety
/// `amx` must be null or a loaded VM owned by the host, not running.
pub unsafe fn replace_native(amx: *mut Amx, name: &str, replacement: AmxNative) -> Option<usize> {
    let amx = unsafe { amx.as_mut() }?;
    let mut image = match unsafe { amx.image(ACTIVE_EPOCH) } {
        Ok(image) => image,
        Err(err) => {
            warn!("cannot read native table: {err}");
            return None;
        }
    };
    // Stubs hold cell-sized addresses; on hosts with wider pointers the high
    // bits are lost.
    let previous = install_hook(&mut image, name, replacement as usize as UCell)?;
    Some(previous as usize)
}

fn native_from_address(address: usize) -> Option<AmxNative> {
    if address == 0 {
        return None;
    }
    Some(unsafe { std::mem::transmute::<usize, AmxNative>(address) })
}

static ORIGINAL_IS_PLAYER_CONNECTED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn hook_is_player_connected(amx: *mut Amx, params: *const Cell) -> Cell {
    info!("Hello from hook_IsPlayerConnected");
    match native_from_address(ORIGINAL_IS_PLAYER_CONNECTED.load(Ordering::Acquire)) {
        Some(original) => unsafe { original(amx, params) },
        None => 0,
    }
}

/// Hooks `IsPlayerConnected` in the script of `amx`.
///
/// # Safety
/// `amx` must be null or a loaded VM owned by the host, not running.
pub unsafe fn hook_is_player_connected_in(amx: *mut Amx) -> bool {
    match unsafe { replace_native(amx, "IsPlayerConnected", hook_is_player_connected) } {
        Some(original) => {
            ORIGINAL_IS_PLAYER_CONNECTED.store(original, Ordering::Release);
            true
        }
        None => false,
    }
}
