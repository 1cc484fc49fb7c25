use std::ffi::{CStr, CString};

use amx::{Amx, Cell};

use crate::error::AmxError;
use crate::exports::AmxExports;

/// Reads the script string at `amx_addr`.
///
/// # Safety
/// `amx` must be a VM owned by the host that `exports` belongs to.
pub unsafe fn get_string(exports: &AmxExports, amx: *mut Amx, amx_addr: Cell) -> Result<String, AmxError> {
    let cstring = unsafe { exports.get_addr(amx, amx_addr) }?;
    let length = unsafe { exports.str_len(cstring) }?;
    let mut buf = vec![0u8; length + 1];
    unsafe { exports.get_string(&mut buf, cstring) }?;
    let value = CStr::from_bytes_until_nul(&buf).map_err(|_| AmxError::General)?;
    Ok(value.to_string_lossy().into_owned())
}

/// Writes `value` into the script array at `amx_addr`, which holds `size`
/// cells.
///
/// # Safety
/// `amx` must be a VM owned by the host that `exports` belongs to.
pub unsafe fn set_string(
    exports: &AmxExports,
    amx: *mut Amx,
    amx_addr: Cell,
    size: usize,
    value: &str,
    pack: bool,
) -> Result<(), AmxError> {
    let dest = unsafe { exports.get_addr(amx, amx_addr) }?;
    let value = CString::new(value).map_err(|_| AmxError::Params)?;
    unsafe { exports.set_string(dest, &value, pack, size) }
}
