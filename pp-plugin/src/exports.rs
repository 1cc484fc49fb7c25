//! Typed access to the AMX API table the host hands to `Load`.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::ptr::NonNull;

use amx::{Amx, AmxExec, AmxNativeInfo, Cell};
use libc::size_t;
use plugin_abi::{
    EXPORT_EXEC, EXPORT_FIND_PUB_VAR, EXPORT_GET_ADDR, EXPORT_GET_STRING, EXPORT_RAISE_ERROR,
    EXPORT_REGISTER, EXPORT_SET_STRING, EXPORT_STR_LEN,
};

use crate::error::AmxError;

type AmxRegister =
    unsafe extern "C" fn(amx: *mut Amx, list: *const AmxNativeInfo, number: c_int) -> c_int;
type AmxFindPubVar =
    unsafe extern "C" fn(amx: *mut Amx, name: *const c_char, amx_addr: *mut Cell) -> c_int;
type AmxGetAddr =
    unsafe extern "C" fn(amx: *mut Amx, amx_addr: Cell, phys_addr: *mut *mut Cell) -> c_int;
type AmxStrLen = unsafe extern "C" fn(cstring: *const Cell, length: *mut c_int) -> c_int;
type AmxGetString = unsafe extern "C" fn(
    dest: *mut c_char,
    source: *const Cell,
    use_wchar: c_int,
    size: size_t,
) -> c_int;
type AmxSetString = unsafe extern "C" fn(
    dest: *mut Cell,
    source: *const c_char,
    pack: c_int,
    use_wchar: c_int,
    size: size_t,
) -> c_int;
type AmxRaiseError = unsafe extern "C" fn(amx: *mut Amx, error: c_int) -> c_int;

/// The host's AMX API, one function pointer per `EXPORT_*` slot.
#[derive(Clone, Copy, Debug)]
pub struct AmxExports {
    table: NonNull<*const c_void>,
}

// The table is written once by the host before `Load` and never changes.
unsafe impl Send for AmxExports {}
unsafe impl Sync for AmxExports {}

impl AmxExports {
    /// # Safety
    /// `table` must be null or point at an export table with
    /// [`plugin_abi::EXPORT_COUNT`] entries that lives for the rest of the
    /// process.
    pub unsafe fn from_raw(table: *mut c_void) -> Option<Self> {
        NonNull::new(table.cast::<*const c_void>()).map(|table| Self { table })
    }

    fn entry(&self, index: usize) -> Result<*const c_void, AmxError> {
        let entry = unsafe { self.table.as_ptr().add(index).read() };
        if entry.is_null() {
            Err(AmxError::NotFound)
        } else {
            Ok(entry)
        }
    }

    pub fn exec_fn(&self) -> Result<AmxExec, AmxError> {
        let entry = self.entry(EXPORT_EXEC)?;
        Ok(unsafe { std::mem::transmute::<*const c_void, AmxExec>(entry) })
    }

    /// # Safety
    /// `amx` must be a VM owned by the host. The names in `natives` must stay
    /// valid for the duration of the call.
    pub unsafe fn register(&self, amx: *mut Amx, natives: &[AmxNativeInfo]) -> Result<(), AmxError> {
        let register: AmxRegister = unsafe { std::mem::transmute(self.entry(EXPORT_REGISTER)?) };
        let number = c_int::try_from(natives.len()).map_err(|_| AmxError::Params)?;
        AmxError::check(unsafe { register(amx, natives.as_ptr(), number) })
    }

    /// Script address of the public variable `name`.
    ///
    /// # Safety
    /// `amx` must be a VM owned by the host.
    pub unsafe fn find_pub_var(&self, amx: *mut Amx, name: &CStr) -> Result<Cell, AmxError> {
        let find: AmxFindPubVar = unsafe { std::mem::transmute(self.entry(EXPORT_FIND_PUB_VAR)?) };
        let mut amx_addr: Cell = 0;
        AmxError::check(unsafe { find(amx, name.as_ptr(), &mut amx_addr) })?;
        Ok(amx_addr)
    }

    /// Translates a script address into a pointer into the VM's data segment.
    ///
    /// # Safety
    /// `amx` must be a VM owned by the host.
    pub unsafe fn get_addr(&self, amx: *mut Amx, amx_addr: Cell) -> Result<*mut Cell, AmxError> {
        let get_addr: AmxGetAddr = unsafe { std::mem::transmute(self.entry(EXPORT_GET_ADDR)?) };
        let mut phys_addr: *mut Cell = std::ptr::null_mut();
        AmxError::check(unsafe { get_addr(amx, amx_addr, &mut phys_addr) })?;
        if phys_addr.is_null() {
            return Err(AmxError::MemAccess);
        }
        Ok(phys_addr)
    }

    /// Length in characters of the packed or unpacked string at `cstring`.
    ///
    /// # Safety
    /// `cstring` must point at a zero-terminated string in a VM's memory.
    pub unsafe fn str_len(&self, cstring: *const Cell) -> Result<usize, AmxError> {
        let str_len: AmxStrLen = unsafe { std::mem::transmute(self.entry(EXPORT_STR_LEN)?) };
        let mut length: c_int = 0;
        AmxError::check(unsafe { str_len(cstring, &mut length) })?;
        usize::try_from(length).map_err(|_| AmxError::General)
    }

    /// Copies the script string at `source` into `dest`, truncating to fit
    /// and always zero-terminating.
    ///
    /// # Safety
    /// `source` must point at a zero-terminated string in a VM's memory.
    pub unsafe fn get_string(&self, dest: &mut [u8], source: *const Cell) -> Result<(), AmxError> {
        let get_string: AmxGetString =
            unsafe { std::mem::transmute(self.entry(EXPORT_GET_STRING)?) };
        AmxError::check(unsafe {
            get_string(dest.as_mut_ptr().cast::<c_char>(), source, 0, dest.len())
        })
    }

    /// Stores `source` at `dest`, writing at most `size` cells.
    ///
    /// # Safety
    /// `dest` must point at `size` writable cells in a VM's memory.
    pub unsafe fn set_string(
        &self,
        dest: *mut Cell,
        source: &CStr,
        pack: bool,
        size: usize,
    ) -> Result<(), AmxError> {
        let set_string: AmxSetString =
            unsafe { std::mem::transmute(self.entry(EXPORT_SET_STRING)?) };
        AmxError::check(unsafe { set_string(dest, source.as_ptr(), c_int::from(pack), 0, size) })
    }

    /// Aborts the running script with `error` once the current native returns.
    ///
    /// # Safety
    /// `amx` must be a VM owned by the host.
    pub unsafe fn raise_error(&self, amx: *mut Amx, error: AmxError) -> Result<(), AmxError> {
        let raise: AmxRaiseError = unsafe { std::mem::transmute(self.entry(EXPORT_RAISE_ERROR)?) };
        AmxError::check(unsafe { raise(amx, error.code()) })
    }
}
