use std::ffi::c_int;

use crate::cell::Cell;
use crate::epoch::OpcodeEpoch;
use crate::layout::{Amx, Image, LayoutError};

/// `amx_Exec` index: continue from the current `cip`.
pub const AMX_EXEC_CONT: c_int = -2;

/// Signature of the host's `amx_Exec`.
pub type AmxExec = unsafe extern "C" fn(amx: *mut Amx, retval: *mut Cell, index: c_int) -> c_int;

/// Access to a running VM: its image, the registers the introspection code
/// saves and restores, and the host's execution request.
pub trait Interpreter {
    fn image(&mut self, epoch: &OpcodeEpoch) -> Result<Image<'_>, LayoutError>;

    fn cip(&self) -> Cell;
    fn set_cip(&mut self, cip: Cell);
    fn flags(&self) -> c_int;
    fn set_flags(&mut self, flags: c_int);
    fn pri(&self) -> Cell;
    fn set_pri(&mut self, pri: Cell);

    /// Calls `amx_Exec(amx, retval, index)` on this VM.
    ///
    /// # Safety
    /// `retval` must be valid for a pointer-sized write.
    unsafe fn exec(&mut self, retval: *mut Cell, index: c_int) -> c_int;
}

/// A host-owned `AMX` paired with the host's `amx_Exec`.
pub struct HostAmx<'a> {
    amx: &'a mut Amx,
    exec: AmxExec,
}

impl<'a> HostAmx<'a> {
    /// # Safety
    /// `amx` must be a live `AMX` owned by the host whose `base` points at its
    /// loaded image, and must not be used through other paths for `'a`.
    pub unsafe fn new(amx: *mut Amx, exec: AmxExec) -> Option<Self> {
        let amx = unsafe { amx.as_mut() }?;
        Some(Self { amx, exec })
    }

    pub fn as_ptr(&mut self) -> *mut Amx {
        &mut *self.amx as *mut Amx
    }
}

impl Interpreter for HostAmx<'_> {
    fn image(&mut self, epoch: &OpcodeEpoch) -> Result<Image<'_>, LayoutError> {
        unsafe { self.amx.image(epoch) }
    }

    fn cip(&self) -> Cell {
        self.amx.cip
    }

    fn set_cip(&mut self, cip: Cell) {
        self.amx.cip = cip;
    }

    fn flags(&self) -> c_int {
        self.amx.flags
    }

    fn set_flags(&mut self, flags: c_int) {
        self.amx.flags = flags;
    }

    fn pri(&self) -> Cell {
        self.amx.pri
    }

    fn set_pri(&mut self, pri: Cell) {
        self.amx.pri = pri;
    }

    unsafe fn exec(&mut self, retval: *mut Cell, index: c_int) -> c_int {
        unsafe { (self.exec)(&mut *self.amx as *mut Amx, retval, index) }
    }
}
