//! One-time query of the interpreter's opcode dispatch table.
//!
//! Interpreter cores built with computed gotos relocate every opcode of a
//! loaded script into the address of its handler. Such a core answers an
//! `amx_Exec` call made with the browse flag by storing the base of its label
//! table in `retval`; the ANSI C core instead runs into the `HALT` at address 0
//! and leaves `retval` alone.

use std::ffi::c_int;
use std::ptr::NonNull;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::cell::Cell;
use crate::epoch::OpcodeEpoch;
use crate::interpreter::{AMX_EXEC_CONT, Interpreter};

/// Label table of a computed-goto interpreter core, indexed by opcode number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JumpTable {
    base: NonNull<Cell>,
}

impl JumpTable {
    /// # Safety
    /// `base` must address a table with an entry for every opcode number the
    /// active epoch defines, valid for the rest of the process.
    pub unsafe fn from_addr(base: usize) -> Option<Self> {
        NonNull::new(base as *mut Cell).map(|base| Self { base })
    }

    pub fn addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Relocated form of `opcode`.
    pub fn entry(&self, opcode: Cell) -> Cell {
        unsafe { self.base.as_ptr().add(opcode as usize).read_unaligned() }
    }
}

/// Result of the bootstrap, shared by every later identification.
pub struct JumpTableCache {
    table: OnceLock<Option<usize>>,
    bootstraps: AtomicUsize,
}

/// Cache used by [`crate::identify_caller`].
pub static PROCESS_JUMP_TABLE: JumpTableCache = JumpTableCache::new();

impl Default for JumpTableCache {
    fn default() -> Self {
        Self::new()
    }
}

impl JumpTableCache {
    pub const fn new() -> Self {
        Self {
            table: OnceLock::new(),
            bootstraps: AtomicUsize::new(0),
        }
    }

    /// Returns the cached table, querying `vm` first if no query was made yet.
    pub fn get_or_bootstrap<I: Interpreter + ?Sized>(
        &self,
        epoch: &OpcodeEpoch,
        vm: &mut I,
    ) -> Option<JumpTable> {
        let base = *self.table.get_or_init(|| self.bootstrap(epoch, vm));
        base.and_then(|base| unsafe { JumpTable::from_addr(base) })
    }

    pub fn is_checked(&self) -> bool {
        self.table.get().is_some()
    }

    /// Cached table, `None` if unchecked or if the interpreter has none.
    pub fn get(&self) -> Option<JumpTable> {
        self.table
            .get()
            .copied()
            .flatten()
            .and_then(|base| unsafe { JumpTable::from_addr(base) })
    }

    /// Number of times the interpreter was actually queried.
    pub fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::Relaxed)
    }

    fn bootstrap<I: Interpreter + ?Sized>(&self, epoch: &OpcodeEpoch, vm: &mut I) -> Option<usize> {
        let Some(browse_flag) = epoch.browse_flag else {
            debug!("{epoch} has no jump table query; matching numeric opcodes");
            return None;
        };

        self.bootstraps.fetch_add(1, Ordering::Relaxed);
        let mut slot: usize = 0;
        let status = {
            let mut guard = RegisterGuard::save(vm);
            let flags = guard.saved.flags | browse_flag;
            guard.vm.set_flags(flags);
            guard.vm.set_pri(0);
            guard.vm.set_cip(0);
            unsafe { guard.vm.exec((&mut slot as *mut usize).cast::<Cell>(), AMX_EXEC_CONT) }
        };

        if slot == 0 {
            debug!(status, "interpreter reported no jump table; matching numeric opcodes");
            None
        } else {
            debug!(status, "interpreter jump table at {slot:#x}");
            Some(slot)
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SavedRegisters {
    flags: c_int,
    cip: Cell,
    pri: Cell,
}

/// Puts `flags`, `cip` and `pri` back when dropped, however the query ends.
struct RegisterGuard<'v, I: Interpreter + ?Sized> {
    vm: &'v mut I,
    saved: SavedRegisters,
}

impl<'v, I: Interpreter + ?Sized> RegisterGuard<'v, I> {
    fn save(vm: &'v mut I) -> Self {
        let saved = SavedRegisters {
            flags: vm.flags(),
            cip: vm.cip(),
            pri: vm.pri(),
        };
        Self { vm, saved }
    }
}

impl<I: Interpreter + ?Sized> Drop for RegisterGuard<'_, I> {
    fn drop(&mut self) {
        self.vm.set_cip(self.saved.cip);
        self.vm.set_pri(self.saved.pri);
        self.vm.set_flags(self.saved.flags);
    }
}
