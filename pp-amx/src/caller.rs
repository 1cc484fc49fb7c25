//! Identification of the native function a VM is currently executing.
//!
//! Inside a native callback `cip` points just past the `SYSREQ` instruction
//! that invoked it. Decoding that instruction gives either the index of the
//! native in the stub table or the address it was registered with.

use std::ffi::{CStr, c_int};

use tracing::trace;

use crate::cell::{CELL_SIZE, Cell, UCell};
use crate::epoch::{ACTIVE_EPOCH, OpcodeEpoch, Sysreq};
use crate::interpreter::Interpreter;
use crate::jump_table::{JumpTable, JumpTableCache, PROCESS_JUMP_TABLE};
use crate::layout::Image;

/// Name reported when the calling instruction cannot be decoded.
pub const UNKNOWN_NATIVE: &CStr = c"(unknown)";

/// Name of the native `vm` is executing, decoded for the build's epoch with the
/// process-wide jump table cache.
pub fn identify_caller<I: Interpreter + ?Sized>(vm: &mut I) -> &CStr {
    CallerResolver::new(ACTIVE_EPOCH, &PROCESS_JUMP_TABLE).identify(vm)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    ReadOpcode,
    MatchIndexCall { operand: usize },
    MatchAddressCall { operand: usize },
    Resolve { index: usize },
    Done(Option<usize>),
}

#[derive(Clone, Copy)]
pub struct CallerResolver<'c> {
    epoch: &'static OpcodeEpoch,
    jump_table: &'c JumpTableCache,
}

impl<'c> CallerResolver<'c> {
    pub fn new(epoch: &'static OpcodeEpoch, jump_table: &'c JumpTableCache) -> Self {
        Self { epoch, jump_table }
    }

    pub fn epoch(&self) -> &'static OpcodeEpoch {
        self.epoch
    }

    pub fn identify<'v, I: Interpreter + ?Sized>(&self, vm: &'v mut I) -> &'v CStr {
        let table = self.jump_table.get_or_bootstrap(self.epoch, vm);
        let cip = vm.cip();
        let flags = vm.flags();
        let image = match vm.image(self.epoch) {
            Ok(image) => image,
            Err(err) => {
                trace!("cannot read image: {err}");
                return UNKNOWN_NATIVE;
            }
        };

        self.locate(&image, cip, flags, table)
            .and_then(|index| image.native_name(index))
            .unwrap_or(UNKNOWN_NATIVE)
    }

    /// Index in the stub table of the native called by the instruction ending
    /// at `cip`.
    pub fn locate(
        &self,
        image: &Image<'_>,
        cip: Cell,
        flags: c_int,
        table: Option<JumpTable>,
    ) -> Option<usize> {
        let mut state = DecodeState::ReadOpcode;
        loop {
            state = match state {
                DecodeState::ReadOpcode => self.read_opcode(image, cip, flags, table),
                DecodeState::MatchIndexCall { operand } => {
                    let count = image.native_count();
                    match image.code_cell(operand).map(usize::try_from) {
                        Some(Ok(index)) if index < count => DecodeState::Resolve { index },
                        Some(_) => {
                            trace!(count, "native index out of range");
                            DecodeState::Done(None)
                        }
                        None => DecodeState::Done(None),
                    }
                }
                DecodeState::MatchAddressCall { operand } => {
                    match image.code_cell(operand) {
                        Some(address) => {
                            let address = address as UCell;
                            match image.find_native_by_address(address) {
                                Some(index) => DecodeState::Resolve { index },
                                None => {
                                    trace!("no native registered at {address:#x}");
                                    DecodeState::Done(None)
                                }
                            }
                        }
                        None => DecodeState::Done(None),
                    }
                }
                DecodeState::Resolve { index } => DecodeState::Done(Some(index)),
                DecodeState::Done(found) => return found,
            };
        }
    }

    fn read_opcode(
        &self,
        image: &Image<'_>,
        cip: Cell,
        flags: c_int,
        table: Option<JumpTable>,
    ) -> DecodeState {
        let (index_call, address_call) = self.epoch.sysreq_pair(flags);
        let width = index_call.width() * CELL_SIZE;
        let Some(op_addr) = usize::try_from(cip)
            .ok()
            .and_then(|cip| cip.checked_sub(width))
        else {
            trace!(cip, "cip too close to the start of the code segment");
            return DecodeState::Done(None);
        };
        let Some(opcode) = image.code_cell(op_addr) else {
            trace!(cip, "cip outside the code segment");
            return DecodeState::Done(None);
        };

        let operand = op_addr + CELL_SIZE;
        if self.matches(opcode, index_call, table) {
            DecodeState::MatchIndexCall { operand }
        } else if self.matches(opcode, address_call, table) {
            DecodeState::MatchAddressCall { operand }
        } else {
            trace!(
                opcode,
                cip,
                expected = index_call.mnemonic(),
                "instruction before cip is not a native call"
            );
            DecodeState::Done(None)
        }
    }

    fn matches(&self, opcode: Cell, op: Sysreq, table: Option<JumpTable>) -> bool {
        let Some(expected) = self.epoch.opcode(op) else {
            return false;
        };
        match table {
            Some(table) => opcode == table.entry(expected),
            None => opcode == expected,
        }
    }
}
