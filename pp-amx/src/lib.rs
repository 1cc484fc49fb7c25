pub mod caller;
pub mod cell;
pub mod epoch;
pub mod interpreter;
pub mod jump_table;
pub mod layout;
pub mod natives;

pub use caller::{CallerResolver, UNKNOWN_NATIVE, identify_caller};
pub use cell::{
    CELL_SIZE, Cell, UCell, align_cell, align_cell_array, copy_and_align_cell_array,
    packed_char_offset,
};
pub use epoch::{
    ACTIVE_EPOCH, AMX_FLAG_BROWSE, AMX_FLAG_SYSREQN, AMX_FLAG_VERIFY, EPOCH_V8, EPOCH_V9,
    EPOCH_V10, EPOCH_V11, EPOCHS, FILE_VERSION, NormalizedSysreq, OpcodeEpoch, Sysreq,
    epoch_for_file_version,
};
pub use interpreter::{AMX_EXEC_CONT, AmxExec, HostAmx, Interpreter};
pub use jump_table::{JumpTable, JumpTableCache, PROCESS_JUMP_TABLE};
pub use layout::{
    AMX_HEADER_SIZE, AMX_MAGIC, Amx, AmxHeader, AmxNative, AmxNativeInfo, EXPMAX, FuncStub,
    FuncStubNt, Image, LayoutError, NativeStub, Natives, StubLayout,
};
#[cfg(amx_pawn4)]
pub use layout::AmxOverlay;
pub use natives::install_hook;
