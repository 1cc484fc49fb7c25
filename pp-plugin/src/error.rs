use std::ffi::c_int;
use std::fmt;

/// Error codes of the AMX API (`AMX_ERR_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmxError {
    Exit,
    Assert,
    StackErr,
    Bounds,
    MemAccess,
    InvInstr,
    StackLow,
    HeapLow,
    Callback,
    Native,
    Divide,
    Sleep,
    InvState,
    Memory,
    Format,
    Version,
    NotFound,
    Index,
    Debug,
    Init,
    UserData,
    InitJit,
    Params,
    Domain,
    General,
    Other(c_int),
}

pub const AMX_ERR_NONE: c_int = 0;

impl AmxError {
    pub fn from_code(code: c_int) -> Option<Self> {
        let err = match code {
            AMX_ERR_NONE => return None,
            1 => AmxError::Exit,
            2 => AmxError::Assert,
            3 => AmxError::StackErr,
            4 => AmxError::Bounds,
            5 => AmxError::MemAccess,
            6 => AmxError::InvInstr,
            7 => AmxError::StackLow,
            8 => AmxError::HeapLow,
            9 => AmxError::Callback,
            10 => AmxError::Native,
            11 => AmxError::Divide,
            12 => AmxError::Sleep,
            13 => AmxError::InvState,
            16 => AmxError::Memory,
            17 => AmxError::Format,
            18 => AmxError::Version,
            19 => AmxError::NotFound,
            20 => AmxError::Index,
            21 => AmxError::Debug,
            22 => AmxError::Init,
            23 => AmxError::UserData,
            24 => AmxError::InitJit,
            25 => AmxError::Params,
            26 => AmxError::Domain,
            27 => AmxError::General,
            other => AmxError::Other(other),
        };
        Some(err)
    }

    /// Maps a status returned by the AMX API to a `Result`.
    pub fn check(code: c_int) -> Result<(), AmxError> {
        match Self::from_code(code) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    pub fn code(self) -> c_int {
        match self {
            AmxError::Exit => 1,
            AmxError::Assert => 2,
            AmxError::StackErr => 3,
            AmxError::Bounds => 4,
            AmxError::MemAccess => 5,
            AmxError::InvInstr => 6,
            AmxError::StackLow => 7,
            AmxError::HeapLow => 8,
            AmxError::Callback => 9,
            AmxError::Native => 10,
            AmxError::Divide => 11,
            AmxError::Sleep => 12,
            AmxError::InvState => 13,
            AmxError::Memory => 16,
            AmxError::Format => 17,
            AmxError::Version => 18,
            AmxError::NotFound => 19,
            AmxError::Index => 20,
            AmxError::Debug => 21,
            AmxError::Init => 22,
            AmxError::UserData => 23,
            AmxError::InitJit => 24,
            AmxError::Params => 25,
            AmxError::Domain => 26,
            AmxError::General => 27,
            AmxError::Other(code) => code,
        }
    }
}

impl fmt::Display for AmxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            AmxError::Exit => "forced exit",
            AmxError::Assert => "assertion failed",
            AmxError::StackErr => "stack/heap collision (insufficient stack size)",
            AmxError::Bounds => "array index out of bounds",
            AmxError::MemAccess => "invalid memory access",
            AmxError::InvInstr => "invalid instruction",
            AmxError::StackLow => "stack underflow",
            AmxError::HeapLow => "heap underflow",
            AmxError::Callback => "no (valid) native function callback",
            AmxError::Native => "native function failed",
            AmxError::Divide => "divide by zero",
            AmxError::Sleep => "go into sleepmode - code can be restarted",
            AmxError::InvState => "invalid state for this access",
            AmxError::Memory => "out of memory",
            AmxError::Format => "invalid/unsupported P-code file format",
            AmxError::Version => "file is for a newer version of the AMX",
            AmxError::NotFound => "function not found",
            AmxError::Index => "invalid index parameter (bad entry point)",
            AmxError::Debug => "debugger cannot run",
            AmxError::Init => "AMX not initialized (or doubly initialized)",
            AmxError::UserData => "unable to set user data field (table full)",
            AmxError::InitJit => "cannot initialize the JIT",
            AmxError::Params => "parameter error",
            AmxError::Domain => "domain error, expression result does not fit in range",
            AmxError::General => "general error (unknown or unspecific error)",
            AmxError::Other(code) => return write!(f, "unknown AMX error {code}"),
        };
        write!(f, "{message} (error {})", self.code())
    }
}

impl std::error::Error for AmxError {}
