//! Opcode numbering of the `SYSREQ` family across AMX instruction-set revisions.
//!
//! The revision is fixed at build time through `PP_AMX_FILE_VERSION` (see
//! `build.rs`). An unsupported value fails const evaluation of
//! [`ACTIVE_EPOCH`], so a misconfigured build never produces a plugin that
//! silently misdecodes bytecode.

use std::ffi::c_int;

use crate::cell::Cell;

/// Interpreter is inside `amx_Exec` only to report its opcode table.
pub const AMX_FLAG_BROWSE: c_int = 0x4000;
/// Name of the same bit in the 3.3 headers.
pub const AMX_FLAG_VERIFY: c_int = 0x4000;
/// Script was compiled with the normalized `SYSREQ.N` instructions.
pub const AMX_FLAG_SYSREQN: c_int = 0x800;

/// Logical instructions that transfer control to a native function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sysreq {
    /// `SYSREQ.C index`
    IndexCall,
    /// `SYSREQ.D address`
    AddressCall,
    /// `SYSREQ.N index argsize`
    NormalizedIndexCall,
    /// `SYSREQ.ND address argsize`
    NormalizedAddressCall,
}

impl Sysreq {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Sysreq::IndexCall => "sysreq.c",
            Sysreq::AddressCall => "sysreq.d",
            Sysreq::NormalizedIndexCall => "sysreq.n",
            Sysreq::NormalizedAddressCall => "sysreq.nd",
        }
    }

    /// Number of cells occupied by the instruction, opcode included.
    pub fn width(self) -> usize {
        match self {
            Sysreq::IndexCall | Sysreq::AddressCall => 2,
            Sysreq::NormalizedIndexCall | Sysreq::NormalizedAddressCall => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedSysreq {
    pub index_call: Cell,
    pub address_call: Cell,
    /// Bit of `AMX::flags` telling the script uses these forms.
    pub flag: c_int,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeEpoch {
    pub name: &'static str,
    pub min_file_version: u8,
    pub max_file_version: u8,
    pub index_call: Cell,
    pub address_call: Cell,
    pub normalized: Option<NormalizedSysreq>,
    /// Flag that makes `amx_Exec` stop and report its jump table. `None` when
    /// the interpreter core offers no such query.
    pub browse_flag: Option<c_int>,
    /// Whether stub records may carry their name inline.
    pub inline_stub_names: bool,
}

impl OpcodeEpoch {
    pub fn opcode(&self, op: Sysreq) -> Option<Cell> {
        match op {
            Sysreq::IndexCall => Some(self.index_call),
            Sysreq::AddressCall => Some(self.address_call),
            Sysreq::NormalizedIndexCall => self.normalized.map(|n| n.index_call),
            Sysreq::NormalizedAddressCall => self.normalized.map(|n| n.address_call),
        }
    }

    /// Index-call and address-call forms that can precede the cursor given the
    /// VM's flags word.
    pub fn sysreq_pair(&self, flags: c_int) -> (Sysreq, Sysreq) {
        match self.normalized {
            Some(normalized) if flags & normalized.flag != 0 => {
                (Sysreq::NormalizedIndexCall, Sysreq::NormalizedAddressCall)
            }
            _ => (Sysreq::IndexCall, Sysreq::AddressCall),
        }
    }

    pub fn supports_file_version(&self, file_version: u8) -> bool {
        (self.min_file_version..=self.max_file_version).contains(&file_version)
    }
}

impl std::fmt::Display for OpcodeEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (file version {}..={})",
            self.name, self.min_file_version, self.max_file_version
        )
    }
}

/// Pawn 3.0 - 3.2.
pub const EPOCH_V8: OpcodeEpoch = OpcodeEpoch {
    name: "pawn-3.2",
    min_file_version: 6,
    max_file_version: 8,
    index_call: 123,
    address_call: 135,
    normalized: None,
    browse_flag: Some(AMX_FLAG_BROWSE),
    inline_stub_names: true,
};

/// Pawn 3.3.
pub const EPOCH_V9: OpcodeEpoch = OpcodeEpoch {
    name: "pawn-3.3",
    min_file_version: 9,
    max_file_version: 9,
    index_call: 123,
    address_call: 158,
    normalized: Some(NormalizedSysreq {
        index_call: 135,
        address_call: 159,
        flag: AMX_FLAG_SYSREQN,
    }),
    browse_flag: Some(AMX_FLAG_VERIFY),
    inline_stub_names: true,
};

/// Pawn 3.3 with the extended opcode set.
pub const EPOCH_V10: OpcodeEpoch = OpcodeEpoch {
    name: "pawn-3.3-ext",
    min_file_version: 10,
    max_file_version: 10,
    index_call: 123,
    address_call: 213,
    normalized: Some(NormalizedSysreq {
        index_call: 135,
        address_call: 214,
        flag: AMX_FLAG_SYSREQN,
    }),
    browse_flag: Some(AMX_FLAG_VERIFY),
    inline_stub_names: true,
};

/// Pawn 4.0. Only the ANSI C interpreter core is supported: there is no way to
/// ask this core for its jump table.
pub const EPOCH_V11: OpcodeEpoch = OpcodeEpoch {
    name: "pawn-4.0",
    min_file_version: 11,
    max_file_version: 11,
    index_call: 69,
    address_call: 75,
    normalized: Some(NormalizedSysreq {
        index_call: 112,
        address_call: 76,
        flag: AMX_FLAG_SYSREQN,
    }),
    browse_flag: None,
    inline_stub_names: false,
};

pub const EPOCHS: [&OpcodeEpoch; 4] = [&EPOCH_V8, &EPOCH_V9, &EPOCH_V10, &EPOCH_V11];

pub const fn epoch_for_file_version(file_version: u8) -> Option<&'static OpcodeEpoch> {
    match file_version {
        6..=8 => Some(&EPOCH_V8),
        9 => Some(&EPOCH_V9),
        10 => Some(&EPOCH_V10),
        11 => Some(&EPOCH_V11),
        _ => None,
    }
}

const fn parse_file_version(raw: &str) -> u8 {
    let bytes = raw.as_bytes();
    assert!(!bytes.is_empty(), "PP_AMX_FILE_VERSION is empty");
    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(
            digit.is_ascii_digit(),
            "PP_AMX_FILE_VERSION must be a decimal number"
        );
        value = value * 10 + (digit - b'0') as u32;
        assert!(value <= u8::MAX as u32, "PP_AMX_FILE_VERSION out of range");
        i += 1;
    }
    value as u8
}

/// AMX file version the crate was built for.
pub const FILE_VERSION: u8 = parse_file_version(env!("PP_AMX_FILE_VERSION"));

/// Opcode epoch the crate was built for.
pub const ACTIVE_EPOCH: &OpcodeEpoch = match epoch_for_file_version(FILE_VERSION) {
    Some(epoch) => epoch,
    None => panic!("unsupported version of the AMX instruction set"),
};
