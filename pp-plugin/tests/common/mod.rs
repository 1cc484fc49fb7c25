#![allow(dead_code)]

use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_int, c_void};

use amx::{AMX_HEADER_SIZE, AmxHeader, Amx, AmxNativeInfo, CELL_SIZE, Cell, FuncStubNt, UCell};
use plugin::exports::AmxExports;
use plugin_abi::{
    EXPORT_COUNT, EXPORT_EXEC, EXPORT_FIND_PUB_VAR, EXPORT_GET_ADDR, EXPORT_GET_STRING,
    EXPORT_RAISE_ERROR, EXPORT_REGISTER, EXPORT_SET_STRING, EXPORT_STR_LEN,
};

const ERR_MEMACCESS: c_int = 5;
const ERR_NOTFOUND: c_int = 19;

/// Script state the fake AMX API operates on, one per test thread.
#[derive(Default)]
pub struct FakeScript {
    /// Data segment; script addresses are byte offsets into it.
    pub data: Vec<Cell>,
    pub pub_vars: Vec<(String, Cell)>,
    pub raised: Vec<c_int>,
    pub registered: Vec<String>,
    pub execs: usize,
    /// `(flags, cip, pri, index)` as `amx_Exec` found them.
    pub exec_registers: Vec<(c_int, Cell, Cell, c_int)>,
}

thread_local! {
    pub static SCRIPT: RefCell<FakeScript> = RefCell::new(FakeScript::default());
}

pub fn with_script<R>(f: impl FnOnce(&mut FakeScript) -> R) -> R {
    SCRIPT.with(|script| f(&mut script.borrow_mut()))
}

/// Stores `value` unpacked at script address `amx_addr`.
pub fn store_string(amx_addr: Cell, value: &str) {
    with_script(|script| {
        let start = amx_addr as usize / CELL_SIZE;
        let end = start + value.len() + 1;
        if script.data.len() < end {
            script.data.resize(end, 0);
        }
        for (slot, byte) in script.data[start..].iter_mut().zip(value.bytes()) {
            *slot = byte as Cell;
        }
        script.data[end - 1] = 0;
    });
}

pub fn load_string(amx_addr: Cell) -> String {
    with_script(|script| {
        script.data[amx_addr as usize / CELL_SIZE..]
            .iter()
            .take_while(|&&cell| cell != 0)
            .map(|&cell| cell as u8 as char)
            .collect()
    })
}

unsafe extern "C" fn fake_exec(amx: *mut Amx, _retval: *mut Cell, index: c_int) -> c_int {
    // An ANSI C core has no jump table to report and leaves `retval` alone.
    let registers = unsafe { amx.as_ref() }.map(|amx| (amx.flags, amx.cip, amx.pri, index));
    with_script(|script| {
        script.execs += 1;
        script.exec_registers.extend(registers);
    });
    0
}

unsafe extern "C" fn fake_register(
    _amx: *mut Amx,
    list: *const AmxNativeInfo,
    number: c_int,
) -> c_int {
    let natives = unsafe { std::slice::from_raw_parts(list, number as usize) };
    with_script(|script| {
        for native in natives {
            let name = unsafe { CStr::from_ptr(native.name) };
            script.registered.push(name.to_string_lossy().into_owned());
        }
    });
    // IsPlayerConnected and friends belong to the server, not to us.
    ERR_NOTFOUND
}

unsafe extern "C" fn fake_find_pub_var(
    _amx: *mut Amx,
    name: *const c_char,
    amx_addr: *mut Cell,
) -> c_int {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    let found = with_script(|script| {
        script
            .pub_vars
            .iter()
            .find(|(var, _)| *var == name)
            .map(|(_, addr)| *addr)
    });
    match found {
        Some(addr) => {
            unsafe { amx_addr.write(addr) };
            0
        }
        None => ERR_NOTFOUND,
    }
}

unsafe extern "C" fn fake_get_addr(
    _amx: *mut Amx,
    amx_addr: Cell,
    phys_addr: *mut *mut Cell,
) -> c_int {
    with_script(|script| {
        let index = usize::try_from(amx_addr).map(|addr| addr / CELL_SIZE);
        match index {
            Ok(index) if index < script.data.len() => {
                unsafe { phys_addr.write(script.data.as_mut_ptr().add(index)) };
                0
            }
            _ => ERR_MEMACCESS,
        }
    })
}

unsafe extern "C" fn fake_str_len(cstring: *const Cell, length: *mut c_int) -> c_int {
    let mut len = 0;
    while unsafe { cstring.add(len).read() } != 0 {
        len += 1;
    }
    unsafe { length.write(len as c_int) };
    0
}

unsafe extern "C" fn fake_get_string(
    dest: *mut c_char,
    source: *const Cell,
    _use_wchar: c_int,
    size: usize,
) -> c_int {
    let mut written = 0;
    while written + 1 < size {
        let cell = unsafe { source.add(written).read() };
        if cell == 0 {
            break;
        }
        unsafe { dest.add(written).write(cell as u8 as c_char) };
        written += 1;
    }
    unsafe { dest.add(written).write(0) };
    0
}

unsafe extern "C" fn fake_set_string(
    dest: *mut Cell,
    source: *const c_char,
    _pack: c_int,
    _use_wchar: c_int,
    size: usize,
) -> c_int {
    let bytes = unsafe { CStr::from_ptr(source) }.to_bytes();
    let count = bytes.len().min(size.saturating_sub(1));
    for (index, &byte) in bytes[..count].iter().enumerate() {
        unsafe { dest.add(index).write(byte as Cell) };
    }
    if size > 0 {
        unsafe { dest.add(count).write(0) };
    }
    0
}

unsafe extern "C" fn fake_raise_error(_amx: *mut Amx, error: c_int) -> c_int {
    with_script(|script| script.raised.push(error));
    0
}

/// Export table with the entries the plugin uses; every other slot is null.
pub fn fake_exports() -> AmxExports {
    let mut table = vec![std::ptr::null::<c_void>(); EXPORT_COUNT];
    table[EXPORT_EXEC] = fake_exec as *const c_void;
    table[EXPORT_REGISTER] = fake_register as *const c_void;
    table[EXPORT_FIND_PUB_VAR] = fake_find_pub_var as *const c_void;
    table[EXPORT_GET_ADDR] = fake_get_addr as *const c_void;
    table[EXPORT_STR_LEN] = fake_str_len as *const c_void;
    table[EXPORT_GET_STRING] = fake_get_string as *const c_void;
    table[EXPORT_SET_STRING] = fake_set_string as *const c_void;
    table[EXPORT_RAISE_ERROR] = fake_raise_error as *const c_void;
    let table = Box::leak(table.into_boxed_slice());
    unsafe { AmxExports::from_raw(table.as_mut_ptr().cast::<c_void>()) }
        .expect("table is not null")
}

pub fn empty_exports() -> AmxExports {
    let table = Box::leak(vec![std::ptr::null::<c_void>(); EXPORT_COUNT].into_boxed_slice());
    unsafe { AmxExports::from_raw(table.as_mut_ptr().cast::<c_void>()) }
        .expect("table is not null")
}

/// Script image with a name-offset native table followed by a code segment.
pub struct ScriptImage {
    words: Vec<u64>,
}

impl ScriptImage {
    pub fn new(natives: &[(&str, UCell)]) -> Self {
        Self::with_code(natives, &[])
    }

    pub fn with_code(natives: &[(&str, UCell)], code: &[Cell]) -> Self {
        let defsize = std::mem::size_of::<FuncStubNt>();
        let libraries = AMX_HEADER_SIZE + natives.len() * defsize;
        let mut bytes = vec![0u8; libraries];
        for (position, (name, address)) in natives.iter().enumerate() {
            let record = AMX_HEADER_SIZE + position * defsize;
            bytes[record..record + CELL_SIZE].copy_from_slice(&address.to_ne_bytes());
            let nameofs = bytes.len() as u32;
            bytes[record + CELL_SIZE..record + CELL_SIZE + 4].copy_from_slice(&nameofs.to_ne_bytes());
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0);
        }
        bytes.resize(bytes.len().next_multiple_of(CELL_SIZE), 0);
        let cod = bytes.len() as i32;
        for cell in code {
            bytes.extend_from_slice(&cell.to_ne_bytes());
        }
        let size = bytes.len() as i32;
        let header = AmxHeader {
            size,
            defsize: defsize as i16,
            cod,
            dat: size,
            hea: size,
            stp: size,
            natives: AMX_HEADER_SIZE as i32,
            libraries: libraries as i32,
            ..AmxHeader::default()
        };

        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        unsafe {
            let base = words.as_mut_ptr().cast::<u8>();
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), base, bytes.len());
            base.cast::<AmxHeader>().write_unaligned(header);
        }
        Self { words }
    }

    pub fn base(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast::<u8>()
    }

    pub fn native_address(&self, index: usize) -> UCell {
        let record = AMX_HEADER_SIZE + index * std::mem::size_of::<FuncStubNt>();
        unsafe {
            self.words
                .as_ptr()
                .cast::<u8>()
                .add(record)
                .cast::<UCell>()
                .read_unaligned()
        }
    }

    /// A host `AMX` whose image is this script.
    pub fn amx(&mut self) -> Box<Amx> {
        let mut amx: Box<Amx> = Box::new(unsafe { std::mem::zeroed() });
        amx.base = self.base();
        amx
    }
}
