#![allow(dead_code, unused_imports)]

use std::ffi::c_int;
use std::mem::size_of;

pub use amx::{
    AMX_HEADER_SIZE, AMX_MAGIC, AmxHeader, CELL_SIZE, Cell, EXPMAX, FuncStub, FuncStubNt, Image,
    Interpreter, LayoutError, OpcodeEpoch, StubLayout, UCell,
};

/// An AMX image assembled in memory: header, native stub table, name table and
/// code segment.
pub struct SyntheticImage {
    words: Vec<u64>,
    len: usize,
    pub natives: usize,
    pub cod: usize,
}

impl SyntheticImage {
    pub fn base(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast::<u8>()
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn header(&self) -> AmxHeader {
        unsafe { self.words.as_ptr().cast::<AmxHeader>().read_unaligned() }
    }

    pub fn image(&mut self, epoch: &OpcodeEpoch) -> Image<'_> {
        unsafe { Image::from_raw(self.base(), None, epoch) }.expect("synthetic image is well formed")
    }
}

pub struct ImageBuilder {
    layout: StubLayout,
    natives: Vec<(String, UCell)>,
    code: Vec<Cell>,
}

impl ImageBuilder {
    pub fn new(layout: StubLayout) -> Self {
        Self {
            layout,
            natives: Vec::new(),
            code: Vec::new(),
        }
    }

    pub fn native(mut self, name: &str, address: UCell) -> Self {
        self.natives.push((name.to_string(), address));
        self
    }

    pub fn natives(mut self, natives: &[(&str, UCell)]) -> Self {
        for (name, address) in natives {
            self.natives.push((name.to_string(), *address));
        }
        self
    }

    pub fn code(mut self, code: &[Cell]) -> Self {
        self.code = code.to_vec();
        self
    }

    pub fn build(self) -> SyntheticImage {
        let defsize = self.layout.record_size();
        let natives = AMX_HEADER_SIZE;
        let libraries = natives + self.natives.len() * defsize;

        let mut bytes = vec![0u8; libraries];
        let mut names = Vec::new();
        for (position, (name, address)) in self.natives.iter().enumerate() {
            let record = natives + position * defsize;
            bytes[record..record + CELL_SIZE].copy_from_slice(&address.to_ne_bytes());
            let field = record + CELL_SIZE;
            match self.layout {
                StubLayout::InlineName => {
                    assert!(name.len() <= EXPMAX, "inline native name too long");
                    bytes[field..field + name.len()].copy_from_slice(name.as_bytes());
                }
                StubLayout::NameOffset => {
                    let nameofs = (libraries + names.len()) as u32;
                    bytes[field..field + 4].copy_from_slice(&nameofs.to_ne_bytes());
                    names.extend_from_slice(name.as_bytes());
                    names.push(0);
                }
            }
        }
        bytes.extend_from_slice(&names);
        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }

        let cod = bytes.len();
        for cell in &self.code {
            bytes.extend_from_slice(&cell.to_ne_bytes());
        }
        let dat = bytes.len();

        let header = AmxHeader {
            size: dat as i32,
            magic: AMX_MAGIC,
            file_version: 8,
            amx_version: 8,
            defsize: defsize as i16,
            cod: cod as i32,
            dat: dat as i32,
            hea: dat as i32,
            stp: dat as i32,
            natives: natives as i32,
            libraries: libraries as i32,
            publics: natives as i32,
            pubvars: libraries as i32,
            tags: libraries as i32,
            nametable: libraries as i32,
            ..AmxHeader::default()
        };

        let len = bytes.len();
        let mut words = vec![0u64; len.div_ceil(8)];
        unsafe {
            let base = words.as_mut_ptr().cast::<u8>();
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), base, len);
            base.cast::<AmxHeader>().write_unaligned(header);
        }

        SyntheticImage {
            words,
            len,
            natives,
            cod,
        }
    }
}

/// Stub layout a synthetic image should use for `epoch`.
pub fn layout_for(epoch: &OpcodeEpoch) -> StubLayout {
    if epoch.inline_stub_names {
        StubLayout::InlineName
    } else {
        StubLayout::NameOffset
    }
}

/// Byte offset just past `cells` cells of code.
pub fn cip_after(cells: usize) -> Cell {
    (cells * CELL_SIZE) as Cell
}

/// Registers observed when the interpreter was asked to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecRecord {
    pub flags: c_int,
    pub cip: Cell,
    pub pri: Cell,
    pub index: c_int,
}

/// In-memory VM over a synthetic image. When `jump_table` is set it behaves
/// like a computed-goto core and reports the table's base on a browse request.
pub struct SyntheticVm {
    pub image: SyntheticImage,
    pub cip: Cell,
    pub flags: c_int,
    pub pri: Cell,
    pub jump_table: Option<Vec<Cell>>,
    pub execs: Vec<ExecRecord>,
    pub exec_status: c_int,
}

impl SyntheticVm {
    pub fn new(image: SyntheticImage, cip: Cell) -> Self {
        Self {
            image,
            cip,
            flags: 0,
            pri: 0,
            jump_table: None,
            execs: Vec::new(),
            exec_status: 0,
        }
    }

    pub fn with_flags(mut self, flags: c_int) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_jump_table(mut self, table: Vec<Cell>) -> Self {
        self.jump_table = Some(table);
        self
    }
}

impl Interpreter for SyntheticVm {
    fn image(&mut self, epoch: &OpcodeEpoch) -> Result<Image<'_>, LayoutError> {
        unsafe { Image::from_raw(self.image.base(), None, epoch) }
    }

    fn cip(&self) -> Cell {
        self.cip
    }

    fn set_cip(&mut self, cip: Cell) {
        self.cip = cip;
    }

    fn flags(&self) -> c_int {
        self.flags
    }

    fn set_flags(&mut self, flags: c_int) {
        self.flags = flags;
    }

    fn pri(&self) -> Cell {
        self.pri
    }

    fn set_pri(&mut self, pri: Cell) {
        self.pri = pri;
    }

    unsafe fn exec(&mut self, retval: *mut Cell, index: c_int) -> c_int {
        self.execs.push(ExecRecord {
            flags: self.flags,
            cip: self.cip,
            pri: self.pri,
            index,
        });
        if let Some(table) = &self.jump_table {
            unsafe { retval.cast::<usize>().write_unaligned(table.as_ptr() as usize) };
        }
        self.exec_status
    }
}

/// Label table standing in for a computed-goto core: every opcode maps to a
/// distinct value that is never a literal opcode number.
pub fn relocation_table() -> Vec<Cell> {
    (0..256).map(|opcode| (0x1000 + opcode * 8) as Cell).collect()
}
