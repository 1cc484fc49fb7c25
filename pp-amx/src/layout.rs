//! Typed views over a loaded AMX image.
//!
//! All offset arithmetic over the native stub table lives in [`Image`]; the
//! decoder and the hook editor only ever see stub indices, addresses and names.

use std::ffi::{CStr, c_char, c_int, c_long, c_void};
use std::marker::PhantomData;
use std::mem::{offset_of, size_of};
use std::ptr::NonNull;

use crate::cell::{CELL_SIZE, Cell, UCell};
use crate::epoch::OpcodeEpoch;

/// Longest native name an inline stub can hold, terminator excluded
/// (`sEXPMAX` of the compiler).
pub const EXPMAX: usize = 19;
pub const AMX_USERNUM: usize = 4;

#[cfg(feature = "cell16")]
pub const AMX_MAGIC: u16 = 0xf1e2;
#[cfg(feature = "cell64")]
pub const AMX_MAGIC: u16 = 0xf1e1;
#[cfg(not(any(feature = "cell16", feature = "cell64")))]
pub const AMX_MAGIC: u16 = 0xf1e0;

/// Prefix of every AMX image, as laid out in memory after loading.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmxHeader {
    pub size: i32,
    pub magic: u16,
    pub file_version: u8,
    pub amx_version: u8,
    pub flags: i16,
    pub defsize: i16,
    pub cod: i32,
    pub dat: i32,
    pub hea: i32,
    pub stp: i32,
    pub cip: i32,
    pub publics: i32,
    pub natives: i32,
    pub libraries: i32,
    pub pubvars: i32,
    pub tags: i32,
    pub nametable: i32,
}

pub const AMX_HEADER_SIZE: usize = size_of::<AmxHeader>();

/// Stub record with the name stored inline (file versions up to 6, and images
/// loaded without a name table).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct FuncStub {
    pub address: UCell,
    pub name: [c_char; EXPMAX + 1],
}

/// Stub record referring to its name through an offset from the header.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FuncStubNt {
    pub address: UCell,
    pub nameofs: u32,
}

pub type AmxNative = unsafe extern "C" fn(amx: *mut Amx, params: *const Cell) -> Cell;
pub type AmxCallback =
    unsafe extern "C" fn(amx: *mut Amx, index: Cell, result: *mut Cell, params: *const Cell) -> c_int;
pub type AmxDebug = unsafe extern "C" fn(amx: *mut Amx) -> c_int;

/// Entry of the list handed to `amx_Register`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AmxNativeInfo {
    pub name: *const c_char,
    pub func: AmxNative,
}

/// Run-time state of one script, as kept by a Pawn 3.x host.
#[cfg(not(amx_pawn4))]
#[repr(C)]
#[derive(Debug)]
pub struct Amx {
    pub base: *mut u8,
    pub data: *mut u8,
    pub callback: Option<AmxCallback>,
    pub debug: Option<AmxDebug>,
    pub cip: Cell,
    pub frm: Cell,
    pub hea: Cell,
    pub hlw: Cell,
    pub stk: Cell,
    pub stp: Cell,
    pub flags: c_int,
    pub usertags: [c_long; AMX_USERNUM],
    pub userdata: [*mut c_void; AMX_USERNUM],
    pub error: c_int,
    pub paramcount: c_int,
    pub pri: Cell,
    pub alt: Cell,
    pub reset_stk: Cell,
    pub reset_hea: Cell,
    pub sysreq_d: Cell,
}

#[cfg(amx_pawn4)]
pub type AmxOverlay = unsafe extern "C" fn(amx: *mut Amx, index: c_int) -> c_int;

/// Run-time state of one script, as kept by a Pawn 4.0 host. The code
/// segment may live outside the image when overlays are in use.
#[cfg(amx_pawn4)]
#[repr(C)]
#[derive(Debug)]
pub struct Amx {
    pub base: *mut u8,
    pub code: *mut u8,
    pub data: *mut u8,
    pub callback: Option<AmxCallback>,
    pub debug: Option<AmxDebug>,
    pub overlay: Option<AmxOverlay>,
    pub cip: Cell,
    pub frm: Cell,
    pub hea: Cell,
    pub hlw: Cell,
    pub stk: Cell,
    pub stp: Cell,
    pub flags: c_int,
    pub usertags: [c_long; AMX_USERNUM],
    pub userdata: [*mut c_void; AMX_USERNUM],
    pub error: c_int,
    pub paramcount: c_int,
    pub pri: Cell,
    pub alt: Cell,
    pub reset_stk: Cell,
    pub reset_hea: Cell,
    pub ovl_index: c_int,
    pub codesize: c_long,
}

impl Amx {
    /// Code segment the host executes from, when it is not `base + cod`.
    #[cfg(amx_pawn4)]
    pub fn code_segment(&self) -> Option<*mut u8> {
        NonNull::new(self.code).map(NonNull::as_ptr)
    }

    #[cfg(not(amx_pawn4))]
    pub fn code_segment(&self) -> Option<*mut u8> {
        None
    }

    /// The loaded image of this script.
    ///
    /// # Safety
    /// Same contract as [`Image::from_raw`] for `base` and the code segment.
    pub unsafe fn image(&mut self, epoch: &OpcodeEpoch) -> Result<Image<'_>, LayoutError> {
        unsafe { Image::from_raw(self.base, self.code_segment(), epoch) }
    }
}

/// How a stub record stores the name of its native.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StubLayout {
    InlineName,
    NameOffset,
}

impl StubLayout {
    /// Picks the layout from the record size found in the header.
    pub fn select(epoch: &OpcodeEpoch, defsize: usize) -> Self {
        if epoch.inline_stub_names && defsize == size_of::<FuncStub>() {
            StubLayout::InlineName
        } else {
            StubLayout::NameOffset
        }
    }

    pub fn record_size(self) -> usize {
        match self {
            StubLayout::InlineName => size_of::<FuncStub>(),
            StubLayout::NameOffset => size_of::<FuncStubNt>(),
        }
    }

    fn name_field(self) -> usize {
        match self {
            StubLayout::InlineName => offset_of!(FuncStub, name),
            StubLayout::NameOffset => offset_of!(FuncStubNt, nameofs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    NullBase,
    NullCode,
    InvalidImageSize(i32),
    InvalidStubSize(i16),
    NativeTableBounds {
        natives: i32,
        libraries: i32,
        size: i32,
    },
    CodeSegmentBounds {
        cod: i32,
        dat: i32,
        size: i32,
    },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::NullBase => write!(f, "image base pointer is null"),
            LayoutError::NullCode => write!(f, "code segment pointer is null"),
            LayoutError::InvalidImageSize(size) => write!(f, "invalid image size {size}"),
            LayoutError::InvalidStubSize(defsize) => {
                write!(f, "invalid native stub record size {defsize}")
            }
            LayoutError::NativeTableBounds {
                natives,
                libraries,
                size,
            } => write!(
                f,
                "native table {natives:#x}..{libraries:#x} outside image of {size} bytes",
            ),
            LayoutError::CodeSegmentBounds { cod, dat, size } => write!(
                f,
                "code segment {cod:#x}..{dat:#x} outside image of {size} bytes",
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// One record of the native stub table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeStub<'a> {
    pub index: usize,
    pub address: UCell,
    pub name: &'a CStr,
}

/// Borrowed handle over an AMX image owned by the host.
///
/// The only location ever written through this handle is the `address` field
/// of a stub record, by [`crate::natives::install_hook`].
pub struct Image<'a> {
    base: NonNull<u8>,
    code: NonNull<u8>,
    code_len: Option<usize>,
    header: AmxHeader,
    layout: StubLayout,
    natives: usize,
    defsize: usize,
    count: usize,
    _image: PhantomData<&'a mut [u8]>,
}

impl<'a> Image<'a> {
    /// Wraps the image at `base`. `code` overrides the code segment location
    /// for hosts that keep it outside the image (overlays); otherwise the
    /// segment is taken from the header.
    ///
    /// # Safety
    /// `base` must point to a loaded image that stays valid, and is not
    /// accessed through other paths while writing, for `'a`. The same holds
    /// for `code` when given.
    pub unsafe fn from_raw(
        base: *mut u8,
        code: Option<*mut u8>,
        epoch: &OpcodeEpoch,
    ) -> Result<Self, LayoutError> {
        let base = NonNull::new(base).ok_or(LayoutError::NullBase)?;
        let header = unsafe { base.as_ptr().cast::<AmxHeader>().read_unaligned() };

        let size = header.size;
        if size < AMX_HEADER_SIZE as i32 {
            return Err(LayoutError::InvalidImageSize(size));
        }

        let defsize = header.defsize;
        let layout = StubLayout::select(epoch, defsize.max(0) as usize);
        if defsize <= 0 || (defsize as usize) < layout.record_size() {
            return Err(LayoutError::InvalidStubSize(defsize));
        }

        let (natives, libraries) = (header.natives, header.libraries);
        if natives < 0 || libraries < natives || libraries > size {
            return Err(LayoutError::NativeTableBounds {
                natives,
                libraries,
                size,
            });
        }

        let (code, code_len) = match code {
            Some(code) => (NonNull::new(code).ok_or(LayoutError::NullCode)?, None),
            None => {
                let (cod, dat) = (header.cod, header.dat);
                if cod < 0 || dat < cod || dat > size {
                    return Err(LayoutError::CodeSegmentBounds { cod, dat, size });
                }
                let code = unsafe { base.add(cod as usize) };
                (code, Some((dat - cod) as usize))
            }
        };

        Ok(Self {
            base,
            code,
            code_len,
            header,
            layout,
            natives: natives as usize,
            defsize: defsize as usize,
            count: (libraries - natives) as usize / defsize as usize,
            _image: PhantomData,
        })
    }

    pub fn header(&self) -> AmxHeader {
        self.header
    }

    pub fn layout(&self) -> StubLayout {
        self.layout
    }

    pub fn native_count(&self) -> usize {
        self.count
    }

    /// Reads the cell at byte `offset` of the code segment.
    pub fn code_cell(&self, offset: usize) -> Option<Cell> {
        let end = offset.checked_add(CELL_SIZE)?;
        if let Some(len) = self.code_len
            && end > len
        {
            return None;
        }
        Some(unsafe { self.code.as_ptr().add(offset).cast::<Cell>().read_unaligned() })
    }

    pub fn native(&self, index: usize) -> Option<NativeStub<'a>> {
        Some(NativeStub {
            index,
            address: self.native_address(index)?,
            name: self.native_name(index)?,
        })
    }

    pub fn native_address(&self, index: usize) -> Option<UCell> {
        let record = self.record(index)?;
        Some(unsafe { record.cast::<UCell>().read_unaligned() })
    }

    pub fn native_name(&self, index: usize) -> Option<&'a CStr> {
        self.record_name(self.record(index)?)
    }

    pub fn natives(&self) -> Natives<'_, 'a> {
        Natives {
            image: self,
            next: 0,
        }
    }

    /// First stub, in registration order, whose name equals `name` byte for byte.
    pub fn find_native(&self, name: &str) -> Option<NativeStub<'a>> {
        self.natives()
            .find(|stub| stub.name.to_bytes() == name.as_bytes())
    }

    /// Index of the first stub, in registration order, registered at `address`.
    pub fn find_native_by_address(&self, address: UCell) -> Option<usize> {
        (0..self.count).find(|&index| self.native_address(index) == Some(address))
    }

    /// Overwrites the function pointer of stub `index`, returning the old one.
    pub(crate) fn set_native_address(&mut self, index: usize, address: UCell) -> Option<UCell> {
        let record = self.record(index)?.cast::<UCell>();
        unsafe {
            let previous = record.read_unaligned();
            record.write_unaligned(address);
            Some(previous)
        }
    }

    fn record(&self, index: usize) -> Option<*mut u8> {
        if index >= self.count {
            return None;
        }
        let offset = self.natives + index * self.defsize;
        Some(unsafe { self.base.as_ptr().add(offset) })
    }

    fn record_name(&self, record: *mut u8) -> Option<&'a CStr> {
        let field = unsafe { record.add(self.layout.name_field()) };
        match self.layout {
            StubLayout::InlineName => {
                let bytes = unsafe { std::slice::from_raw_parts(field, EXPMAX + 1) };
                CStr::from_bytes_until_nul(bytes).ok()
            }
            StubLayout::NameOffset => {
                let nameofs = unsafe { field.cast::<u32>().read_unaligned() } as usize;
                let size = self.header.size as usize;
                if nameofs >= size {
                    return None;
                }
                let bytes = unsafe {
                    std::slice::from_raw_parts(self.base.as_ptr().add(nameofs), size - nameofs)
                };
                CStr::from_bytes_until_nul(bytes).ok()
            }
        }
    }
}

impl std::fmt::Debug for Image<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("base", &self.base)
            .field("layout", &self.layout)
            .field("natives", &self.count)
            .field("code_len", &self.code_len)
            .finish()
    }
}

pub struct Natives<'i, 'a> {
    image: &'i Image<'a>,
    next: usize,
}

impl<'a> Iterator for Natives<'_, 'a> {
    type Item = NativeStub<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.image.count {
            let index = self.next;
            self.next += 1;
            if let Some(stub) = self.image.native(index) {
                return Some(stub);
            }
        }
        None
    }
}
