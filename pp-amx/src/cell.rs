#[cfg(all(feature = "cell16", feature = "cell64"))]
compile_error!("features `cell16` and `cell64` are mutually exclusive");

#[cfg(feature = "cell16")]
pub type Cell = i16;
#[cfg(feature = "cell16")]
pub type UCell = u16;

#[cfg(feature = "cell64")]
pub type Cell = i64;
#[cfg(feature = "cell64")]
pub type UCell = u64;

#[cfg(not(any(feature = "cell16", feature = "cell64")))]
pub type Cell = i32;
#[cfg(not(any(feature = "cell16", feature = "cell64")))]
pub type UCell = u32;

/// Width of one machine word of the VM, in bytes.
pub const CELL_SIZE: usize = std::mem::size_of::<Cell>();

/// Swaps the bytes of a cell on little endian hosts.
///
/// Packed strings and other byte-addressed data in the VM image are stored
/// big-end first inside each cell.
#[inline(always)]
pub fn align_cell(value: Cell) -> Cell {
    if cfg!(target_endian = "little") {
        value.swap_bytes()
    } else {
        value
    }
}

pub fn align_cell_array(cells: &mut [Cell]) {
    if cfg!(target_endian = "big") {
        return;
    }
    for cell in cells {
        *cell = align_cell(*cell);
    }
}

/// Copies `src` into `dest`, swapping bytes on the fly on little endian hosts.
/// Copies `min(dest.len(), src.len())` cells and returns that count.
pub fn copy_and_align_cell_array(dest: &mut [Cell], src: &[Cell]) -> usize {
    let count = dest.len().min(src.len());
    for (to, from) in dest[..count].iter_mut().zip(&src[..count]) {
        *to = align_cell(*from);
    }
    count
}

/// Byte offset of character `index` of a packed string, relative to the start
/// of the cell array that holds it.
pub fn packed_char_offset(index: usize) -> usize {
    if cfg!(target_endian = "big") {
        return index;
    }
    let within_cell = index & (CELL_SIZE - 1);
    index - within_cell + (CELL_SIZE - 1) - within_cell
}
