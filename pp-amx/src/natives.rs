use tracing::debug;

use crate::cell::UCell;
use crate::layout::Image;

/// Retargets the first native named `name` to `replacement`.
///
/// Returns the address the stub held before, which the replacement may call to
/// pass through and which restores the original when installed again. Returns
/// `None`, leaving the table untouched, when no native has that name.
pub fn install_hook(image: &mut Image<'_>, name: &str, replacement: UCell) -> Option<UCell> {
    let index = image.find_native(name)?.index;
    let previous = image.set_native_address(index, replacement)?;
    debug!(
        native = name,
        index, "native retargeted from {previous:#x} to {replacement:#x}"
    );
    Some(previous)
}
