use std::ffi::CStr;
use std::fmt;

use amx::{Amx, Cell};

use crate::config::{INCLUDE_VERSION_VAR_NAME, PLUGIN_NAME, PLUGIN_VERSION, PluginVersion, split_version};
use crate::exports::AmxExports;

/// The script was compiled against an include file from another release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IncludeVersionMismatch {
    pub include: PluginVersion,
    pub plugin: PluginVersion,
}

impl fmt::Display for IncludeVersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PLUGIN_NAME}: Include file version ({}) does not match with the plugin version ({})!",
            self.include, self.plugin
        )
    }
}

impl std::error::Error for IncludeVersionMismatch {}

/// Value of the public variable `name`, or `None` if the script has no such
/// variable.
///
/// # Safety
/// `amx` must be a VM owned by the host that `exports` belongs to.
pub unsafe fn get_public_variable(exports: &AmxExports, amx: *mut Amx, name: &CStr) -> Option<Cell> {
    let amx_addr = unsafe { exports.find_pub_var(amx, name) }.ok()?;
    let phys_addr = unsafe { exports.get_addr(amx, amx_addr) }.ok()?;
    Some(unsafe { phys_addr.read() })
}

/// Scripts built without the version variable are accepted.
pub fn include_version_matches(include_version: Option<Cell>) -> Result<(), IncludeVersionMismatch> {
    match include_version {
        Some(version) if i64::from(version) != PLUGIN_VERSION => Err(IncludeVersionMismatch {
            include: split_version(i64::from(version)),
            plugin: split_version(PLUGIN_VERSION),
        }),
        _ => Ok(()),
    }
}

/// # Safety
/// `amx` must be a VM owned by the host that `exports` belongs to.
pub unsafe fn check_include_version(
    exports: &AmxExports,
    amx: *mut Amx,
) -> Result<(), IncludeVersionMismatch> {
    include_version_matches(unsafe { get_public_variable(exports, amx, INCLUDE_VERSION_VAR_NAME) })
}
