use std::ffi::CStr;
use std::fmt;

pub const PLUGIN_NAME: &str = "HelloWorld";

/// Packed as `major << 24 | minor << 16 | build`.
pub const PLUGIN_VERSION: i64 = 0x0100_0000;

/// Public variable the include file defines with the version it was shipped
/// with.
pub const INCLUDE_VERSION_VAR_NAME: &CStr = c"_helloworld_version";

/// Environment variable holding the log filter directives.
pub const LOG_FILTER_ENV: &str = "PP_PLUGIN_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

pub fn split_version(version: i64) -> PluginVersion {
    PluginVersion {
        major: ((version >> 24) & 0xff) as u8,
        minor: ((version >> 16) & 0xff) as u8,
        build: (version & 0xffff) as u16,
    }
}
