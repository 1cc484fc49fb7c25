#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginNative {
    pub index: u16,
    pub name: &'static str,
    pub arity: u8,
}

pub const SUPPORTS_VERSION: u32 = 0x0200;
pub const SUPPORTS_VERSION_MASK: u32 = 0xffff;
pub const SUPPORTS_AMX_NATIVES: u32 = 0x10000;
pub const SUPPORTS_PROCESS_TICK: u32 = 0x20000;

pub const PLUGIN_DATA_LOGPRINTF: usize = 0x00;
pub const PLUGIN_DATA_AMX_EXPORTS: usize = 0x10;
pub const PLUGIN_DATA_CALLPUBLIC_FS: usize = 0x11;
pub const PLUGIN_DATA_CALLPUBLIC_GM: usize = 0x12;

pub const EXPORT_ALIGN16: usize = 0;
pub const EXPORT_ALIGN32: usize = 1;
pub const EXPORT_ALIGN64: usize = 2;
pub const EXPORT_ALLOT: usize = 3;
pub const EXPORT_CALLBACK: usize = 4;
pub const EXPORT_CLEANUP: usize = 5;
pub const EXPORT_CLONE: usize = 6;
pub const EXPORT_EXEC: usize = 7;
pub const EXPORT_FIND_NATIVE: usize = 8;
pub const EXPORT_FIND_PUBLIC: usize = 9;
pub const EXPORT_FIND_PUB_VAR: usize = 10;
pub const EXPORT_FIND_TAG_ID: usize = 11;
pub const EXPORT_FLAGS: usize = 12;
pub const EXPORT_GET_ADDR: usize = 13;
pub const EXPORT_GET_NATIVE: usize = 14;
pub const EXPORT_GET_PUBLIC: usize = 15;
pub const EXPORT_GET_PUB_VAR: usize = 16;
pub const EXPORT_GET_STRING: usize = 17;
pub const EXPORT_GET_TAG: usize = 18;
pub const EXPORT_GET_USER_DATA: usize = 19;
pub const EXPORT_INIT: usize = 20;
pub const EXPORT_INIT_JIT: usize = 21;
pub const EXPORT_MEM_INFO: usize = 22;
pub const EXPORT_NAME_LENGTH: usize = 23;
pub const EXPORT_NATIVE_INFO: usize = 24;
pub const EXPORT_NUM_NATIVES: usize = 25;
pub const EXPORT_NUM_PUBLICS: usize = 26;
pub const EXPORT_NUM_PUB_VARS: usize = 27;
pub const EXPORT_NUM_TAGS: usize = 28;
pub const EXPORT_PUSH: usize = 29;
pub const EXPORT_PUSH_ARRAY: usize = 30;
pub const EXPORT_PUSH_STRING: usize = 31;
pub const EXPORT_RAISE_ERROR: usize = 32;
pub const EXPORT_REGISTER: usize = 33;
pub const EXPORT_RELEASE: usize = 34;
pub const EXPORT_SET_CALLBACK: usize = 35;
pub const EXPORT_SET_DEBUG_HOOK: usize = 36;
pub const EXPORT_SET_STRING: usize = 37;
pub const EXPORT_SET_USER_DATA: usize = 38;
pub const EXPORT_STR_LEN: usize = 39;
pub const EXPORT_UTF8_CHECK: usize = 40;
pub const EXPORT_UTF8_GET: usize = 41;
pub const EXPORT_UTF8_LEN: usize = 42;
pub const EXPORT_UTF8_PUT: usize = 43;

/// Number of slots in the host's AMX export table.
pub const EXPORT_COUNT: usize = 44;

pub const NATIVE_HELLO_WORLD: u16 = 0;
pub const NATIVE_PRINT_NUMBER: u16 = 1;
pub const NATIVE_PRINT_STRING: u16 = 2;
pub const NATIVE_CHECK_ARGS_TEST: u16 = 3;

pub const NATIVES: [PluginNative; 4] = [
    PluginNative {
        index: NATIVE_HELLO_WORLD,
        name: "HelloWorld",
        arity: 0,
    },
    PluginNative {
        index: NATIVE_PRINT_NUMBER,
        name: "HelloWorld_PrintNumber",
        arity: 1,
    },
    PluginNative {
        index: NATIVE_PRINT_STRING,
        name: "HelloWorld_PrintString",
        arity: 1,
    },
    PluginNative {
        index: NATIVE_CHECK_ARGS_TEST,
        name: "HelloWorld_CheckArgsTest",
        arity: 1,
    },
];

pub const NATIVE_COUNT: u16 = NATIVES.len() as u16;

fn natives_by_name() -> &'static std::collections::HashMap<&'static str, &'static PluginNative> {
    static LOOKUP: std::sync::OnceLock<
        std::collections::HashMap<&'static str, &'static PluginNative>,
    > = std::sync::OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut map = std::collections::HashMap::with_capacity(NATIVES.len());
        for native in NATIVES.iter() {
            map.insert(native.name, native);
        }
        map
    })
}

pub fn native_by_index(index: u16) -> Option<&'static PluginNative> {
    NATIVES.iter().find(|native| native.index == index)
}

pub fn native_by_name(name: &str) -> Option<&'static PluginNative> {
    natives_by_name().get(name).copied()
}

/// Pawn include file scripts compile against to call the plugin's natives.
pub fn include_inc() -> &'static str {
    include_str!("../helloworld.inc")
}
