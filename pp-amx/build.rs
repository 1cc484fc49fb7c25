use std::env;

const DEFAULT_FILE_VERSION: &str = "8";

fn main() {
    println!("cargo:rerun-if-env-changed=PP_AMX_FILE_VERSION");

    let file_version = env::var("PP_AMX_FILE_VERSION")
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|_| DEFAULT_FILE_VERSION.to_string());

    println!("cargo:rustc-env=PP_AMX_FILE_VERSION={file_version}");

    // File version 11 images are run by Pawn 4.0 hosts, whose AMX structure
    // differs from the 3.x one.
    println!("cargo:rustc-check-cfg=cfg(amx_pawn4)");
    if file_version.parse::<u32>().is_ok_and(|version| version >= 11) {
        println!("cargo:rustc-cfg=amx_pawn4");
    }
}
