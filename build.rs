use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Copy catalogs and config next to the executable
    copy_resources();
    copy_config();
}

/// Resolves target/<profile> from OUT_DIR (target/<profile>/build/<crate>-<hash>/out).
fn target_dir() -> PathBuf {
    let out_dir = env::var("OUT_DIR").unwrap();
    Path::new(&out_dir)
        .ancestors()
        .nth(3)
        .expect("Could not find target directory")
        .to_path_buf()
}

/// Copies the resources folder so the executable can find the name catalogs.
fn copy_resources() {
    let resources_src = Path::new("resources");
    let resources_dst = target_dir().join("resources");

    if resources_src.exists() {
        copy_dir_recursive(resources_src, &resources_dst);
        println!("cargo:rerun-if-changed=resources/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let file_name = src_path.file_name().unwrap();
            let dst_path = dst.join(file_name);

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies config.json to the target directory.
fn copy_config() {
    let config_src = Path::new("config.json");
    let config_dst = target_dir().join("config.json");

    if config_src.exists() {
        let _ = fs::copy(config_src, &config_dst);
        println!("cargo:rerun-if-changed=config.json");
    }
}
