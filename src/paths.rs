use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the diagnostics directory for failed detections: `<exe_dir>/logging/weapons/`
pub fn get_diagnostics_dir() -> PathBuf {
    get_exe_dir().join("logging").join("weapons")
}

/// Returns the scan output directory: `<exe_dir>/output/`
pub fn get_output_dir() -> PathBuf {
    get_exe_dir().join("output")
}

/// Resolves a resource path from config: absolute paths are kept, relative ones
/// are taken from the executable directory.
pub fn resolve_resource(relative: &str) -> PathBuf {
    let path = PathBuf::from(relative);
    if path.is_absolute() {
        path
    } else {
        get_exe_dir().join(path)
    }
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_diagnostics_dir())?;
    std::fs::create_dir_all(get_output_dir())?;
    Ok(())
}
