use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENGLISH_DATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXECUTABLES: &[&str] = &["/usr/bin/tesseract", "/usr/local/bin/tesseract"];

#[cfg(windows)]
const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inventory-scanner")
        .join("tesseract")
}

/// Locates Tesseract and its English language data, downloading the data file
/// into the local Tesseract directory if no installation provides it.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;

    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(_) => {
            let local = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&local)?;
            download_tessdata(&local)?;
            local
        }
    };

    log(&format!(
        "Tesseract ready: {} (data: {})",
        executable.display(),
        tessdata.display()
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches `eng.traineddata` into `tessdata_dir`. The file is written under a
/// temporary name first so an interrupted download is never picked up.
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, ENGLISH_DATA);
    log(&format!("Downloading {}", url));

    let mut response = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent("inventory-scanner")
        .build()?
        .get(&url)
        .send()?
        .error_for_status()
        .with_context(|| format!("{} download failed", ENGLISH_DATA))?;

    let partial = tessdata_dir.join(format!("{}.part", ENGLISH_DATA));
    let written = {
        let mut file = fs::File::create(&partial)?;
        std::io::copy(&mut response, &mut file)?
    };
    fs::rename(&partial, tessdata_dir.join(ENGLISH_DATA))?;

    log(&format!("Saved {} ({} bytes)", ENGLISH_DATA, written));
    Ok(())
}

/// Finds the Tesseract executable, checking our local dir first, then system
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            anyhow!(
                "Tesseract not found. Install Tesseract-OCR, add it to PATH, or copy it to {}",
                get_tesseract_dir().display()
            )
        })
}

/// Finds a tessdata directory containing `eng.traineddata`
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    candidates.extend(COMMON_TESSDATA.iter().map(PathBuf::from));

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }

    candidates
        .into_iter()
        .find(|dir| has_english_data(dir))
        .ok_or_else(|| anyhow!("No tessdata directory contains {}", ENGLISH_DATA))
}

fn has_english_data(dir: &Path) -> bool {
    dir.join(ENGLISH_DATA).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_has_english_data() {
        let dir = tempdir().unwrap();
        assert!(!has_english_data(dir.path()));
        fs::write(dir.path().join("eng.traineddata"), b"data").unwrap();
        assert!(has_english_data(dir.path()));
    }

    #[test]
    fn test_tesseract_dir_is_app_specific() {
        let dir = get_tesseract_dir();
        assert!(dir.ends_with(Path::new("inventory-scanner").join("tesseract")));
    }
}
