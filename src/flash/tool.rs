use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::{FlashError, Result};

/// Target parameters of the shipped hand controller hardware.
pub const TARGET_CHIP: &str = "esp32c3";
pub const FLASH_BAUD: &str = "921600";
/// Application images live past the bootloader/partition table region.
pub const APP_FLASH_OFFSET: &str = "0x10000";

/// Marker file identifying a usable ESP-IDF installation.
const IDF_MARKER: &str = "export.sh";

/// Resolved flashing-tool strategy, in discovery preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashTool {
    /// `esptool` available directly on PATH.
    Executable(PathBuf),
    /// Python interpreter with an importable `esptool` module.
    PythonModule(PathBuf),
    /// Local ESP-IDF installation carrying its bundled esptool script.
    IdfInstall(PathBuf),
}

/// Everything needed to spawn the tool besides the flash arguments.
pub struct ToolInvocation {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl FlashTool {
    /// Probe the host for a flashing tool; first strategy that resolves
    /// wins.
    pub async fn resolve() -> Option<FlashTool> {
        if let Ok(path) = which::which("esptool") {
            log::info!("Found esptool on PATH: {}", path.display());
            return Some(FlashTool::Executable(path));
        }

        for python in ["python3", "python"] {
            if python_has_esptool(python).await {
                log::info!("Found esptool module via {}", python);
                return Some(FlashTool::PythonModule(PathBuf::from(python)));
            }
        }

        if let Some(dir) = idf_install_dir() {
            log::info!("Found ESP-IDF installation: {}", dir.display());
            return Some(FlashTool::IdfInstall(dir));
        }

        None
    }

    pub fn describe(&self) -> String {
        match self {
            FlashTool::Executable(path) => format!("esptool ({})", path.display()),
            FlashTool::PythonModule(python) => format!("{} -m esptool", python.display()),
            FlashTool::IdfInstall(dir) => format!("ESP-IDF ({})", dir.display()),
        }
    }

    /// Program, leading arguments and environment for this strategy.
    pub fn invocation(&self) -> Result<ToolInvocation> {
        match self {
            FlashTool::Executable(path) => Ok(ToolInvocation {
                program: path.clone(),
                leading_args: Vec::new(),
                env: Vec::new(),
            }),
            FlashTool::PythonModule(python) => Ok(ToolInvocation {
                program: python.clone(),
                leading_args: vec!["-m".to_string(), "esptool".to_string()],
                env: Vec::new(),
            }),
            FlashTool::IdfInstall(dir) => {
                let script = bundled_esptool(dir).ok_or(FlashError::NoFlashTool)?;
                Ok(ToolInvocation {
                    program: PathBuf::from("python3"),
                    leading_args: vec![script.to_string_lossy().into_owned()],
                    env: vec![(
                        "IDF_PATH".to_string(),
                        dir.to_string_lossy().into_owned(),
                    )],
                })
            }
        }
    }
}

/// Fixed esptool parameters for writing the application image.
pub fn flash_args(port: &str, firmware: &Path) -> Vec<String> {
    vec![
        "--chip".to_string(),
        TARGET_CHIP.to_string(),
        "--port".to_string(),
        port.to_string(),
        "--baud".to_string(),
        FLASH_BAUD.to_string(),
        "--before".to_string(),
        "default_reset".to_string(),
        "--after".to_string(),
        "hard_reset".to_string(),
        "write_flash".to_string(),
        APP_FLASH_OFFSET.to_string(),
        firmware.to_string_lossy().into_owned(),
    ]
}

async fn python_has_esptool(python: &str) -> bool {
    Command::new(python)
        .args(["-m", "esptool", "--help"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Conventional ESP-IDF install locations, then the IDF_PATH override.
fn idf_install_dir() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        candidates.push(home.join("esp/esp-idf"));
        candidates.push(home.join(".espressif/esp-idf"));
    }
    candidates.push(PathBuf::from("/opt/esp/esp-idf"));
    candidates.push(PathBuf::from("/usr/local/esp/esp-idf"));
    candidates.push(PathBuf::from(r"C:\Espressif\frameworks\esp-idf-v5.1.2"));
    candidates.push(PathBuf::from(r"C:\Espressif\frameworks\esp-idf-v5.2"));

    if let Some(idf_path) = std::env::var_os("IDF_PATH") {
        candidates.push(PathBuf::from(idf_path));
    }

    candidates
        .into_iter()
        .find(|dir| dir.join(IDF_MARKER).is_file())
}

fn bundled_esptool(idf_dir: &Path) -> Option<PathBuf> {
    let candidates = [
        idf_dir.join("components/esptool_py/esptool.py"),
        idf_dir.join("tools/esptool_py/esptool.py"),
    ];
    candidates.into_iter().find(|path| path.is_file())
}
