//! Host facts announced in the session challenge.

/// Operating system family, with stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OsType {
    Unknown = 0,
    Windows = 1,
    Linux = 2,
    MacOs = 3,
}

impl OsType {
    /// The family this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else if cfg!(target_os = "linux") {
            OsType::Linux
        } else if cfg!(target_os = "macos") {
            OsType::MacOs
        } else {
            OsType::Unknown
        }
    }

    pub fn from_wire(value: u32) -> Self {
        match value {
            1 => OsType::Windows,
            2 => OsType::Linux,
            3 => OsType::MacOs,
            _ => OsType::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OsType::Unknown => "unknown",
            OsType::Windows => "Windows",
            OsType::Linux => "Linux",
            OsType::MacOs => "macOS",
        }
    }
}

/// Host name as reported by the OS.
pub fn computer_name() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Logical CPU count.
pub fn cpu_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
