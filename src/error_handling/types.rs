use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    InvalidTimestamp(String),
    InvalidTimezoneOffset(String),
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeError::InvalidTimestamp(e) => write!(f, "Invalid timestamp: {}", e),
            TimeError::InvalidTimezoneOffset(e) => write!(f, "Invalid timezone offset: {}", e),
        }
    }
}

impl std::error::Error for TimeError {}

/// Failures reported by the capture library, carrying its diagnostic text verbatim.
#[derive(Debug)]
pub enum CaptureError {
    OpenFailed { path: PathBuf, reason: String },
    FilterCompilation { expression: String, reason: String },
    FilterInstall { expression: String, reason: String },
    ReadFailed { path: PathBuf, reason: String },
    OutputFailed(String),
    WriteFailed(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::OpenFailed { path, reason } => {
                write!(f, "Failed to open {}: {}", path.display(), reason)
            }
            CaptureError::FilterCompilation { expression, reason } => {
                write!(f, "Failed to compile filter \"{}\": {}", expression, reason)
            }
            CaptureError::FilterInstall { expression, reason } => {
                write!(f, "Failed to set filter \"{}\": {}", expression, reason)
            }
            CaptureError::ReadFailed { path, reason } => {
                write!(f, "Failed to read from {}: {}", path.display(), reason)
            }
            CaptureError::OutputFailed(e) => write!(f, "Failed to open output: {}", e),
            CaptureError::WriteFailed(e) => write!(f, "Failed to write packet: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug)]
pub enum SpoolError {
    DirectoryUnreadable(PathBuf, std::io::Error),
    Capture(CaptureError),
}

impl fmt::Display for SpoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoolError::DirectoryUnreadable(path, e) => {
                write!(f, "Unable to read spool directory {}: {}", path.display(), e)
            }
            SpoolError::Capture(e) => write!(f, "Spool capture error: {}", e),
        }
    }
}

impl std::error::Error for SpoolError {}

impl From<CaptureError> for SpoolError {
    fn from(err: CaptureError) -> Self {
        SpoolError::Capture(err)
    }
}

#[derive(Debug)]
pub enum ExtractError {
    Time(TimeError),
    Spool(SpoolError),
    Capture(CaptureError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Time(e) => write!(f, "{}", e),
            ExtractError::Spool(e) => write!(f, "{}", e),
            ExtractError::Capture(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<TimeError> for ExtractError {
    fn from(err: TimeError) -> Self {
        ExtractError::Time(err)
    }
}

impl From<SpoolError> for ExtractError {
    fn from(err: SpoolError) -> Self {
        ExtractError::Spool(err)
    }
}

impl From<CaptureError> for ExtractError {
    fn from(err: CaptureError) -> Self {
        ExtractError::Capture(err)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    DirectoryDoesNotExist(String),
    BadBindAddress(String),
    InvalidTimezoneOffset(String),
    NoSpools,
    DuplicateSpool(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::BadBindAddress(e) => write!(f, "Bind address error: {}", e),
            ConfigError::InvalidTimezoneOffset(e) => write!(f, "Timezone offset error: {}", e),
            ConfigError::NoSpools => write!(f, "No spools configured"),
            ConfigError::DuplicateSpool(name) => write!(f, "Spool \"{}\" configured twice", name),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
    SpawnFailed(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
            WebError::SpawnFailed(e) => write!(f, "Failed to spawn extraction process: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum PurgeError {
    DirectoryDoesNotExist(String),
    NotADirectory(String),
    IoError(std::io::Error),
    BadSize(String),
    NoPolicy,
}

impl fmt::Display for PurgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeError::DirectoryDoesNotExist(e) => write!(f, "Directory does not exist: {}", e),
            PurgeError::NotADirectory(e) => write!(f, "Path is not a directory: {}", e),
            PurgeError::IoError(e) => write!(f, "IO error: {}", e),
            PurgeError::BadSize(e) => write!(f, "Invalid size: {}", e),
            PurgeError::NoPolicy => {
                write!(f, "Either --keep-files or --max-size must be specified")
            }
        }
    }
}

impl std::error::Error for PurgeError {}

impl From<std::io::Error> for PurgeError {
    fn from(err: std::io::Error) -> Self {
        PurgeError::IoError(err)
    }
}
