//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use cogify::config::ConfigError;
use cogify::convert::ConvertError;

/// Exit code for fatal errors.
pub const EXIT_FATAL: i32 = 1;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Input directory missing or unusable
    Input(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Conversion run failed
    Convert(ConvertError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Convert(ConvertError::ExternalTool { .. })
            | CliError::Convert(ConvertError::Source(_)) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. GDAL not installed: sudo apt install gdal-bin (Linux)");
                eprintln!("  2. Or run the tools in a container with --docker");
                eprintln!("  3. Source files that are not georeferenced GeoTIFFs");
            }
            CliError::Convert(ConvertError::Planning(_)) => {
                eprintln!();
                eprintln!("The input directory must contain .tif or .tiff files.");
            }
            _ => {}
        }

        process::exit(EXIT_FATAL)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Convert(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Convert(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ConvertError> for CliError {
    fn from(e: ConvertError) -> Self {
        CliError::Convert(e)
    }
}
