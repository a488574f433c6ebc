//! Error handling for kfreq CLI

use kfreq_core::CountError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kfreq CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Resource error: {message}")]
    Resource { message: String },

    #[error("Interrupted: {message}")]
    Interrupted { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn parse<S: Into<String>>(file: S, message: S) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn resource<S: Into<String>>(message: S) -> Self {
        Self::Resource { message: message.into() }
    }

    /// Attach the input file to a counting error
    pub fn from_count(file: &std::path::Path, err: CountError) -> Self {
        match err {
            CountError::InvalidParameter(message) => Self::validation(message),
            CountError::SourceUnavailable { reason, .. } if !file.exists() => {
                log::debug!("{}", reason);
                Self::file_not_found(file.to_path_buf())
            }
            CountError::SourceUnavailable { name, reason } => Self::io(format!("{}: {}", name, reason)),
            CountError::Parse(message) => Self::parse(file.display().to_string(), message),
            err @ CountError::CapacityExceeded { .. } => Self::resource(err.to_string()),
            CountError::Io(err) => Self::io(err.to_string()),
            err @ CountError::Cancelled { .. } => Self::Interrupted { message: err.to_string() },
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file\n\
                 • Compressed input must carry a .gz extension",
                path.display()
            ));
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Input must be FASTA or FASTQ\n\
                 • Ensure the file is not corrupted or truncated",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your kfreq.toml configuration file\n\
                 • Use 'kfreq --print-config' to generate a sample configuration\n\
                 • Verify that all configuration values are valid",
            );
        }

        CliError::Resource { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Raise the memory budget with --target-memory\n\
                 • Raise the disk budget with --target-disk\n\
                 • Force the exact strategy with --strategy partitioned",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
