use std::path::PathBuf;

use crate::extraction::launcher::ExtractorCommand;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root of the video / annotation / frame-sequence layout.
    pub upload_dir: PathBuf,
    /// Program that performs frame extraction (default: `python3`).
    pub extractor_program: String,
    /// Script passed as the first argument to the extractor program.
    /// `None` when `EXTRACTOR_SCRIPT` is set to an empty string.
    pub extractor_script: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `UPLOAD_DIR`           | `uploads`                  |
    /// | `EXTRACTOR_PROGRAM`    | `python3`                  |
    /// | `EXTRACTOR_SCRIPT`     | `backend/get_frame.py`     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upload_dir = PathBuf::from(
            std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
        );

        let extractor_program =
            std::env::var("EXTRACTOR_PROGRAM").unwrap_or_else(|_| "python3".into());

        let extractor_script = std::env::var("EXTRACTOR_SCRIPT")
            .unwrap_or_else(|_| "backend/get_frame.py".into());
        let extractor_script = match extractor_script.trim() {
            "" => None,
            script => Some(PathBuf::from(script)),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upload_dir,
            extractor_program,
            extractor_script,
        }
    }

    /// The extractor invocation described by this configuration.
    pub fn extractor_command(&self) -> ExtractorCommand {
        ExtractorCommand {
            program: self.extractor_program.clone(),
            script: self.extractor_script.clone(),
        }
    }
}
