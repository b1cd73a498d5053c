use thiserror::Error;

/// Error type shared by the bootstrap and uploader components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    // Field is named source_path, not source: thiserror reserves `source`
    // for the error-source chain.
    #[error("Path {path} is not under source {source_path}")]
    PathOutsideSource { path: String, source_path: String },

    #[error(
        "Artifact upload for file {source_path} (size: {size} bytes) was denied by the server. \
         This usually happens when the server runs out of disk space."
    )]
    ArtifactTooLarge { source_path: String, size: u64 },

    #[error("Failed to upload {source_path}. Server response: {status}")]
    UploadRejected { source_path: String, status: String },
}
