use std::path::PathBuf;
use thiserror::Error;

use super::download::{ClientError, ExtractError, FetchError, PlatformError, ProxyError, ResolveError};
use super::finalize::FinalizeError;

/// Everything that can abort an install attempt
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("could not read installation marker in {}: {source}", home.display())]
    Marker {
        home: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create installation directory {}: {source}", path.display())]
    CreateHome {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    #[error("could not find executable <{}>", path.display())]
    ExecutableNotFound { path: PathBuf },
}
