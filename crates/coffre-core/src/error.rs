use thiserror::Error;

pub type CoffreResult<T> = Result<T, CoffreError>;

#[derive(Debug, Error)]
pub enum CoffreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("password rejected: {0}")]
    Policy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
