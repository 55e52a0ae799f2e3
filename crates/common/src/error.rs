use thiserror::Error;

#[derive(Debug, Error)]
pub enum MalblockError {
    #[error("requests classified as unknown are never counted")]
    UnknownCategory,
}

pub type MalblockResult<T> = Result<T, MalblockError>;
