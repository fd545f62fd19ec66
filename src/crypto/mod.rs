pub mod password;

pub use password::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed credential hash")]
    MalformedHash,

    #[error("Invalid PBKDF2 iteration count: {0}")]
    InvalidIterations(u32),

    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}
