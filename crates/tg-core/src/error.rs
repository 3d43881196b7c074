use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed PLY: {0}")]
    Ply(String),
}

pub type Result<T> = std::result::Result<T, Error>;
