use thiserror::Error;

use super::state::{Direction, ProtocolState};

/// Protocol decode/encode error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error("buffer underrun")]
    UnexpectedEof,
    #[error("VarInt too large")]
    VarIntTooLarge,
    #[error("VarLong too large")]
    VarLongTooLarge,
    #[error("packet too large: {len} bytes")]
    PacketTooLarge { len: usize },
    #[error("negative length {0}")]
    NegativeLength(i32),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("string too long: {actual} chars (max {max})")]
    StringTooLong { max: usize, actual: usize },
    #[error("length too large: {actual} bytes (max {max})")]
    LengthTooLarge { max: usize, actual: usize },
    #[error("{0} trailing bytes after packet body")]
    TrailingBytes(usize),
    #[error("invalid UUID string {0:?}")]
    InvalidUuid(String),
    #[error("no packet 0x{id:02x} in {state:?} for {direction:?}")]
    UnknownPacket {
        id: i32,
        state: ProtocolState,
        direction: Direction,
    },
}

pub type Result<T> = std::result::Result<T, ProtoError>;

pub(crate) fn debug_log_error(context: &str, error: &ProtoError) {
    #[cfg(debug_assertions)]
    {
        log::error!("{}: {}", context, error);
    }
    let _ = context;
    let _ = error;
}
