//! Length-prefixed framing: `VarInt(len) ++ VarInt(id) ++ body`, where `len`
//! covers the id and the body.

use bytes::{Buf, Bytes, BytesMut};

use super::{
    error::{debug_log_error, ProtoError, Result},
    state::PacketDescriptor,
    varint::{read_varint_partial, write_varint},
};

/// Maximum packet length in bytes (protocol limit).
pub const MAX_PACKET_SIZE: usize = 2_097_152;

/// Static identity of a packet variant.
pub trait PacketKind {
    const DESCRIPTOR: PacketDescriptor;
    const NAME: &'static str;
}

/// Packet body encoding.
pub trait PacketEncode: PacketKind {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Appends the whole frame for this packet to `out`.
    fn encode_frame(&self, out: &mut Vec<u8>) -> Result<()> {
        write_frame(out, Self::DESCRIPTOR.id, |out| self.encode_body(out))
    }
}

/// Packet body decoding.
pub trait PacketDecode: PacketKind + Sized {
    fn decode_body(input: &mut &[u8]) -> Result<Self>;
}

/// A frame split off the inbound stream. `body` is everything after the id
/// and shares memory with the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFrame {
    pub id: i32,
    pub body: Bytes,
}

/// Collects inbound bytes and splits off complete frames. Bytes of an
/// incomplete frame stay queued until the rest arrives.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as a frame.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf = BytesMut::new();
    }

    /// Returns the next complete frame, or `Ok(None)` if only part of one is
    /// buffered.
    pub fn try_next_frame(&mut self) -> Result<Option<PacketFrame>> {
        self.split_frame()
            .inspect_err(|err| debug_log_error("frame decode failed", err))
    }

    fn split_frame(&mut self) -> Result<Option<PacketFrame>> {
        let Some((len, prefix)) = read_varint_partial(&self.buf)? else {
            return Ok(None);
        };
        let len = usize::try_from(len).map_err(|_| ProtoError::NegativeLength(len))?;
        if len > MAX_PACKET_SIZE {
            return Err(ProtoError::PacketTooLarge { len });
        }
        if self.buf.len() - prefix < len {
            return Ok(None);
        }

        self.buf.advance(prefix);
        let mut body = self.buf.split_to(len).freeze();
        let (id, id_len) = read_varint_partial(&body)?.ok_or(ProtoError::UnexpectedEof)?;
        body.advance(id_len);
        Ok(Some(PacketFrame { id, body }))
    }
}

/// Appends one frame to `out`. `body` writes the payload after the id; the
/// length prefix goes in front once the size is known. On error `out` is left
/// as it was.
pub fn write_frame<F>(out: &mut Vec<u8>, id: i32, body: F) -> Result<()>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut payload = Vec::new();
    write_varint(&mut payload, id);
    body(&mut payload)?;
    if payload.len() > MAX_PACKET_SIZE {
        return Err(ProtoError::PacketTooLarge { len: payload.len() });
    }

    write_varint(out, payload.len() as i32);
    out.extend_from_slice(&payload);
    Ok(())
}
