//! Minecraft protocol types for handshake, status, and login.
pub mod proto;

pub use proto::{
    io, varint, write_frame, Direction, EncryptionRequestS2c, EncryptionResponseC2s,
    FrameDecoder, HandshakeC2s, HandshakeNextState, LoginDisconnectS2c, LoginPluginRequestS2c,
    LoginPluginResponseC2s, LoginStartC2s, LoginSuccessS2c, Packet, PacketDecode,
    PacketDecoderFn, PacketDescriptor, PacketEncode, PacketFrame, PacketKind, PacketRegistry,
    ProtoError, ProtocolState, Resolved, Result, SetCompressionS2c, StatusPingC2s, StatusPongS2c,
    StatusRequestC2s, StatusResponseS2c, MAX_PACKET_SIZE,
};
pub use uuid::Uuid;
