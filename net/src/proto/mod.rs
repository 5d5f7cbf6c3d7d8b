//! Minecraft protocol framing for handshake, status, and login.

mod error;
mod frame;
pub mod io;
mod packets;
mod registry;
mod state;
pub mod varint;


pub use error::{ProtoError, Result};
pub use frame::{
    write_frame, FrameDecoder, PacketDecode, PacketEncode, PacketFrame, PacketKind,
    MAX_PACKET_SIZE,
};
pub use packets::{
    EncryptionRequestS2c, EncryptionResponseC2s, HandshakeC2s, LoginDisconnectS2c,
    LoginPluginRequestS2c, LoginPluginResponseC2s, LoginStartC2s, LoginSuccessS2c, Packet,
    SetCompressionS2c, StatusPingC2s, StatusPongS2c, StatusRequestC2s, StatusResponseS2c,
};
pub use registry::{PacketDecoderFn, PacketRegistry, Resolved};
pub use state::{Direction, HandshakeNextState, PacketDescriptor, ProtocolState};
