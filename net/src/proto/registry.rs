//! Static packet table keyed by (id, state, direction).

use std::{collections::HashMap, sync::OnceLock};

use super::{
    error::{debug_log_error, ProtoError, Result},
    frame::{PacketDecode, PacketFrame, PacketKind},
    packets::{
        EncryptionRequestS2c, EncryptionResponseC2s, HandshakeC2s, LoginDisconnectS2c,
        LoginPluginRequestS2c, LoginPluginResponseC2s, LoginStartC2s, LoginSuccessS2c, Packet,
        SetCompressionS2c, StatusPingC2s, StatusPongS2c, StatusRequestC2s, StatusResponseS2c,
    },
    state::{Direction, PacketDescriptor, ProtocolState},
};

type DecodeFn = fn(&mut &[u8]) -> Result<Packet>;

struct Entry {
    descriptor: PacketDescriptor,
    name: &'static str,
    decode: DecodeFn,
}

macro_rules! entries {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        [$(
            Entry {
                descriptor: <$ty as PacketKind>::DESCRIPTOR,
                name: <$ty as PacketKind>::NAME,
                decode: |input| <$ty as PacketDecode>::decode_body(input).map(Packet::$variant),
            }
        ),*]
    };
}

const TABLE: [Entry; 13] = entries![
    Handshake(HandshakeC2s),
    StatusRequest(StatusRequestC2s),
    StatusResponse(StatusResponseS2c),
    StatusPing(StatusPingC2s),
    StatusPong(StatusPongS2c),
    LoginDisconnect(LoginDisconnectS2c),
    LoginStart(LoginStartC2s),
    EncryptionRequest(EncryptionRequestS2c),
    EncryptionResponse(EncryptionResponseC2s),
    LoginSuccess(LoginSuccessS2c),
    SetCompression(SetCompressionS2c),
    LoginPluginRequest(LoginPluginRequestS2c),
    LoginPluginResponse(LoginPluginResponseC2s),
];

const fn has_duplicates(entries: &[Entry]) -> bool {
    let mut i = 0;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() {
            if entries[i].descriptor.same_as(&entries[j].descriptor) {
                return true;
            }
            j += 1;
        }
        i += 1;
    }
    false
}

const _: () = assert!(!has_duplicates(&TABLE), "duplicate packet descriptor");

static ENTRIES: [Entry; 13] = TABLE;

/// Lookup table from descriptor to decoder. Built once, read-only afterwards.
pub struct PacketRegistry {
    by_descriptor: HashMap<PacketDescriptor, &'static Entry>,
}

/// Result of a registry lookup.
#[derive(Clone, Copy)]
pub enum Resolved {
    Known(PacketDecoderFn),
    Unknown,
}

/// Decoder for one registered variant.
#[derive(Clone, Copy)]
pub struct PacketDecoderFn {
    entry: &'static Entry,
}

impl PacketDecoderFn {
    #[must_use]
    pub fn descriptor(&self) -> PacketDescriptor {
        self.entry.descriptor
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    /// Decodes a whole packet body. Leftover bytes are an error.
    pub fn decode(&self, body: &[u8]) -> Result<Packet> {
        let mut input = body;
        let packet = match (self.entry.decode)(&mut input) {
            Ok(packet) => packet,
            Err(err) => {
                debug_log_error("packet body decode failed", &err);
                return Err(err);
            }
        };

        if !input.is_empty() {
            let err = ProtoError::TrailingBytes(input.len());
            debug_log_error("packet had trailing bytes", &err);
            return Err(err);
        }

        Ok(packet)
    }
}

impl PacketRegistry {
    fn build() -> Self {
        let by_descriptor = ENTRIES
            .iter()
            .map(|entry| (entry.descriptor, entry))
            .collect();
        Self { by_descriptor }
    }

    /// The process-wide registry.
    pub fn global() -> &'static PacketRegistry {
        static REGISTRY: OnceLock<PacketRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PacketRegistry::build)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_descriptor.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_descriptor.is_empty()
    }

    #[must_use]
    pub fn resolve(&self, id: i32, state: ProtocolState, direction: Direction) -> Resolved {
        match self
            .by_descriptor
            .get(&PacketDescriptor::new(id, state, direction))
        {
            Some(entry) => Resolved::Known(PacketDecoderFn { entry }),
            None => Resolved::Unknown,
        }
    }

    /// Resolves and decodes `frame`. Unknown ids come back as
    /// [`ProtoError::UnknownPacket`] so callers can tell them apart from
    /// malformed bodies.
    pub fn decode(
        &self,
        frame: &PacketFrame,
        state: ProtocolState,
        direction: Direction,
    ) -> Result<Packet> {
        match self.resolve(frame.id, state, direction) {
            Resolved::Known(decoder) => decoder.decode(&frame.body),
            Resolved::Unknown => Err(ProtoError::UnknownPacket {
                id: frame.id,
                state,
                direction,
            }),
        }
    }
}
