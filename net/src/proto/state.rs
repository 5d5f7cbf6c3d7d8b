/// Protocol state used to select packet IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Handshake,
    Status,
    Login,
    Play,
}

impl ProtocolState {
    /// Whether a connection in `self` may move to `next`. States only advance:
    /// handshake to status or login, login to play.
    #[must_use]
    pub const fn can_advance_to(self, next: ProtocolState) -> bool {
        matches!(
            (self, next),
            (ProtocolState::Handshake, ProtocolState::Status)
                | (ProtocolState::Handshake, ProtocolState::Login)
                | (ProtocolState::Login, ProtocolState::Play)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolState::Handshake => "handshake",
            ProtocolState::Status => "status",
            ProtocolState::Login => "login",
            ProtocolState::Play => "play",
        }
    }
}

/// Which way a packet travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ServerBound,
    ClientBound,
}

/// Identity of a packet variant. No two variants share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketDescriptor {
    pub id: i32,
    pub state: ProtocolState,
    pub direction: Direction,
}

impl PacketDescriptor {
    #[must_use]
    pub const fn new(id: i32, state: ProtocolState, direction: Direction) -> Self {
        Self {
            id,
            state,
            direction,
        }
    }

    /// `const` equality, used by the registry's duplicate check.
    #[must_use]
    pub const fn same_as(&self, other: &PacketDescriptor) -> bool {
        self.id == other.id
            && self.state as u8 == other.state as u8
            && self.direction as u8 == other.direction as u8
    }
}

/// Next state value in the handshake packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeNextState {
    Status,
    Login,
}

impl HandshakeNextState {
    /// 1 asks for status; every other value is treated as a login attempt.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        if raw == 1 {
            HandshakeNextState::Status
        } else {
            HandshakeNextState::Login
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HandshakeNextState::Status => "status",
            HandshakeNextState::Login => "login",
        }
    }
}
