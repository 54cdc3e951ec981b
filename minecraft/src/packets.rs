use minecraft_macros::{PacketDeserializer, PacketSerializer};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::serialization::{Buffer, FieldWriter};

use super::serialization::{ReadingError, MinecraftStream};

pub trait PacketDeserializer {
    fn from_raw<RW>(stream: &mut MinecraftStream<RW>) -> Result<Self, ReadingError>
    where
        Self : Sized,
        RW : AsyncRead + AsyncWrite + Unpin;
}

pub trait PacketSerializer {
    fn to_raw(&self, stream: &mut Buffer) -> Option<()> where Self : Sized;
}

pub struct MinecraftPacket {
}

impl MinecraftPacket {
    pub fn make_raw<T>(id: i32, packet: &T) -> Option<Vec<u8>> where T: PacketSerializer {
        let mut data_buffer = Buffer::new(1024);
        T::to_raw(packet, &mut data_buffer)?;
        Some(Self::make_raw_bytes(id, data_buffer.take()))
    }

    /// Frames an already-encoded body under `id`, without going through a
    /// `PacketSerializer` impl. Used to re-emit packets whose body is opaque
    /// to the proxy (login_start, the encryption request/response pair).
    pub fn make_raw_bytes(id: i32, body: &[u8]) -> Vec<u8> {
        let mut packet_id_buffer = Buffer::new(5);
        id.write(&mut packet_id_buffer);
        let mut packet_length_buffer = Buffer::new(5);

        let d2 = packet_id_buffer.take();
        (d2.len() as i32 + body.len() as i32).write(&mut packet_length_buffer);

        let d1 = packet_length_buffer.take();
        [d1, d2, body].concat()
    }
}

/// C→S, state=handshake, id 0x00. Selects the next protocol state and
/// carries the client's requested host/port, used for routing and for
/// domain decoding in `pass_through_by_domain` mode. Re-emitted to the
/// upstream unchanged by reconstructing from these fields; both client and
/// this proxy encode VarInts in canonical minimal form, so the re-emitted
/// bytes are identical to what the client sent.
#[derive(PacketDeserializer, PacketSerializer, Debug, Clone)]
pub struct HandshakeC2SPacket {
    pub protocol_version: i32,
    pub domain: String,
    pub server_port: u16,
    pub next_state: i32
}

/// C→S, state=status, id 0x00, empty body.
#[derive(PacketDeserializer, PacketSerializer)]
pub struct StatusRequestC2SPacket {}

/// S→C, state=status, id 0x00. Body is a single JSON string — the MOTD.
#[derive(PacketDeserializer, PacketSerializer)]
pub struct StatusResponseS2CPacket {
    pub json: String,
}

/// Shared shape of the status-mode ping/pong exchange (id 0x01 both ways):
/// an opaque 8-byte payload the client expects echoed back unchanged.
#[derive(PacketDeserializer, PacketSerializer)]
pub struct PingPongPacket {
    pub payload: i64,
}
