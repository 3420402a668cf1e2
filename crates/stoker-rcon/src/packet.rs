//! Source RCON wire format.
//!
//! Frames are `size | id | type | body | 0x00 0x00`, every integer a
//! little-endian i32. `size` counts everything after itself, so the
//! smallest legal frame (empty body) is 10 bytes and anything outside
//! `[10, 4096]` is treated as a framing error that invalidates the
//! whole stream.

use stoker_common::{SupervisorError, SupervisorResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

pub const MIN_PACKET_SIZE: i32 = 10;
pub const MAX_PACKET_SIZE: i32 = 4096;

/// One decoded RCON frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }
}

/// Encode a frame, size prefix included.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let size = (4 + 4 + packet.body.len() + 2) as i32;
    let mut buf = Vec::with_capacity(4 + size as usize);
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(&packet.id.to_le_bytes());
    buf.extend_from_slice(&packet.kind.to_le_bytes());
    buf.extend_from_slice(packet.body.as_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf
}

/// Read one frame from the stream.
///
/// `Ok(None)` means the peer closed the connection cleanly at a frame
/// boundary. A size outside the legal bounds is a
/// [`ProtocolViolation`](SupervisorError::ProtocolViolation); the
/// caller is expected to drop the connection, since the stream can no
/// longer be framed.
pub async fn read_packet<R>(stream: &mut R) -> SupervisorResult<Option<Packet>>
where
    R: AsyncRead + Unpin,
{
    let mut size_buf = [0u8; 4];
    match stream.read_exact(&mut size_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = i32::from_le_bytes(size_buf);
    if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
        return Err(SupervisorError::protocol_violation(format!(
            "frame size {size} outside [{MIN_PACKET_SIZE}, {MAX_PACKET_SIZE}]"
        )));
    }

    let mut payload = vec![0u8; size as usize];
    stream.read_exact(&mut payload).await?;

    let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    // Body sits between the header and the two trailing null bytes.
    let body = String::from_utf8_lossy(&payload[8..payload.len() - 2]).into_owned();

    Ok(Some(Packet { id, kind, body }))
}

/// Write one frame to the stream.
pub async fn write_packet<W>(stream: &mut W, packet: &Packet) -> SupervisorResult<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&encode(packet)).await?;
    stream.flush().await?;
    Ok(())
}
