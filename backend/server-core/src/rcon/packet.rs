//! Source RCON framing.
//!
//! ```text
//! i32 size | i32 id | i32 type | body bytes | 0x00 | 0x00
//! ```
//!
//! All integers are little-endian; `size` counts everything after itself.

use crate::error::rcon::RconError;

use common::ErrorLocation;

use std::panic::Location;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server answers with when authentication fails.
pub const AUTH_FAILED_ID: i32 = -1;

/// id + type + two terminators.
const HEADER_SIZE: i32 = 10;
pub const MAX_PACKET_SIZE: i32 = 4096;

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

    #[track_caller]
    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let size = i32::try_from(self.body.len())
            .ok()
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .filter(|size| *size <= MAX_PACKET_SIZE)
            .ok_or_else(|| RconError::Protocol {
                message: format!(
                    "Packet body of {} bytes exceeds the {MAX_PACKET_SIZE} byte limit",
                    self.body.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.encode()?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Packet, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let size = reader.read_i32_le().await?;
        if !(HEADER_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::Protocol {
                message: format!("Invalid packet size {size}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let id = reader.read_i32_le().await?;
        let kind = reader.read_i32_le().await?;

        let mut body = vec![0u8; (size - 8) as usize];
        reader.read_exact(&mut body).await?;

        if body.len() < 2 || body[body.len() - 2..] != [0, 0] {
            return Err(RconError::Protocol {
                message: String::from("Packet is missing its terminators"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        body.truncate(body.len() - 2);

        Ok(Packet {
            id,
            kind,
            body: String::from_utf8_lossy(&body).to_string(),
        })
    }
}
