use crate::error::rcon::RconError;
use crate::rcon::packet::{
    MAX_PACKET_SIZE, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
};

use std::io::Cursor;

/// **VALUE**: Pins the exact wire layout of an auth packet.
///
/// **BUG THIS CATCHES**: Would catch big-endian integers, a missing
/// terminator, or `size` counting its own four bytes.
#[test]
fn given_auth_packet_when_encoded_then_matches_wire_layout() {
    // GIVEN: An auth packet
    let packet = Packet::new(7, SERVERDATA_AUTH, "pw");

    // WHEN: Encoding
    let bytes = packet.encode().unwrap();

    // THEN: size=12, id=7, type=3, "pw", two NULs
    assert_eq!(
        bytes,
        vec![12, 0, 0, 0, 7, 0, 0, 0, 3, 0, 0, 0, b'p', b'w', 0, 0]
    );
}

/// **VALUE**: Verifies a failed-auth reply decodes with id -1.
///
/// **BUG THIS CATCHES**: Would catch reading the id as unsigned.
#[tokio::test]
async fn given_failed_auth_reply_when_decoded_then_id_is_minus_one() {
    // GIVEN: A reply with id -1 and an empty body
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&10i32.to_le_bytes());
    bytes.extend_from_slice(&(-1i32).to_le_bytes());
    bytes.extend_from_slice(&SERVERDATA_AUTH_RESPONSE.to_le_bytes());
    bytes.extend_from_slice(&[0, 0]);

    // WHEN: Decoding
    let packet = Packet::read_from(&mut Cursor::new(bytes)).await.unwrap();

    // THEN: The failure id and empty body come through
    assert_eq!(packet.id, -1);
    assert_eq!(packet.kind, SERVERDATA_AUTH_RESPONSE);
    assert!(packet.body.is_empty());
}

/// **VALUE**: Verifies hostile sizes are rejected before allocating.
///
/// **BUG THIS CATCHES**: Would catch a missing bound check that lets a peer
/// request a multi-gigabyte buffer.
#[tokio::test]
async fn given_oversized_frame_when_decoded_then_protocol_error() {
    // GIVEN: A frame claiming to be larger than the limit
    let bytes = (MAX_PACKET_SIZE + 1).to_le_bytes().to_vec();

    // WHEN/THEN: Decoding fails with a protocol error
    let result = Packet::read_from(&mut Cursor::new(bytes)).await;
    assert!(matches!(result, Err(RconError::Protocol { .. })));
}

#[tokio::test]
async fn given_missing_terminators_when_decoded_then_protocol_error() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&10i32.to_le_bytes());
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(b"ab");

    let result = Packet::read_from(&mut Cursor::new(bytes)).await;
    assert!(matches!(result, Err(RconError::Protocol { .. })));
}

#[test]
fn given_body_over_limit_when_encoded_then_protocol_error() {
    let packet = Packet::new(1, SERVERDATA_AUTH, "x".repeat(MAX_PACKET_SIZE as usize));
    assert!(matches!(packet.encode(), Err(RconError::Protocol { .. })));
}

#[tokio::test]
async fn given_truncated_stream_when_decoded_then_io_error() {
    let bytes = 20i32.to_le_bytes().to_vec();
    let result = Packet::read_from(&mut Cursor::new(bytes)).await;
    assert!(matches!(result, Err(RconError::Io { .. })));
}
