//! Wire contracts shared by the pixel canvas client and server.
//!
//! Messages are JSON objects tagged as `{"type": ..., "data": ...}`. Over a
//! byte stream each message travels inside a length-prefixed frame (see
//! [`frame`]).

pub mod frame;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use frame::{encode_frame, FrameDecoder, FrameError, MAX_FRAME_LEN};

/// Palette index of a single stored cell.
pub type ColorCode = u8;

/// Color code as it travels on the wire. Peers may run a larger palette, so
/// decoding accepts any integer and the client decides per cell what to keep.
pub type WireColor = i64;

/// One cell change. Coordinates are wide for peers on a larger logical grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i64,
    pub y: i64,
    pub color: WireColor,
}

impl Pixel {
    pub fn new(x: i64, y: i64, color: WireColor) -> Self {
        Self { x, y, color }
    }
}

/// Rectangular overlay anchored at `(start_x, start_y)`; `grid[row][col]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdate {
    pub start_x: i64,
    pub start_y: i64,
    pub grid: Vec<Vec<WireColor>>,
}

impl BatchUpdate {
    pub fn width(&self) -> usize {
        self.grid.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.grid.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerPacket {
    #[serde(alias = "LIVE_UPDATE", deserialize_with = "one_or_many_pixels")]
    PixelUpdate(Vec<Pixel>),
    BatchUpdate(BatchUpdate),
    GridRefresh(Vec<Vec<WireColor>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientPacket {
    #[serde(rename = "UPDATE")]
    Update(Pixel),
}

fn one_or_many_pixels<'de, D>(deserializer: D) -> Result<Vec<Pixel>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Pixel>),
        One(Pixel),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(pixels) => pixels,
        OneOrMany::One(pixel) => vec![pixel],
    })
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed packet: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn decode_server_packet_json(data: &str) -> Result<ServerPacket, ProtoError> {
    Ok(serde_json::from_str(data)?)
}

/// Decodes a raw frame payload; invalid UTF-8 is reported as a JSON error.
pub fn decode_server_frame(payload: &[u8]) -> Result<ServerPacket, ProtoError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn decode_client_packet_json(data: &str) -> Result<ClientPacket, ProtoError> {
    Ok(serde_json::from_str(data)?)
}

pub fn encode_client_packet_json(packet: &ClientPacket) -> serde_json::Result<String> {
    serde_json::to_string(packet)
}
