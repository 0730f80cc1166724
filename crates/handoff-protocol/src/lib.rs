//! Wire protocol for Handoff.
//!
//! This crate defines what proxy and backend processes say to each other
//! over the pub/sub transport:
//!
//! - **Types** ([`EntityId`], [`ServerId`], [`BroadcastMessage`]): the
//!   identifiers and payloads that travel on the wire.
//! - **Channels** ([`SAVE_REQUEST_CHANNEL`], [`SAVE_ACK_CHANNEL`],
//!   [`BROADCAST_CHANNEL`]): the well-known channel names.
//! - **Codec** ([`encode_entity`], [`decode_entity`], and the JSON
//!   broadcast helpers): how payloads become text and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about connections or waiting. It
//! only turns identifiers into channel payloads:
//!
//! ```text
//! Transport (text payloads) → Protocol (EntityId) → Session (bookkeeping)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_entity, encode_entity};
#[cfg(feature = "json")]
pub use codec::{decode_broadcast, encode_broadcast};
pub use error::ProtocolError;
pub use types::{
    BROADCAST_CHANNEL, BroadcastMessage, EntityId, SAVE_ACK_CHANNEL,
    SAVE_REQUEST_CHANNEL, ServerId,
};
