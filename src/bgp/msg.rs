// Copyright 2025 bgpcore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! BGP message framing (RFC 4271 Section 4.1).
//!
//! The library never reads from a socket; the host hands it byte chunks and
//! [`pull_message`] deframes complete messages out of the accumulated buffer.

use super::msg_keepalive::KeepAliveMessage;
use super::msg_notification::{BgpError, MessageHeaderError, NotificationMessage};
use super::msg_open::OpenMessage;
use super::msg_update::UpdateMessage;
use super::utils::ParserError;

pub const BGP_HEADER_SIZE_BYTES: usize = 19;
pub const MAX_MESSAGE_SIZE: u16 = 4096;

// BGP header marker (16 bytes of 0xFF)
pub const BGP_MARKER: [u8; 16] = [0xff; 16];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    OPEN = 1,
    UPDATE = 2,
    NOTIFICATION = 3,
    KEEPALIVE = 4,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::OPEN),
            2 => Ok(MessageType::UPDATE),
            3 => Ok(MessageType::NOTIFICATION),
            4 => Ok(MessageType::KEEPALIVE),
            _ => Err(ParserError::BgpError {
                error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageType),
                data: vec![value],
            }),
        }
    }
}

/// Trait for BGP message types that can serialize themselves.
pub trait Message {
    /// Returns the message type identifier.
    fn kind(&self) -> MessageType;

    /// Serializes the message body (without BGP header).
    fn to_bytes(&self) -> Vec<u8>;

    /// Serializes the complete BGP message with header.
    fn serialize(&self) -> Vec<u8> {
        let body = self.to_bytes();
        let mut message = Vec::new();

        message.extend_from_slice(&BGP_MARKER);

        let length = BGP_HEADER_SIZE_BYTES as u16 + body.len() as u16;
        message.extend_from_slice(&length.to_be_bytes());

        message.push(self.kind().as_u8());
        message.extend_from_slice(&body);

        message
    }
}

#[derive(Debug, PartialEq)]
pub enum BgpMessage {
    Open(OpenMessage),
    Update(UpdateMessage),
    KeepAlive(KeepAliveMessage),
    Notification(NotificationMessage),
}

impl BgpMessage {
    fn from_bytes(
        message_type: MessageType,
        bytes: Vec<u8>,
        use_4b_asn: bool,
    ) -> Result<Self, ParserError> {
        match message_type {
            MessageType::OPEN => {
                let message = OpenMessage::from_bytes(bytes)?;
                Ok(BgpMessage::Open(message))
            }
            MessageType::UPDATE => {
                let message = UpdateMessage::from_bytes(bytes, use_4b_asn)?;
                Ok(BgpMessage::Update(message))
            }
            MessageType::KEEPALIVE => Ok(BgpMessage::KeepAlive(KeepAliveMessage {})),
            MessageType::NOTIFICATION => {
                let message = NotificationMessage::from_bytes(bytes);
                Ok(BgpMessage::Notification(message))
            }
        }
    }

    /// Indented text dump used by verbose logging.
    pub fn print(&self, indent: usize) -> String {
        match self {
            BgpMessage::Open(m) => m.print(indent),
            BgpMessage::Update(m) => m.print(indent),
            BgpMessage::KeepAlive(m) => m.print(indent),
            BgpMessage::Notification(m) => m.print(indent),
        }
    }
}

/// Deframe one message from the front of `buffer`.
///
/// Returns `Ok(None)` if the buffer does not yet hold a complete message;
/// otherwise the parsed message and the number of bytes it occupied.
/// `use_4b_asn` selects the AS_PATH encoding negotiated for the session.
pub fn pull_message(
    buffer: &[u8],
    use_4b_asn: bool,
) -> Result<Option<(BgpMessage, usize)>, ParserError> {
    if buffer.len() < BGP_HEADER_SIZE_BYTES {
        return Ok(None);
    }

    // Validate header fields (RFC 4271 Section 6.1)
    validate_marker(buffer)?;

    let message_length = u16::from_be_bytes([buffer[16], buffer[17]]);
    let message_type_val = buffer[18];

    validate_length(message_length, message_type_val)?;
    let message_type = MessageType::try_from(message_type_val)?;

    if buffer.len() < message_length as usize {
        return Ok(None);
    }

    let body = buffer[BGP_HEADER_SIZE_BYTES..message_length as usize].to_vec();
    let message = BgpMessage::from_bytes(message_type, body, use_4b_asn)?;

    Ok(Some((message, message_length as usize)))
}

fn validate_marker(header: &[u8]) -> Result<(), ParserError> {
    if header[0..16] != BGP_MARKER {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::ConnectionNotSynchronized),
            data: Vec::new(),
        });
    }
    Ok(())
}

fn validate_length(message_length: u16, message_type: u8) -> Result<(), ParserError> {
    if message_length < BGP_HEADER_SIZE_BYTES as u16 || message_length > MAX_MESSAGE_SIZE {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: message_length.to_be_bytes().to_vec(),
        });
    }

    // Message-type-specific minima
    if message_type == MessageType::KEEPALIVE.as_u8()
        && message_length != BGP_HEADER_SIZE_BYTES as u16
    {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: message_length.to_be_bytes().to_vec(),
        });
    }

    // NOTIFICATION minimum length is 21 (19 header + 2 for error code/subcode)
    if message_type == MessageType::NOTIFICATION.as_u8() && message_length < 21 {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: message_length.to_be_bytes().to_vec(),
        });
    }

    // OPEN minimum length is 29 (19 header + 10 fixed body)
    if message_type == MessageType::OPEN.as_u8() && message_length < 29 {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: message_length.to_be_bytes().to_vec(),
        });
    }

    Ok(())
}
