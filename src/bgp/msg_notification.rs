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

use super::msg::{Message, MessageType};
use super::utils::ParserError;

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MessageHeaderError {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
    Unknown(u8),
}

impl From<u8> for MessageHeaderError {
    fn from(value: u8) -> Self {
        match value {
            1 => MessageHeaderError::ConnectionNotSynchronized,
            2 => MessageHeaderError::BadMessageLength,
            3 => MessageHeaderError::BadMessageType,
            val => MessageHeaderError::Unknown(val),
        }
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OpenMessageError {
    Unspecific = 0,
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptedHoldTime = 6,
    UnsupportedCapability = 7,
    Unknown(u8),
}

impl From<u8> for OpenMessageError {
    fn from(value: u8) -> Self {
        match value {
            0 => OpenMessageError::Unspecific,
            1 => OpenMessageError::UnsupportedVersionNumber,
            2 => OpenMessageError::BadPeerAs,
            3 => OpenMessageError::BadBgpIdentifier,
            4 => OpenMessageError::UnsupportedOptionalParameter,
            6 => OpenMessageError::UnacceptedHoldTime,
            7 => OpenMessageError::UnsupportedCapability,
            val => OpenMessageError::Unknown(val),
        }
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum UpdateMessageError {
    Unspecific = 0,
    MalformedAttributeList = 1,
    UnrecognizedWellKnownAttribute = 2,
    MissingWellKnownAttribute = 3,
    AttributeFlagsError = 4,
    AttributeLengthError = 5,
    InvalidOriginAttribute = 6,
    // 7 is deprecated (was AS Routing Loop)
    InvalidNextHopAttribute = 8,
    OptionalAttributeError = 9,
    InvalidNetworkField = 10,
    MalformedASPath = 11,
    Unknown(u8),
}

impl From<u8> for UpdateMessageError {
    fn from(value: u8) -> Self {
        match value {
            0 => UpdateMessageError::Unspecific,
            1 => UpdateMessageError::MalformedAttributeList,
            2 => UpdateMessageError::UnrecognizedWellKnownAttribute,
            3 => UpdateMessageError::MissingWellKnownAttribute,
            4 => UpdateMessageError::AttributeFlagsError,
            5 => UpdateMessageError::AttributeLengthError,
            6 => UpdateMessageError::InvalidOriginAttribute,
            // 7 is deprecated
            8 => UpdateMessageError::InvalidNextHopAttribute,
            9 => UpdateMessageError::OptionalAttributeError,
            10 => UpdateMessageError::InvalidNetworkField,
            11 => UpdateMessageError::MalformedASPath,
            val => UpdateMessageError::Unknown(val),
        }
    }
}

/// Unexpected message for the current FSM state (RFC 4271 error code 5,
/// subcodes per RFC 6608).
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum FsmErrorSubcode {
    Unspecific = 0,
    InOpenSentState = 1,
    InOpenConfirmState = 2,
    InEstablishedState = 3,
    Unknown(u8),
}

impl From<u8> for FsmErrorSubcode {
    fn from(value: u8) -> Self {
        match value {
            0 => FsmErrorSubcode::Unspecific,
            1 => FsmErrorSubcode::InOpenSentState,
            2 => FsmErrorSubcode::InOpenConfirmState,
            3 => FsmErrorSubcode::InEstablishedState,
            val => FsmErrorSubcode::Unknown(val),
        }
    }
}

/// Voluntary session termination subcodes (RFC 4486).
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CeaseSubcode {
    Unspecific = 0,
    MaxPrefixesReached = 1,
    AdministrativeShutdown = 2,
    PeerDeconfigured = 3,
    AdministrativeReset = 4,
    ConnectionRejected = 5,
    OtherConfigurationChange = 6,
    CollisionResolution = 7,
    OutOfResources = 8,
    Unknown(u8),
}

impl From<u8> for CeaseSubcode {
    fn from(value: u8) -> Self {
        match value {
            0 => CeaseSubcode::Unspecific,
            1 => CeaseSubcode::MaxPrefixesReached,
            2 => CeaseSubcode::AdministrativeShutdown,
            3 => CeaseSubcode::PeerDeconfigured,
            4 => CeaseSubcode::AdministrativeReset,
            5 => CeaseSubcode::ConnectionRejected,
            6 => CeaseSubcode::OtherConfigurationChange,
            7 => CeaseSubcode::CollisionResolution,
            8 => CeaseSubcode::OutOfResources,
            val => CeaseSubcode::Unknown(val),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BgpError {
    MessageHeaderError(MessageHeaderError),
    OpenMessageError(OpenMessageError),
    UpdateMessageError(UpdateMessageError),
    HoldTimerExpired,
    FiniteStateMachineError(FsmErrorSubcode),
    Cease(CeaseSubcode),
    Unknown,
}

#[repr(u8)]
enum ErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
    Unknown,
}

impl From<u8> for ErrorCode {
    fn from(value: u8) -> Self {
        match value {
            1 => ErrorCode::MessageHeaderError,
            2 => ErrorCode::OpenMessageError,
            3 => ErrorCode::UpdateMessageError,
            4 => ErrorCode::HoldTimerExpired,
            5 => ErrorCode::FiniteStateMachineError,
            6 => ErrorCode::Cease,
            _ => ErrorCode::Unknown,
        }
    }
}

impl BgpError {
    pub fn new(err_code: u8, err_sub_code: u8) -> BgpError {
        match ErrorCode::from(err_code) {
            ErrorCode::MessageHeaderError => {
                BgpError::MessageHeaderError(MessageHeaderError::from(err_sub_code))
            }
            ErrorCode::OpenMessageError => {
                BgpError::OpenMessageError(OpenMessageError::from(err_sub_code))
            }
            ErrorCode::UpdateMessageError => {
                BgpError::UpdateMessageError(UpdateMessageError::from(err_sub_code))
            }
            ErrorCode::HoldTimerExpired => BgpError::HoldTimerExpired,
            ErrorCode::FiniteStateMachineError => {
                BgpError::FiniteStateMachineError(FsmErrorSubcode::from(err_sub_code))
            }
            ErrorCode::Cease => BgpError::Cease(CeaseSubcode::from(err_sub_code)),
            _ => BgpError::Unknown,
        }
    }

    pub fn error_code(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(_) => 1,
            BgpError::OpenMessageError(_) => 2,
            BgpError::UpdateMessageError(_) => 3,
            BgpError::HoldTimerExpired => 4,
            BgpError::FiniteStateMachineError(_) => 5,
            BgpError::Cease(_) => 6,
            BgpError::Unknown => 0,
        }
    }

    pub fn error_subcode(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(err) => match err {
                MessageHeaderError::ConnectionNotSynchronized => 1,
                MessageHeaderError::BadMessageLength => 2,
                MessageHeaderError::BadMessageType => 3,
                MessageHeaderError::Unknown(val) => *val,
            },
            BgpError::OpenMessageError(err) => match err {
                OpenMessageError::Unspecific => 0,
                OpenMessageError::UnsupportedVersionNumber => 1,
                OpenMessageError::BadPeerAs => 2,
                OpenMessageError::BadBgpIdentifier => 3,
                OpenMessageError::UnsupportedOptionalParameter => 4,
                OpenMessageError::UnacceptedHoldTime => 6,
                OpenMessageError::UnsupportedCapability => 7,
                OpenMessageError::Unknown(val) => *val,
            },
            BgpError::UpdateMessageError(err) => match err {
                UpdateMessageError::Unspecific => 0,
                UpdateMessageError::MalformedAttributeList => 1,
                UpdateMessageError::UnrecognizedWellKnownAttribute => 2,
                UpdateMessageError::MissingWellKnownAttribute => 3,
                UpdateMessageError::AttributeFlagsError => 4,
                UpdateMessageError::AttributeLengthError => 5,
                UpdateMessageError::InvalidOriginAttribute => 6,
                // 7 is deprecated
                UpdateMessageError::InvalidNextHopAttribute => 8,
                UpdateMessageError::OptionalAttributeError => 9,
                UpdateMessageError::InvalidNetworkField => 10,
                UpdateMessageError::MalformedASPath => 11,
                UpdateMessageError::Unknown(val) => *val,
            },
            BgpError::FiniteStateMachineError(err) => match err {
                FsmErrorSubcode::Unspecific => 0,
                FsmErrorSubcode::InOpenSentState => 1,
                FsmErrorSubcode::InOpenConfirmState => 2,
                FsmErrorSubcode::InEstablishedState => 3,
                FsmErrorSubcode::Unknown(val) => *val,
            },
            BgpError::Cease(sub) => match sub {
                CeaseSubcode::Unspecific => 0,
                CeaseSubcode::MaxPrefixesReached => 1,
                CeaseSubcode::AdministrativeShutdown => 2,
                CeaseSubcode::PeerDeconfigured => 3,
                CeaseSubcode::AdministrativeReset => 4,
                CeaseSubcode::ConnectionRejected => 5,
                CeaseSubcode::OtherConfigurationChange => 6,
                CeaseSubcode::CollisionResolution => 7,
                CeaseSubcode::OutOfResources => 8,
                CeaseSubcode::Unknown(val) => *val,
            },
            _ => 0,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NotificationMessage {
    error: BgpError,
    data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(error: BgpError, data: Vec<u8>) -> Self {
        NotificationMessage { error, data }
    }

    pub fn from_parser_error(error: &ParserError) -> Option<Self> {
        match error {
            ParserError::BgpError { error, data } => {
                Some(NotificationMessage::new(error.clone(), data.clone()))
            }
            _ => None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let err_code = bytes.first().copied().unwrap_or(0);
        let err_sub_code = bytes.get(1).copied().unwrap_or(0);
        let data = if bytes.len() > 2 { bytes[2..].to_vec() } else { Vec::new() };

        NotificationMessage {
            error: BgpError::new(err_code, err_sub_code),
            data,
        }
    }

    pub fn error(&self) -> &BgpError {
        &self.error
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_version_error(&self) -> bool {
        matches!(
            self.error,
            BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber)
        )
    }

    pub fn print(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{}NotificationMessage {{\n{}    error: {:?} ({}/{})\n{}    data: {} bytes\n{}}}\n",
            pad,
            pad,
            self.error,
            self.error.error_code(),
            self.error.error_subcode(),
            pad,
            self.data.len(),
            pad
        )
    }
}

impl Message for NotificationMessage {
    fn kind(&self) -> MessageType {
        MessageType::NOTIFICATION
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(self.error.error_code());
        bytes.push(self.error.error_subcode());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}
