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
use super::msg_notification::{BgpError, OpenMessageError};
use super::utils::{is_valid_unicast_ipv4, ParserError};
use super::{AS_TRANS, BGP_VERSION};

// https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-11
const PARAM_TYPE_CAPABILITIES: u8 = 2; // RFC 3392

/// RFC 6793 Four-Octet AS Number capability code.
pub const CAP_FOUR_OCTET_ASN: u8 = 65;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BgpCapability {
    /// RFC 6793: the sender's 4-byte ASN.
    FourOctetAsn(u32),
    /// Any other capability, retained opaquely and re-emitted verbatim.
    Unknown { code: u8, value: Vec<u8> },
}

impl BgpCapability {
    pub fn code(&self) -> u8 {
        match self {
            BgpCapability::FourOctetAsn(_) => CAP_FOUR_OCTET_ASN,
            BgpCapability::Unknown { code, .. } => *code,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            BgpCapability::FourOctetAsn(asn) => {
                bytes.push(CAP_FOUR_OCTET_ASN);
                bytes.push(4);
                bytes.extend_from_slice(&asn.to_be_bytes());
            }
            BgpCapability::Unknown { code, value } => {
                bytes.push(*code);
                bytes.push(value.len() as u8);
                bytes.extend_from_slice(value);
            }
        }
        bytes
    }
}

#[derive(Debug, PartialEq)]
pub struct OpenMessage {
    pub version: u8,
    /// 2-byte ASN field. AS_TRANS when the real ASN needs four bytes.
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_identifier: u32,
    pub optional_params: Vec<BgpCapability>,
}

fn malformed_open() -> ParserError {
    ParserError::BgpError {
        error: BgpError::OpenMessageError(OpenMessageError::Unspecific),
        data: Vec::new(),
    }
}

fn read_capabilities(bytes: &[u8]) -> Result<Vec<BgpCapability>, ParserError> {
    let mut cursor = 0;
    let mut caps = Vec::new();

    while cursor < bytes.len() {
        if cursor + 2 > bytes.len() {
            return Err(malformed_open());
        }
        let code = bytes[cursor];
        let len = bytes[cursor + 1] as usize;
        cursor += 2;

        if cursor + len > bytes.len() {
            return Err(malformed_open());
        }
        let value = &bytes[cursor..cursor + len];
        cursor += len;

        let cap = match code {
            CAP_FOUR_OCTET_ASN => {
                if len != 4 {
                    return Err(ParserError::BgpError {
                        error: BgpError::OpenMessageError(OpenMessageError::UnsupportedCapability),
                        data: vec![code],
                    });
                }
                BgpCapability::FourOctetAsn(u32::from_be_bytes([
                    value[0], value[1], value[2], value[3],
                ]))
            }
            _ => BgpCapability::Unknown {
                code,
                value: value.to_vec(),
            },
        };
        caps.push(cap);
    }

    Ok(caps)
}

fn read_optional_parameters(bytes: &[u8]) -> Result<Vec<BgpCapability>, ParserError> {
    let mut cursor = 0;
    let mut caps = Vec::new();

    while cursor < bytes.len() {
        if cursor + 2 > bytes.len() {
            return Err(malformed_open());
        }
        let param_type = bytes[cursor];
        let param_len = bytes[cursor + 1] as usize;
        cursor += 2;

        if cursor + param_len > bytes.len() {
            return Err(malformed_open());
        }

        // Only capability parameters are supported (RFC 5492); anything else
        // is an unsupported optional parameter.
        if param_type != PARAM_TYPE_CAPABILITIES {
            return Err(ParserError::BgpError {
                error: BgpError::OpenMessageError(OpenMessageError::UnsupportedOptionalParameter),
                data: vec![param_type],
            });
        }

        caps.extend(read_capabilities(&bytes[cursor..cursor + param_len])?);
        cursor += param_len;
    }

    Ok(caps)
}

/// Validate BGP version (RFC 4271 Section 6.2)
fn validate_version(version: u8) -> Result<(), ParserError> {
    if version != BGP_VERSION {
        // RFC 4271: Data field is a 2-octet unsigned integer indicating the
        // largest locally-supported version number (which is 4)
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber),
            data: (BGP_VERSION as u16).to_be_bytes().to_vec(),
        });
    }
    Ok(())
}

/// Validate Hold Time (RFC 4271 Section 6.2)
/// MUST reject Hold Time values of one or two seconds
fn validate_hold_time(hold_time: u16) -> Result<(), ParserError> {
    if hold_time == 1 || hold_time == 2 {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnacceptedHoldTime),
            data: Vec::new(),
        });
    }
    Ok(())
}

/// Validate BGP Identifier (RFC 4271 Section 6.2)
/// Must be a valid unicast IP host address.
fn validate_bgp_identifier(bgp_identifier: u32) -> Result<(), ParserError> {
    if !is_valid_unicast_ipv4(bgp_identifier) {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::BadBgpIdentifier),
            data: Vec::new(),
        });
    }
    Ok(())
}

impl OpenMessage {
    /// Create an OPEN for a 2-byte speaker: no capabilities advertised.
    pub fn new_2b(asn: u16, hold_time: u16, bgp_identifier: u32) -> Self {
        OpenMessage {
            version: BGP_VERSION,
            asn,
            hold_time,
            bgp_identifier,
            optional_params: vec![],
        }
    }

    /// Create an OPEN for a 4-byte speaker: the 2-byte field carries AS_TRANS
    /// when the ASN does not fit, and capability 65 carries the real ASN.
    pub fn new_4b(asn: u32, hold_time: u16, bgp_identifier: u32) -> Self {
        let asn_2b = if asn >= 0xffff { AS_TRANS } else { asn as u16 };
        OpenMessage {
            version: BGP_VERSION,
            asn: asn_2b,
            hold_time,
            bgp_identifier,
            optional_params: vec![BgpCapability::FourOctetAsn(asn)],
        }
    }

    pub fn has_capability(&self, code: u8) -> bool {
        self.optional_params.iter().any(|c| c.code() == code)
    }

    /// The sender's ASN: the capability value when a Four-Octet AS capability
    /// is present, the 2-byte field otherwise.
    pub fn negotiated_asn(&self) -> u32 {
        for cap in &self.optional_params {
            if let BgpCapability::FourOctetAsn(asn) = cap {
                return *asn;
            }
        }
        self.asn as u32
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ParserError> {
        if bytes.len() < 10 {
            return Err(malformed_open());
        }

        let version = bytes[0];
        let asn = u16::from_be_bytes([bytes[1], bytes[2]]);
        let hold_time = u16::from_be_bytes([bytes[3], bytes[4]]);
        let bgp_identifier = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        let optional_params_len = bytes[9] as usize;
        if optional_params_len != bytes.len() - 10 {
            return Err(malformed_open());
        }

        // RFC 4271 Section 6.2: Validate OPEN message fields
        validate_version(version)?;
        validate_hold_time(hold_time)?;
        validate_bgp_identifier(bgp_identifier)?;

        let optional_params = read_optional_parameters(&bytes[10..10 + optional_params_len])?;

        Ok(OpenMessage {
            version,
            asn,
            hold_time,
            bgp_identifier,
            optional_params,
        })
    }

    pub fn print(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!(
            "{}OpenMessage {{\n{}    version: {}\n{}    asn: {}\n{}    hold_time: {}\n{}    bgp_id: {}\n",
            pad,
            pad,
            self.version,
            pad,
            self.asn,
            pad,
            self.hold_time,
            pad,
            std::net::Ipv4Addr::from(self.bgp_identifier)
        );
        for cap in &self.optional_params {
            match cap {
                BgpCapability::FourOctetAsn(asn) => {
                    out.push_str(&format!("{}    capability: four-octet-asn {}\n", pad, asn));
                }
                BgpCapability::Unknown { code, value } => {
                    out.push_str(&format!(
                        "{}    capability: code {} ({} bytes)\n",
                        pad,
                        code,
                        value.len()
                    ));
                }
            }
        }
        out.push_str(&format!("{}}}\n", pad));
        out
    }
}

impl Message for OpenMessage {
    fn kind(&self) -> MessageType {
        MessageType::OPEN
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.push(self.version);
        bytes.extend_from_slice(&self.asn.to_be_bytes());
        bytes.extend_from_slice(&self.hold_time.to_be_bytes());
        bytes.extend_from_slice(&self.bgp_identifier.to_be_bytes());

        // Each capability goes out as its own type-2 optional parameter.
        let mut params = Vec::new();
        for cap in &self.optional_params {
            let cap_bytes = cap.to_bytes();
            params.push(PARAM_TYPE_CAPABILITIES);
            params.push(cap_bytes.len() as u8);
            params.extend_from_slice(&cap_bytes);
        }

        bytes.push(params.len() as u8);
        bytes.extend_from_slice(&params);

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEST_OPEN_MESSAGE_BODY: &[u8] = &[
        0x04, // Version
        0xfd, 0xe9, // ASN: 65001
        0x00, 0xb4, // Hold time: 180
        0x01, 0x01, 0x01, 0x01, // BGP ID
        0x00, // Optional params len
    ];

    #[test]
    fn test_from_bytes() {
        let open_message = OpenMessage::from_bytes(TEST_OPEN_MESSAGE_BODY.to_vec()).unwrap();
        assert_eq!(open_message.version, BGP_VERSION);
        assert_eq!(open_message.asn, 65001);
        assert_eq!(open_message.hold_time, 180);
        assert_eq!(open_message.bgp_identifier, 0x01010101);
        assert_eq!(open_message.optional_params, vec![]);
        assert_eq!(open_message.negotiated_asn(), 65001);
    }

    #[test]
    fn test_from_bytes_with_four_octet_asn_capability() {
        let message: Vec<u8> = [
            &[
                0x04, // Version
                0x5b, 0xa0, // ASN: 23456 (AS_TRANS)
                0x00, 0xb4, // Hold time
                0x0a, 0x00, 0x00, 0x02, // BGP ID: 10.0.0.2
                0x08, // Optional parameters length
            ],
            // Capability parameter carrying four-octet ASN 396982
            &[0x02, 0x06, 65, 0x04, 0x00, 0x06, 0x0e, 0xb6][..],
        ]
        .concat();

        let open_message = OpenMessage::from_bytes(message).unwrap();
        assert_eq!(open_message.asn, AS_TRANS);
        assert!(open_message.has_capability(CAP_FOUR_OCTET_ASN));
        assert_eq!(open_message.negotiated_asn(), 396982);
    }

    #[test]
    fn test_from_bytes_with_unknown_capability_retained() {
        let message: Vec<u8> = [
            &[
                0x04, 0xfd, 0xe9, 0x00, 0xb4, 0x01, 0x01, 0x01, 0x01,
                0x08, // Optional parameters length
            ],
            // Multiprotocol capability (code 1), retained opaquely
            &[0x02, 0x06, 0x01, 0x04, 0x00, 0x01, 0x00, 0x01][..],
        ]
        .concat();

        let open_message = OpenMessage::from_bytes(message).unwrap();
        assert_eq!(
            open_message.optional_params,
            vec![BgpCapability::Unknown {
                code: 1,
                value: vec![0x00, 0x01, 0x00, 0x01],
            }]
        );
        assert!(!open_message.has_capability(CAP_FOUR_OCTET_ASN));
    }

    #[test]
    fn test_multiple_capabilities_in_one_parameter() {
        let message: Vec<u8> = [
            &[
                0x04, 0x5b, 0xa0, 0x00, 0xb4, 0x01, 0x01, 0x01, 0x01,
                0x0c, // Optional parameters length
            ],
            // One parameter holding two capability TLVs (RFC 5492)
            &[
                0x02, 0x0a, // param type 2, length 10
                0x01, 0x04, 0x00, 0x01, 0x00, 0x01, // multiprotocol
                65, 0x04, 0x00, 0x01, 0x00, 0x00, // four-octet ASN 65536
            ][..],
        ]
        .concat();

        let open_message = OpenMessage::from_bytes(message).unwrap();
        assert_eq!(open_message.optional_params.len(), 2);
        assert_eq!(open_message.negotiated_asn(), 65536);
    }

    #[test]
    fn test_unknown_parameter_type_rejected() {
        let message: Vec<u8> = [
            &[
                0x04, 0xfd, 0xe9, 0x00, 0xb4, 0x01, 0x01, 0x01, 0x01,
                0x04, // Optional parameters length
            ],
            &[200, 0x02, 0x01, 0x02][..], // unassigned parameter type
        ]
        .concat();

        match OpenMessage::from_bytes(message) {
            Err(ParserError::BgpError { error, data }) => {
                assert_eq!(
                    error,
                    BgpError::OpenMessageError(OpenMessageError::UnsupportedOptionalParameter)
                );
                assert_eq!(data, vec![200]);
            }
            _ => panic!("Expected UnsupportedOptionalParameter error"),
        }
    }

    #[test]
    fn test_from_bytes_invalid_length() {
        let message: &[u8] = &[0x04, 0x04, 0xd2, 0x00, 0x0a];

        match OpenMessage::from_bytes(message.to_vec()) {
            Err(ParserError::BgpError { error, data }) => {
                assert_eq!(
                    error,
                    BgpError::OpenMessageError(OpenMessageError::Unspecific)
                );
                assert_eq!(data, Vec::<u8>::new());
            }
            _ => panic!("Expected OPEN message error"),
        }
    }

    #[test]
    fn test_from_bytes_invalid_optional_params_length() {
        let test_cases: Vec<Vec<u8>> = vec![
            // claims 8 bytes of params, none present
            vec![0x04, 0x04, 0xd2, 0x00, 0x0a, 0x0a, 0x0a, 0x0a, 0x0a, 0x08],
            // claims 2, carries 4
            vec![
                0x04, 0x04, 0xd2, 0x00, 0x0a, 0x0a, 0x0a, 0x0a, 0x0a, 0x02, 100, 0x02, 0x01, 0x02,
            ],
        ];

        for test_case in test_cases.iter() {
            match OpenMessage::from_bytes(test_case.to_vec()) {
                Err(ParserError::BgpError { error, .. }) => {
                    assert_eq!(
                        error,
                        BgpError::OpenMessageError(OpenMessageError::Unspecific)
                    );
                }
                _ => panic!("Expected OPEN message error"),
            }
        }
    }

    #[test]
    fn test_from_bytes_unsupported_version() {
        let mut msg = TEST_OPEN_MESSAGE_BODY.to_vec();
        msg[0] = 0x03;

        match OpenMessage::from_bytes(msg) {
            Err(ParserError::BgpError { error, data }) => {
                assert_eq!(
                    error,
                    BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber)
                );
                assert_eq!(data, vec![0x00, 0x04]); // Largest supported version
            }
            _ => panic!("Expected UnsupportedVersionNumber error"),
        }
    }

    #[test]
    fn test_from_bytes_unacceptable_hold_time() {
        for hold_time in [1u8, 2] {
            let mut msg = TEST_OPEN_MESSAGE_BODY.to_vec();
            msg[3] = 0x00;
            msg[4] = hold_time;

            match OpenMessage::from_bytes(msg) {
                Err(ParserError::BgpError { error, .. }) => {
                    assert_eq!(
                        error,
                        BgpError::OpenMessageError(OpenMessageError::UnacceptedHoldTime),
                        "Failed for hold_time={}",
                        hold_time
                    );
                }
                _ => panic!("Expected UnacceptedHoldTime for hold_time={}", hold_time),
            }
        }
    }

    #[test]
    fn test_from_bytes_hold_time_zero_accepted() {
        let mut msg = TEST_OPEN_MESSAGE_BODY.to_vec();
        msg[3] = 0x00;
        msg[4] = 0x00;
        let open = OpenMessage::from_bytes(msg).unwrap();
        assert_eq!(open.hold_time, 0);
    }

    #[test]
    fn test_from_bytes_bad_bgp_identifier() {
        let test_cases = vec![
            ("zero", [0x00, 0x00, 0x00, 0x00]),
            ("broadcast", [0xff, 0xff, 0xff, 0xff]),
            ("multicast", [0xe0, 0x00, 0x00, 0x01]),
        ];

        for (name, bgp_id) in test_cases {
            let mut msg = TEST_OPEN_MESSAGE_BODY.to_vec();
            msg[5..9].copy_from_slice(&bgp_id);

            match OpenMessage::from_bytes(msg) {
                Err(ParserError::BgpError { error, .. }) => {
                    assert_eq!(
                        error,
                        BgpError::OpenMessageError(OpenMessageError::BadBgpIdentifier),
                        "Failed for case: {}",
                        name
                    );
                }
                _ => panic!("Expected BadBgpIdentifier error for case: {}", name),
            }
        }
    }

    #[test]
    fn test_open_message_encode_decode() {
        let open_msg = OpenMessage::new_2b(65001, 180, 0x01010101);
        let bytes = open_msg.to_bytes();
        assert_eq!(bytes, TEST_OPEN_MESSAGE_BODY);

        let parsed = OpenMessage::from_bytes(bytes).unwrap();
        assert_eq!(parsed, open_msg);
    }

    #[test]
    fn test_open_message_4b_round_trip() {
        use pretty_hex::PrettyHex;

        let open_msg = OpenMessage::new_4b(396982, 180, 0x0a000001);
        assert_eq!(open_msg.asn, AS_TRANS);

        let bytes = open_msg.to_bytes();
        println!("buf: {:?}", bytes.hex_dump());

        let parsed = OpenMessage::from_bytes(bytes).unwrap();
        assert_eq!(parsed, open_msg);
        assert_eq!(parsed.negotiated_asn(), 396982);
    }

    #[test]
    fn test_open_message_4b_small_asn_keeps_field() {
        let open_msg = OpenMessage::new_4b(65001, 180, 0x0a000001);
        assert_eq!(open_msg.asn, 65001);
        assert_eq!(open_msg.negotiated_asn(), 65001);
    }

    #[test]
    fn test_open_message_serialize() {
        let open_msg = OpenMessage::new_2b(65001, 180, 0x01010101);
        let message = open_msg.serialize();

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0xff; 16]);
        let total_length = 19u16 + TEST_OPEN_MESSAGE_BODY.len() as u16;
        expected.extend_from_slice(&total_length.to_be_bytes());
        expected.push(0x01);
        expected.extend_from_slice(TEST_OPEN_MESSAGE_BODY);

        assert_eq!(message, expected);
    }
}
