use std::fmt::{self, Display};
use std::io::{Cursor, Read};

use crate::frame;
use crate::{
    AtCommand, ErrorKind, ExtendedAddress, FrameId, ReadWireExt, Result, ShortAddress,
    SourceAddress,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    AtCommand,
    AtCommandQueue,
    TransmitRequest,
    RemoteAtCommand,
    AtCommandResponse,
    ModemStatus,
    TransmitStatus,
    ReceivePacket,
    NodeIdentification,
    RemoteAtCommandResponse,
    Unknown(u8),
}

impl FrameType {
    /// Whether the first payload byte of this frame type is a frame id.
    pub fn carries_frame_id(&self) -> bool {
        match self {
            FrameType::AtCommand
            | FrameType::AtCommandQueue
            | FrameType::TransmitRequest
            | FrameType::RemoteAtCommand
            | FrameType::AtCommandResponse
            | FrameType::TransmitStatus
            | FrameType::RemoteAtCommandResponse => true,
            FrameType::ModemStatus
            | FrameType::ReceivePacket
            | FrameType::NodeIdentification
            | FrameType::Unknown(_) => false,
        }
    }

    /// The frame type the module answers a request of this type with, if any.
    pub fn response_type(&self) -> Option<FrameType> {
        match self {
            FrameType::AtCommand | FrameType::AtCommandQueue => Some(FrameType::AtCommandResponse),
            FrameType::RemoteAtCommand => Some(FrameType::RemoteAtCommandResponse),
            FrameType::TransmitRequest => Some(FrameType::TransmitStatus),
            _ => None,
        }
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> u8 {
        match frame_type {
            FrameType::AtCommand => 0x08,
            FrameType::AtCommandQueue => 0x09,
            FrameType::TransmitRequest => 0x10,
            FrameType::RemoteAtCommand => 0x17,
            FrameType::AtCommandResponse => 0x88,
            FrameType::ModemStatus => 0x8A,
            FrameType::TransmitStatus => 0x8B,
            FrameType::ReceivePacket => 0x90,
            FrameType::NodeIdentification => 0x95,
            FrameType::RemoteAtCommandResponse => 0x97,
            FrameType::Unknown(byte) => byte,
        }
    }
}

impl From<u8> for FrameType {
    fn from(byte: u8) -> Self {
        match byte {
            0x08 => FrameType::AtCommand,
            0x09 => FrameType::AtCommandQueue,
            0x10 => FrameType::TransmitRequest,
            0x17 => FrameType::RemoteAtCommand,
            0x88 => FrameType::AtCommandResponse,
            0x8A => FrameType::ModemStatus,
            0x8B => FrameType::TransmitStatus,
            0x90 => FrameType::ReceivePacket,
            0x95 => FrameType::NodeIdentification,
            0x97 => FrameType::RemoteAtCommandResponse,
            unknown => FrameType::Unknown(unknown),
        }
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Unknown(byte) => write!(f, "Unknown ({:#04x})", byte),
            known => write!(f, "{:?} ({:#04x})", known, u8::from(*known)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TransmissionFailure,
    Unknown(u8),
}

impl From<u8> for AtStatus {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => AtStatus::Ok,
            0x01 => AtStatus::Error,
            0x02 => AtStatus::InvalidCommand,
            0x03 => AtStatus::InvalidParameter,
            0x04 => AtStatus::TransmissionFailure,
            unknown => AtStatus::Unknown(unknown),
        }
    }
}

impl Display for AtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtStatus::Ok => write!(f, "OK"),
            AtStatus::Error => write!(f, "ERROR"),
            AtStatus::InvalidCommand => write!(f, "invalid command"),
            AtStatus::InvalidParameter => write!(f, "invalid parameter"),
            AtStatus::TransmissionFailure => write!(f, "transmission failure"),
            AtStatus::Unknown(byte) => write!(f, "unknown status {:#04x}", byte),
        }
    }
}

/// A request to the module. The frame id stays zero (fire-and-forget) until the coordinator
/// assigns one.
#[derive(Clone, Debug, PartialEq)]
pub struct SendPacket {
    frame_type: FrameType,
    frame_id: FrameId,
    command: Option<AtCommand>,
    data: Vec<u8>,
}

impl SendPacket {
    /// A packet of any type. For types that carry a frame id, `data` excludes it.
    pub fn raw(frame_type: FrameType, data: Vec<u8>) -> Self {
        Self {
            frame_type,
            frame_id: 0,
            command: None,
            data,
        }
    }

    pub fn at_command(command: AtCommand, parameters: &[u8]) -> Self {
        let mut data = Vec::with_capacity(2 + parameters.len());
        data.extend_from_slice(&command.code());
        data.extend_from_slice(parameters);

        Self {
            frame_type: FrameType::AtCommand,
            frame_id: 0,
            command: Some(command),
            data,
        }
    }

    pub fn remote_at_command(
        destination: ExtendedAddress,
        network_address: ShortAddress,
        options: u8,
        command: AtCommand,
        parameters: &[u8],
    ) -> Self {
        let mut data = Vec::with_capacity(13 + parameters.len());
        data.extend_from_slice(&destination.to_be_bytes());
        data.extend_from_slice(&network_address.to_be_bytes());
        data.push(options);
        data.extend_from_slice(&command.code());
        data.extend_from_slice(parameters);

        Self {
            frame_type: FrameType::RemoteAtCommand,
            frame_id: 0,
            command: Some(command),
            data,
        }
    }

    pub fn transmit_request(
        destination: ExtendedAddress,
        network_address: ShortAddress,
        radius: u8,
        options: u8,
        rf_data: &[u8],
    ) -> Self {
        let mut data = Vec::with_capacity(12 + rf_data.len());
        data.extend_from_slice(&destination.to_be_bytes());
        data.extend_from_slice(&network_address.to_be_bytes());
        data.push(radius);
        data.push(options);
        data.extend_from_slice(rf_data);

        Self {
            frame_type: FrameType::TransmitRequest,
            frame_id: 0,
            command: None,
            data,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn set_frame_id(&mut self, frame_id: FrameId) {
        self.frame_id = frame_id;
    }

    pub fn command(&self) -> Option<AtCommand> {
        self.command
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the module will answer this packet.
    pub fn expects_reply(&self) -> bool {
        self.frame_id != 0 && self.frame_type.response_type().is_some()
    }

    /// Payload as it goes on the wire, after the frame type byte.
    pub fn payload(&self) -> Vec<u8> {
        if self.frame_type.carries_frame_id() {
            let mut payload = Vec::with_capacity(1 + self.data.len());
            payload.push(self.frame_id);
            payload.extend_from_slice(&self.data);
            payload
        } else {
            self.data.clone()
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        frame::encode(self.frame_type.into(), &self.payload())
    }
}

/// A frame received from the module, with the common envelope fields pulled out.
///
/// Parsing never fails: a payload too short for its frame type yields a packet with
/// `valid == false` and whatever fields could be read.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivePacket {
    pub frame_type: FrameType,
    pub frame_id: FrameId,
    pub command: Option<AtCommand>,
    pub source: Option<SourceAddress>,
    pub status: Option<u8>,
    pub options: Option<u8>,
    pub data: Vec<u8>,
    pub valid: bool,
}

impl ReceivePacket {
    pub fn from_frame(frame_type: u8, payload: Vec<u8>) -> Self {
        let mut packet = Self {
            frame_type: FrameType::from(frame_type),
            frame_id: 0,
            command: None,
            source: None,
            status: None,
            options: None,
            data: Vec::new(),
            valid: false,
        };

        match packet.read_fields(&payload) {
            Ok(()) => packet.valid = true,
            Err(error) => debug!("short {} payload: {}", packet.frame_type, error),
        }

        packet
    }

    fn read_fields(&mut self, payload: &[u8]) -> Result<()> {
        let mut r = Cursor::new(payload);

        if self.frame_type.carries_frame_id() {
            self.frame_id = r.read_wire()?;
        }

        match self.frame_type {
            FrameType::AtCommandResponse => {
                self.command = Some(read_command(&mut r)?);
                self.status = Some(r.read_wire()?);
            }
            FrameType::RemoteAtCommandResponse => {
                self.source = Some(read_source(&mut r)?);
                self.command = Some(read_command(&mut r)?);
                self.status = Some(r.read_wire()?);
            }
            FrameType::TransmitStatus => {
                let short = r.read_wire()?;
                self.source = Some(SourceAddress {
                    short,
                    extended: None,
                });
                let retries: u8 = r.read_wire()?;
                self.status = Some(r.read_wire()?);
                let discovery: u8 = r.read_wire()?;
                self.data = vec![retries, discovery];
                return Ok(());
            }
            FrameType::ModemStatus => {
                self.status = Some(r.read_wire()?);
            }
            FrameType::ReceivePacket | FrameType::NodeIdentification => {
                self.source = Some(read_source(&mut r)?);
                self.options = Some(r.read_wire()?);
            }
            _ => {}
        }

        r.read_to_end(&mut self.data).map_err(crate::Error::truncated)?;
        Ok(())
    }

    /// Status of an AT command response.
    pub fn at_status(&self) -> Option<AtStatus> {
        match self.frame_type {
            FrameType::AtCommandResponse | FrameType::RemoteAtCommandResponse => {
                self.status.map(AtStatus::from)
            }
            _ => None,
        }
    }

    /// Unwraps the data of a well-formed, successful AT response.
    pub fn into_data(self) -> Result<Vec<u8>> {
        if !self.valid {
            return Err(ErrorKind::InvalidResponse(self.frame_type).into());
        }
        match self.at_status() {
            Some(AtStatus::Ok) | None => Ok(self.data),
            Some(status) => Err(ErrorKind::CommandFailed(status).into()),
        }
    }
}

fn read_command<R>(r: &mut R) -> Result<AtCommand>
where
    R: Read,
{
    let first: u8 = r.read_wire()?;
    let second: u8 = r.read_wire()?;
    Ok(AtCommand::from([first, second]))
}

fn read_source<R>(r: &mut R) -> Result<SourceAddress>
where
    R: Read,
{
    let extended = r.read_wire()?;
    let short = r.read_wire()?;
    Ok(SourceAddress {
        short,
        extended: Some(extended),
    })
}

/// What a receive is waiting for. Only a frame of the right type carrying exactly the right
/// frame id is accepted; everything else is unsolicited.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Expected {
    pub frame_type: FrameType,
    pub frame_id: Option<FrameId>,
    pub command: Option<AtCommand>,
}

impl Expected {
    pub fn frame_type(frame_type: FrameType) -> Self {
        Self {
            frame_type,
            frame_id: None,
            command: None,
        }
    }

    /// The reply to `request`, which must already have its frame id assigned.
    pub fn reply_to(request: &SendPacket) -> Result<Self> {
        let frame_type = request
            .frame_type()
            .response_type()
            .ok_or(ErrorKind::NoReply(request.frame_type()))?;

        Ok(Self {
            frame_type,
            frame_id: Some(request.frame_id()),
            command: request.command(),
        })
    }

    pub fn matches(&self, packet: &ReceivePacket) -> bool {
        if packet.frame_type != self.frame_type {
            return false;
        }
        if let Some(frame_id) = self.frame_id {
            if packet.frame_id != frame_id {
                return false;
            }
        }
        match (self.command, packet.command) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_round_trips_through_byte() {
        for byte in [0x08u8, 0x09, 0x10, 0x17, 0x88, 0x8A, 0x8B, 0x90, 0x95, 0x97, 0x42].iter() {
            assert_eq!(u8::from(FrameType::from(*byte)), *byte);
        }
        assert_eq!(FrameType::from(0x42), FrameType::Unknown(0x42));
    }

    #[test]
    fn at_command_payload_starts_with_frame_id() {
        let mut packet = SendPacket::at_command(AtCommand::NodeIdentifier, b"hub");
        assert!(!packet.expects_reply());
        packet.set_frame_id(0x2A);
        assert!(packet.expects_reply());
        assert_eq!(packet.payload(), b"\x2aNIhub".to_vec());
        assert_eq!(
            packet.encode().unwrap(),
            frame::encode(0x08, b"\x2aNIhub").unwrap()
        );
    }

    #[test]
    fn remote_at_command_layout() {
        let mut packet = SendPacket::remote_at_command(
            0x0013_A200_4000_0001,
            0x1234,
            0x02,
            AtCommand::FirmwareVersion,
            &[],
        );
        packet.set_frame_id(7);
        assert_eq!(
            packet.payload(),
            vec![0x07, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x00, 0x00, 0x01, 0x12, 0x34, 0x02, b'V', b'R']
        );
    }

    #[test]
    fn transmit_request_layout() {
        let packet = SendPacket::transmit_request(0xFFFF, 0xFFFE, 0, 0, b"hi");
        assert_eq!(packet.frame_type().response_type(), Some(FrameType::TransmitStatus));
        assert_eq!(
            packet.payload(),
            vec![0x00, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFE, 0, 0, b'h', b'i']
        );
    }

    #[test]
    fn parses_at_response() {
        let packet = ReceivePacket::from_frame(0x88, vec![0x05, b'M', b'Y', 0x00, 0x12, 0x34]);
        assert!(packet.valid);
        assert_eq!(packet.frame_type, FrameType::AtCommandResponse);
        assert_eq!(packet.frame_id, 5);
        assert_eq!(packet.command, Some(AtCommand::NetworkAddress));
        assert_eq!(packet.at_status(), Some(AtStatus::Ok));
        assert_eq!(packet.source, None);
        assert_eq!(packet.into_data().unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn failed_at_response_reports_status() {
        let packet = ReceivePacket::from_frame(0x88, vec![0x05, b'Z', b'Z', 0x02]);
        assert!(packet.valid);
        let error = packet.into_data().unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::CommandFailed(AtStatus::InvalidCommand)
        ));
    }

    #[test]
    fn parses_remote_at_response() {
        let mut payload = vec![0x09];
        payload.extend_from_slice(&0x0013_A200_4000_0001u64.to_be_bytes());
        payload.extend_from_slice(&[0x12, 0x34, b'H', b'V', 0x00, 0x1E, 0x42]);

        let packet = ReceivePacket::from_frame(0x97, payload);
        assert!(packet.valid);
        assert_eq!(packet.frame_id, 9);
        assert_eq!(
            packet.source,
            Some(SourceAddress {
                short: 0x1234,
                extended: Some(0x0013_A200_4000_0001),
            })
        );
        assert_eq!(packet.command, Some(AtCommand::HardwareVersion));
        assert_eq!(packet.data, vec![0x1E, 0x42]);
    }

    #[test]
    fn parses_transmit_status() {
        let packet = ReceivePacket::from_frame(0x8B, vec![0x03, 0x7D, 0x84, 0x01, 0x00, 0x02]);
        assert!(packet.valid);
        assert_eq!(packet.frame_id, 3);
        assert_eq!(packet.source.map(|source| source.short), Some(0x7D84));
        assert_eq!(packet.status, Some(0x00));
        assert_eq!(packet.data, vec![0x01, 0x02]);
        assert_eq!(packet.at_status(), None);
    }

    #[test]
    fn modem_status_has_no_frame_id() {
        let packet = ReceivePacket::from_frame(0x8A, vec![0x02]);
        assert!(packet.valid);
        assert_eq!(packet.frame_id, 0);
        assert_eq!(packet.status, Some(0x02));
    }

    #[test]
    fn short_payload_is_invalid_not_an_error() {
        let packet = ReceivePacket::from_frame(0x88, vec![0x01, 0x4E, 0x4A]);
        assert!(!packet.valid);
        assert_eq!(packet.frame_id, 1);
        assert_eq!(packet.command, Some(AtCommand::NodeJoinTime));
        assert_eq!(packet.status, None);
        assert!(matches!(
            packet.into_data().unwrap_err().kind,
            ErrorKind::InvalidResponse(FrameType::AtCommandResponse)
        ));

        assert!(!ReceivePacket::from_frame(0x90, vec![0x00; 4]).valid);
    }

    #[test]
    fn unknown_frame_keeps_payload() {
        let packet = ReceivePacket::from_frame(0xA1, vec![1, 2, 3]);
        assert!(packet.valid);
        assert_eq!(packet.frame_type, FrameType::Unknown(0xA1));
        assert_eq!(packet.data, vec![1, 2, 3]);
    }

    #[test]
    fn expected_requires_exact_frame_id() {
        let mut request = SendPacket::at_command(AtCommand::NodeJoinTime, &[]);
        request.set_frame_id(1);
        let expected = Expected::reply_to(&request).unwrap();

        let reply = ReceivePacket::from_frame(0x88, vec![0x01, b'N', b'J', 0x00]);
        let stale = ReceivePacket::from_frame(0x88, vec![0x02, b'N', b'J', 0x00]);
        let other_command = ReceivePacket::from_frame(0x88, vec![0x01, b'N', b'I', 0x00]);
        let other_type = ReceivePacket::from_frame(0x8B, vec![0x01, 0, 0, 0, 0, 0]);

        assert!(expected.matches(&reply));
        assert!(!expected.matches(&stale));
        assert!(!expected.matches(&other_command));
        assert!(!expected.matches(&other_type));
    }

    #[test]
    fn modem_status_has_no_reply() {
        let request = SendPacket::raw(FrameType::ModemStatus, vec![0x00]);
        assert!(matches!(
            Expected::reply_to(&request).unwrap_err().kind,
            ErrorKind::NoReply(FrameType::ModemStatus)
        ));
    }
}
