use std::fmt::{self, Display};
use std::io::{BufRead, Cursor};

use crate::{ExtendedAddress, ReadWireExt, Result, ShortAddress, UNKNOWN_NETWORK_ADDRESS};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
    Unknown(u8),
}

impl From<u8> for DeviceType {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => DeviceType::Coordinator,
            0x01 => DeviceType::Router,
            0x02 => DeviceType::EndDevice,
            unknown => DeviceType::Unknown(unknown),
        }
    }
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Coordinator => write!(f, "coordinator"),
            DeviceType::Router => write!(f, "router"),
            DeviceType::EndDevice => write!(f, "end device"),
            DeviceType::Unknown(byte) => write!(f, "unknown ({:#04x})", byte),
        }
    }
}

/// Topology fields only known for devices found by node discovery.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RemoteInfo {
    /// Network address one hop closer to the coordinator.
    pub parent_address: ShortAddress,
    pub device_type: DeviceType,
    pub profile_id: u16,
    pub manufacturer_id: u16,
}

impl Default for RemoteInfo {
    fn default() -> Self {
        Self {
            parent_address: 0,
            device_type: DeviceType::Coordinator,
            profile_id: 0,
            manufacturer_id: 0,
        }
    }
}

/// Identity of a radio module: either the local coordinator or a remote device discovered
/// through it (`remote` is `Some`).
///
/// Records are built once from a response and never updated; a re-scan produces new ones.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    serial_number: ExtendedAddress,
    network_address: ShortAddress,
    name: String,
    hardware_version: u16,
    software_version: u16,
    valid: bool,
    remote: Option<RemoteInfo>,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            serial_number: 0,
            network_address: UNKNOWN_NETWORK_ADDRESS,
            name: String::new(),
            hardware_version: 0,
            software_version: 0,
            valid: false,
            remote: None,
        }
    }
}

impl Device {
    pub(crate) fn local(
        serial_number: ExtendedAddress,
        network_address: Option<ShortAddress>,
        name: String,
        hardware_version: u16,
        software_version: u16,
    ) -> Self {
        Self {
            serial_number,
            network_address: network_address.unwrap_or(UNKNOWN_NETWORK_ADDRESS),
            name,
            hardware_version,
            software_version,
            valid: serial_number != 0 && network_address.is_some(),
            remote: None,
        }
    }

    /// Parses a node discovery record, as carried by an `ND` response or a node identification
    /// frame:
    ///
    /// ```text
    /// MY(2) SH(4) SL(4) NI(..0) PARENT(2) DEVICE_TYPE(1) STATUS(1) PROFILE(2) MANUFACTURER(2)
    /// ```
    ///
    /// Only the addresses are required. Fields missing from a short record keep zero values.
    pub fn from_node_record(record: &[u8]) -> Self {
        let mut r = Cursor::new(record);

        let (network_address, serial_number) = match read_addresses(&mut r) {
            Ok(addresses) => addresses,
            Err(error) => {
                debug!("node record of {} bytes: {}", record.len(), error);
                return Self {
                    remote: Some(RemoteInfo::default()),
                    ..Default::default()
                };
            }
        };

        let mut name = Vec::new();
        // Reading from a slice cannot fail.
        let _ = r.read_until(0, &mut name);
        if name.last() == Some(&0) {
            name.pop();
        }

        let mut remote = RemoteInfo::default();
        if let Ok(parent_address) = r.read_wire() {
            remote.parent_address = parent_address;
        }
        if let Ok(device_type) = r.read_wire::<u8>() {
            remote.device_type = device_type.into();
        }
        let _status: Result<u8> = r.read_wire();
        if let Ok(profile_id) = r.read_wire() {
            remote.profile_id = profile_id;
        }
        if let Ok(manufacturer_id) = r.read_wire() {
            remote.manufacturer_id = manufacturer_id;
        }

        Self {
            serial_number,
            network_address,
            name: String::from_utf8_lossy(&name).into_owned(),
            hardware_version: 0,
            software_version: 0,
            valid: serial_number != 0,
            remote: Some(remote),
        }
    }

    /// Fills in versions queried after discovery, before the record is handed out.
    pub(crate) fn with_versions(self, hardware_version: u16, software_version: u16) -> Self {
        Self {
            hardware_version,
            software_version,
            ..self
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn serial_number(&self) -> ExtendedAddress {
        self.serial_number
    }

    pub fn network_address(&self) -> ShortAddress {
        self.network_address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hardware_version(&self) -> u16 {
        self.hardware_version
    }

    pub fn software_version(&self) -> u16 {
        self.software_version
    }

    pub fn remote(&self) -> Option<&RemoteInfo> {
        self.remote.as_ref()
    }

    pub fn parent_address(&self) -> Option<ShortAddress> {
        self.remote.map(|remote| remote.parent_address)
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        self.remote.map(|remote| remote.device_type)
    }
}

fn read_addresses(r: &mut Cursor<&[u8]>) -> Result<(ShortAddress, ExtendedAddress)> {
    let network_address = r.read_wire()?;
    let high: u32 = r.read_wire()?;
    let low: u32 = r.read_wire()?;
    Ok((
        network_address,
        (u64::from(high) << 32) | u64::from(low),
    ))
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016X} @ {:04X} {:?}",
            self.serial_number, self.network_address, self.name
        )?;
        if let Some(remote) = &self.remote {
            write!(
                f,
                " {} via {:04X}",
                remote.device_type, remote.parent_address
            )?;
        }
        if self.hardware_version != 0 || self.software_version != 0 {
            write!(
                f,
                " hw {:04X} fw {:04X}",
                self.hardware_version, self.software_version
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &[u8], tail: &[u8]) -> Vec<u8> {
        let mut record = vec![0x7D, 0x84, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA];
        record.extend_from_slice(name);
        record.extend_from_slice(tail);
        record
    }

    #[test]
    fn parses_full_record() {
        let device = Device::from_node_record(&record(
            b"kitchen\0",
            &[0x00, 0x00, 0x01, 0x00, 0xC1, 0x05, 0x10, 0x1E],
        ));

        assert!(device.is_valid());
        assert_eq!(device.network_address(), 0x7D84);
        assert_eq!(device.serial_number(), 0x0013_A200_4052_2BAA);
        assert_eq!(device.name(), "kitchen");
        assert_eq!(
            device.remote(),
            Some(&RemoteInfo {
                parent_address: 0x0000,
                device_type: DeviceType::Router,
                profile_id: 0xC105,
                manufacturer_id: 0x101E,
            })
        );
    }

    #[test]
    fn reduced_record_keeps_defaults() {
        let device = Device::from_node_record(&record(b"\0", &[0x12, 0x34]));

        assert!(device.is_valid());
        assert_eq!(device.name(), "");
        assert_eq!(device.parent_address(), Some(0x1234));
        assert_eq!(device.device_type(), Some(DeviceType::Coordinator));
        assert_eq!(device.remote().map(|remote| remote.profile_id), Some(0));
    }

    #[test]
    fn unterminated_name_takes_the_rest() {
        let device = Device::from_node_record(&record(b"attic", &[]));
        assert!(device.is_valid());
        assert_eq!(device.name(), "attic");
        assert_eq!(device.parent_address(), Some(0));
    }

    #[test]
    fn truncated_addresses_are_invalid() {
        let device = Device::from_node_record(&[0x7D, 0x84, 0x00, 0x13]);
        assert!(!device.is_valid());
        assert!(device.remote().is_some());
    }

    #[test]
    fn zero_serial_is_invalid() {
        let device = Device::from_node_record(&[0x00; 10]);
        assert!(!device.is_valid());
    }

    #[test]
    fn local_device_needs_network_address() {
        assert!(Device::local(0x0013_A200_0000_0001, Some(0), "hub".into(), 0, 0).is_valid());
        assert!(!Device::local(0x0013_A200_0000_0001, None, "hub".into(), 0, 0).is_valid());
        assert!(!Device::local(0, Some(0), String::new(), 0, 0).is_valid());
        assert!(!Device::default().is_valid());
        assert_eq!(Device::default().remote(), None);
    }
}
