use std::collections::VecDeque;
use std::io::Cursor;
use std::time::{Duration, Instant};

use crate::frame::{FrameReader, FrameWriter};
use crate::{
    AtCommand, AtStatus, ByteLink, CoordinatorConfig, Device, ErrorKind, Expected, FrameId,
    FrameType, ReadWireExt, ReceivePacket, Result, SendPacket,
};

const READ_CHUNK: usize = 256;

/// The module wired to the host. Frames requests, correlates replies by frame id, and keeps the
/// list of devices found by the last scan.
///
/// All operations block until they complete or time out. The coordinator holds unsynchronized
/// mutable state (frame counter, receive buffer) and must only be driven from one thread at a
/// time; wrap it in a `CoordinatorHandle` to share it between async tasks.
pub struct Coordinator<L>
where
    L: ByteLink,
{
    link: L,
    config: CoordinatorConfig,
    frame_counter: FrameId,
    reader: FrameReader,
    writer: FrameWriter,
    device: Device,
    connected_devices: Vec<Device>,
    unsolicited: VecDeque<ReceivePacket>,
    last_retries: usize,
}

impl<L> Coordinator<L>
where
    L: ByteLink,
{
    /// Takes over a link that is already open and configured.
    pub fn new(link: L) -> Self {
        Self::with_config(link, CoordinatorConfig::default())
    }

    pub fn with_config(link: L, config: CoordinatorConfig) -> Self {
        Self {
            link,
            config,
            frame_counter: 1,
            reader: FrameReader::new(),
            writer: FrameWriter::new(),
            device: Device::default(),
            connected_devices: Vec::new(),
            unsolicited: VecDeque::new(),
            last_retries: 0,
        }
    }

    pub fn set_number_of_retries(&mut self, retries: usize) {
        self.config.number_of_retries = retries;
    }

    pub fn number_of_retries(&self) -> usize {
        self.config.number_of_retries
    }

    /// Retries used by the most recent `process` or `receive`.
    pub fn last_retries(&self) -> usize {
        self.last_retries
    }

    /// The coordinator's own identity, as read by `identify`.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Devices found by the most recent scan, plus any that announced themselves since.
    pub fn connected_devices(&self) -> &[Device] {
        &self.connected_devices
    }

    fn next_frame_id(&mut self) -> FrameId {
        // 1..=255, never 0: a zero frame id tells the module not to reply.
        let id = self.frame_counter;
        self.frame_counter = if id == u8::MAX { 1 } else { id + 1 };
        id
    }

    /// Writes a packet as-is. A packet with frame id 0 gets no reply.
    pub fn send(&mut self, packet: &SendPacket) -> Result<()> {
        debug!(
            "sending {} id={} data={:02x?}",
            packet.frame_type(),
            packet.frame_id(),
            packet.data()
        );
        self.writer
            .write_frame(&mut self.link, packet.frame_type().into(), &packet.payload())
    }

    /// Reads until one checksum-valid frame is decoded or `timeout` passes.
    ///
    /// Corrupt candidates are skipped a byte at a time. A partial frame is kept across attempts
    /// as long as bytes keep arriving; one that gained nothing for a whole attempt loses its
    /// start delimiter so scanning can move past it. Returns `Ok(None)` on timeout; only link
    /// failures are errors.
    fn receive_packet(&mut self, timeout: Duration) -> Result<Option<ReceivePacket>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0; READ_CHUNK];
        let mut progressed = false;

        loop {
            while let Some(result) = self.reader.next_frame() {
                match result {
                    Ok((frame_type, payload)) => {
                        let packet = ReceivePacket::from_frame(frame_type, payload);
                        debug!("received = {:?}", packet);
                        return Ok(Some(packet));
                    }
                    Err(error) => warn!("resynchronizing: {}", error),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                if !progressed && self.reader.resync() {
                    debug!("dropped stalled frame start ({} bytes held)", self.reader.len());
                }
                return Ok(None);
            }

            let wait = self.config.read_timeout.min(deadline - now);
            let n = self.link.read(&mut buf, wait)?;
            if n > 0 {
                trace!("read {:02x?}", &buf[..n]);
                self.reader.push(&buf[..n]);
                progressed = true;
            }
        }
    }

    /// Waits for the packet described by `expected`.
    ///
    /// Each receive attempt that times out uses one retry; after `number_of_retries` of them the
    /// wait fails with `ErrorKind::Timeout`. Well-formed frames that do not match are handed to
    /// unsolicited handling and do not use a retry.
    pub fn receive(&mut self, expected: &Expected) -> Result<ReceivePacket> {
        let mut retries = 0;

        loop {
            match self.receive_packet(self.config.receive_timeout)? {
                Some(packet) if expected.matches(&packet) => {
                    self.last_retries = retries;
                    return Ok(packet);
                }
                Some(packet) => self.handle_unsolicited(packet),
                None => {
                    if retries == self.config.number_of_retries {
                        self.last_retries = retries;
                        return Err(ErrorKind::Timeout { retries }.into());
                    }
                    retries += 1;
                    debug!(
                        "waiting for {} id={:?}: retry {}/{}",
                        expected.frame_type, expected.frame_id, retries, self.config.number_of_retries
                    );
                }
            }
        }
    }

    /// Returns the next packet of any kind: queued unsolicited traffic first, then a single
    /// receive attempt on the link. `Ok(None)` if nothing arrived.
    pub fn receive_any(&mut self) -> Result<Option<ReceivePacket>> {
        if let Some(packet) = self.unsolicited.pop_front() {
            return Ok(Some(packet));
        }

        let packet = self.receive_packet(self.config.receive_timeout)?;
        if let Some(device) = packet.as_ref().and_then(announced_device) {
            self.merge_device(device);
        }
        Ok(packet)
    }

    /// Sends `request` with a freshly allocated frame id and waits for the matching reply.
    pub fn process(&mut self, request: &mut SendPacket) -> Result<ReceivePacket> {
        request.set_frame_id(self.next_frame_id());
        let expected = Expected::reply_to(request)?;

        self.send(request)?;
        self.receive(&expected)
    }

    /// Runs a local AT command and returns its data, failing on a non-OK status.
    pub fn at_command(&mut self, command: AtCommand, parameters: &[u8]) -> Result<Vec<u8>> {
        let mut request = SendPacket::at_command(command, parameters);
        self.process(&mut request)?.into_data()
    }

    /// Runs an AT command on a remote device and returns its data.
    pub fn remote_at_command(
        &mut self,
        device: &Device,
        command: AtCommand,
        parameters: &[u8],
    ) -> Result<Vec<u8>> {
        let mut request = SendPacket::remote_at_command(
            device.serial_number(),
            device.network_address(),
            0,
            command,
            parameters,
        );
        self.process(&mut request)?.into_data()
    }

    /// Reads the coordinator's own serial number, address, name and versions.
    pub fn identify(&mut self) -> Result<&Device> {
        let high = read_u32(self.at_command(AtCommand::SerialNumberHigh, &[])?)?;
        let low = read_u32(self.at_command(AtCommand::SerialNumberLow, &[])?)?;
        let network_address = read_u16(self.at_command(AtCommand::NetworkAddress, &[])?).ok();
        let name = self.at_command(AtCommand::NodeIdentifier, &[])?;
        let hardware_version = read_u16(self.at_command(AtCommand::HardwareVersion, &[])?)?;
        let software_version = read_u16(self.at_command(AtCommand::FirmwareVersion, &[])?)?;

        self.device = Device::local(
            (u64::from(high) << 32) | u64::from(low),
            network_address,
            String::from_utf8_lossy(&name)
                .trim_end_matches('\0')
                .to_owned(),
            hardware_version,
            software_version,
        );
        info!("coordinator: {}", self.device);

        Ok(&self.device)
    }

    /// Broadcasts a node discovery and collects replies until the link falls silent.
    ///
    /// The previous device list is replaced, not merged. Returns the number of devices found.
    pub fn scan_devices(&mut self) -> Result<usize> {
        self.connected_devices.clear();

        let mut request = SendPacket::at_command(AtCommand::NodeDiscover, &[]);
        request.set_frame_id(self.next_frame_id());
        let expected = Expected::reply_to(&request)?;
        self.send(&request)?;

        while let Some(packet) = self.receive_packet(self.config.discovery_timeout)? {
            if !expected.matches(&packet) {
                self.handle_unsolicited(packet);
                continue;
            }

            if packet.at_status() != Some(AtStatus::Ok) {
                warn!("node discovery reply: {:?}", packet.at_status());
                continue;
            }
            // The module ends discovery with an empty response.
            if packet.data.is_empty() {
                debug!("node discovery finished");
                break;
            }

            let device = Device::from_node_record(&packet.data);
            if !device.is_valid() {
                warn!("ignoring malformed node record: {:02x?}", packet.data);
                continue;
            }
            info!("discovered {}", device);
            self.merge_device(device);
        }

        if self.config.query_remote_versions {
            let devices = std::mem::take(&mut self.connected_devices);
            for device in devices {
                let device = self.query_versions(device)?;
                self.merge_device(device);
            }
        }

        Ok(self.connected_devices.len())
    }

    fn query_versions(&mut self, device: Device) -> Result<Device> {
        let hardware_version = self.remote_version(&device, AtCommand::HardwareVersion)?;
        let software_version = self.remote_version(&device, AtCommand::FirmwareVersion)?;
        Ok(device.with_versions(hardware_version, software_version))
    }

    /// Zero if the device does not answer; link failures still propagate.
    fn remote_version(&mut self, device: &Device, command: AtCommand) -> Result<u16> {
        match self
            .remote_at_command(device, command, &[])
            .and_then(read_u16)
        {
            Ok(version) => Ok(version),
            Err(error) if error.is_link_failure() => Err(error),
            Err(error) => {
                warn!(
                    "{} ({}) of {:016X}: {}",
                    command.description(),
                    command,
                    device.serial_number(),
                    error
                );
                Ok(0)
            }
        }
    }

    fn handle_unsolicited(&mut self, packet: ReceivePacket) {
        if let Some(device) = announced_device(&packet) {
            info!("device announced: {}", device);
            self.merge_device(device);
            return;
        }

        debug!("unsolicited {} id={}", packet.frame_type, packet.frame_id);
        if self.config.unsolicited_capacity == 0 {
            return;
        }
        while self.unsolicited.len() >= self.config.unsolicited_capacity {
            if let Some(dropped) = self.unsolicited.pop_front() {
                warn!("unsolicited queue full, dropping {}", dropped.frame_type);
            }
        }
        self.unsolicited.push_back(packet);
    }

    fn merge_device(&mut self, device: Device) {
        match self
            .connected_devices
            .iter_mut()
            .find(|known| known.serial_number() == device.serial_number())
        {
            Some(known) => *known = device,
            None => self.connected_devices.push(device),
        }
    }
}

/// A device record carried by an unsolicited frame: a node identification, or a node discovery
/// reply that arrived after its scan ended.
fn announced_device(packet: &ReceivePacket) -> Option<Device> {
    let record = match packet.frame_type {
        FrameType::NodeIdentification if packet.valid => &packet.data,
        FrameType::AtCommandResponse
            if packet.command == Some(AtCommand::NodeDiscover)
                && packet.at_status() == Some(AtStatus::Ok)
                && !packet.data.is_empty() =>
        {
            &packet.data
        }
        _ => return None,
    };

    let device = Device::from_node_record(record);
    if device.is_valid() {
        Some(device)
    } else {
        None
    }
}

fn read_u16(data: Vec<u8>) -> Result<u16> {
    Cursor::new(data).read_wire()
}

fn read_u32(data: Vec<u8>) -> Result<u32> {
    Cursor::new(data).read_wire()
}
