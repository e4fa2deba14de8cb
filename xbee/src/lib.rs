mod commands;
mod config;
mod coordinator;
mod device;
mod errors;
pub mod frame;
mod link;
mod packet;
mod types;
mod worker;

#[macro_use]
extern crate log;

pub use crate::commands::{AtCommand, AT_COMMANDS};
pub use crate::config::{
    CoordinatorConfig, DEFAULT_BAUD, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_NUMBER_OF_RETRIES,
    DEFAULT_READ_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT,
};
pub use crate::coordinator::Coordinator;
pub use crate::device::{Device, DeviceType, RemoteInfo};
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::frame::{Decoded, FrameError};
pub use crate::link::{ByteLink, SerialLink};
pub use crate::packet::{AtStatus, Expected, FrameType, ReceivePacket, SendPacket};
pub use crate::types::{
    ExtendedAddress, FrameId, ShortAddress, SourceAddress, UNKNOWN_NETWORK_ADDRESS,
};
pub use crate::worker::CoordinatorHandle;

/// Opens a serial port and wraps it in a coordinator.
///
/// The port is configured here (8N1, no flow control); the coordinator itself never touches
/// link settings.
pub fn open_tty<P>(path: P, baud: u32, config: CoordinatorConfig) -> Result<Coordinator<SerialLink>>
where
    P: AsRef<str>,
{
    let link = SerialLink::open(path, baud)?;
    Ok(Coordinator::with_config(link, config))
}

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

/// Reads a big-endian value out of a response payload.
///
/// Running off the end of the payload is reported as `ErrorKind::Truncated` rather than as an IO
/// error, so it is never mistaken for a link failure.
pub trait ReadWire: Sized {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read;
}

impl ReadWire for u8 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        r.read_u8().map_err(Error::truncated)
    }
}

impl ReadWire for u16 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        r.read_u16::<BigEndian>().map_err(Error::truncated)
    }
}

impl ReadWire for u32 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        r.read_u32::<BigEndian>().map_err(Error::truncated)
    }
}

impl ReadWire for u64 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        r.read_u64::<BigEndian>().map_err(Error::truncated)
    }
}

pub trait ReadWireExt {
    fn read_wire<T>(&mut self) -> Result<T>
    where
        T: ReadWire;
}

impl<R> ReadWireExt for R
where
    R: Read,
{
    fn read_wire<T>(&mut self) -> Result<T>
    where
        T: ReadWire,
    {
        T::read_wire(self)
    }
}
