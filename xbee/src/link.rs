use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::{Result, DEFAULT_READ_TIMEOUT};

/// Duplex byte stream to the coordinator module.
pub trait ByteLink {
    /// Reads whatever is available, waiting at most `timeout`. Returns 0 if nothing arrived.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Writes `buf`, returning how many bytes the link accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<L> ByteLink for Box<L>
where
    L: ByteLink + ?Sized,
{
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}

impl<L> ByteLink for &mut L
where
    L: ByteLink + ?Sized,
{
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}

/// A serial port opened 8N1 without flow control. Closed when dropped.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink {
    pub fn open<P>(path: P, baud: u32) -> Result<Self>
    where
        P: AsRef<str>,
    {
        let port = serialport::new(path.as_ref(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()?;
        info!("opened {} at {} baud", path.as_ref(), baud);

        Ok(Self {
            port,
            timeout: DEFAULT_READ_TIMEOUT,
        })
    }
}

impl ByteLink for SerialLink {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }

        match Read::read(&mut self.port, buf) {
            Ok(n) => Ok(n),
            Err(error) if error.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(error) => Err(error),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = Write::write(&mut self.port, buf)?;
        Write::flush(&mut self.port)?;
        Ok(written)
    }
}
