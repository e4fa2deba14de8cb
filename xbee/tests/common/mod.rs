#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xbee::frame;
use xbee::{ByteLink, CoordinatorConfig, ExtendedAddress, ShortAddress};

enum Chunk {
    Bytes(Vec<u8>),
    Silence(Duration),
}

#[derive(Default)]
struct State {
    incoming: VecDeque<Chunk>,
    written: Vec<Vec<u8>>,
    silent_reads: usize,
    fail_writes: bool,
    short_writes: bool,
}

/// In-memory link that plays back queued chunks and records everything written.
///
/// Clones share state, so a test can keep one clone while the coordinator owns another.
#[derive(Clone, Default)]
pub struct ScriptedLink {
    state: Arc<Mutex<State>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Default::default()
    }

    /// Queues bytes to be returned by a single read.
    pub fn push(&self, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .incoming
            .push_back(Chunk::Bytes(bytes.to_vec()));
    }

    /// Queues a read that returns nothing after `duration`, however short the read timeout.
    pub fn push_silence(&self, duration: Duration) {
        self.state
            .lock()
            .unwrap()
            .incoming
            .push_back(Chunk::Silence(duration));
    }

    pub fn push_chunked(&self, bytes: &[u8], chunk: usize) {
        for piece in bytes.chunks(chunk) {
            self.push(piece);
        }
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn silent_reads(&self) -> usize {
        self.state.lock().unwrap().silent_reads
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn short_writes(&self) {
        self.state.lock().unwrap().short_writes = true;
    }
}

impl ByteLink for ScriptedLink {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        match state.incoming.pop_front() {
            Some(Chunk::Bytes(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    state.incoming.push_front(Chunk::Bytes(chunk.split_off(n)));
                }
                Ok(n)
            }
            Some(Chunk::Silence(duration)) => {
                drop(state);
                std::thread::sleep(duration);
                Ok(0)
            }
            None => {
                state.silent_reads += 1;
                drop(state);
                std::thread::sleep(timeout);
                Ok(0)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        state.written.push(buf.to_vec());
        if state.short_writes {
            Ok(buf.len() / 2)
        } else {
            Ok(buf.len())
        }
    }
}

pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        number_of_retries: 2,
        read_timeout: Duration::from_millis(1),
        receive_timeout: Duration::from_millis(10),
        discovery_timeout: Duration::from_millis(30),
        ..Default::default()
    }
}

pub fn at_response(frame_id: u8, command: &[u8; 2], status: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![frame_id, command[0], command[1], status];
    payload.extend_from_slice(data);
    frame::encode(0x88, &payload).unwrap()
}

pub fn remote_at_response(
    frame_id: u8,
    serial_number: ExtendedAddress,
    network_address: ShortAddress,
    command: &[u8; 2],
    status: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut payload = vec![frame_id];
    payload.extend_from_slice(&serial_number.to_be_bytes());
    payload.extend_from_slice(&network_address.to_be_bytes());
    payload.extend_from_slice(command);
    payload.push(status);
    payload.extend_from_slice(data);
    frame::encode(0x97, &payload).unwrap()
}

pub fn node_record(
    network_address: ShortAddress,
    serial_number: ExtendedAddress,
    name: &str,
    parent_address: ShortAddress,
    device_type: u8,
) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&network_address.to_be_bytes());
    record.extend_from_slice(&serial_number.to_be_bytes());
    record.extend_from_slice(name.as_bytes());
    record.push(0);
    record.extend_from_slice(&parent_address.to_be_bytes());
    record.push(device_type);
    record.push(0x00);
    record.extend_from_slice(&[0xC1, 0x05, 0x10, 0x1E]);
    record
}

pub fn node_identification(record: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0x0013_A200_0000_0099u64.to_be_bytes());
    payload.extend_from_slice(&0x4321u16.to_be_bytes());
    payload.push(0x02);
    payload.extend_from_slice(record);
    frame::encode(0x95, &payload).unwrap()
}
