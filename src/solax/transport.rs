use crate::prelude::*;

use crate::solax::frame::FunctionCode;

use {
    async_trait::async_trait,
    std::collections::VecDeque,
    std::time::Duration,
    tokio::io::{AsyncReadExt, AsyncWriteExt},
    tokio_serial::{SerialPortBuilderExt, SerialStream},
};

/// Byte-level link to the inverter bus.
///
/// `receive` must not block for longer than the configured read timeout and
/// returns `Ok(0)` when nothing arrived. Any `Err` from either method is
/// treated as fatal by the poll loop.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;
}

// {{{ SerialTransport
pub struct SerialTransport {
    device: String,
    stream: SerialStream,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Opens `device` as 8N1 without flow control.
    pub fn open(device: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let stream = tokio_serial::new(device, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| file_error_with_source!(e, "cannot open serial device {}", device))?;

        info!("opened {} at {} baud", device, baud_rate);

        Ok(Self {
            device: device.to_string(),
            stream,
            read_timeout,
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("TX{}", Utils::hex_dump(bytes));

        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| file_error_with_source!(e, "write to {} failed", self.device))?;
        self.stream
            .flush()
            .await
            .map_err(|e| file_error_with_source!(e, "flush of {} failed", self.device))?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        // a zero timeout still polls the read once, which picks up anything
        // the driver buffered since the last cycle
        let len = match tokio::time::timeout(self.read_timeout, self.stream.read(buf)).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                return Err(file_error_with_source!(e, "read from {} failed", self.device));
            }
            Err(_elapsed) => 0,
        };

        trace!("RX{}", Utils::hex_dump(&buf[..len]));
        Ok(len)
    }
} // }}}

// {{{ SimulatedInverter
const SIM_DISCOVER_REPLY: [u8; 25] = [
    0xAA, 0x55, 0x00, 0xFF, 0x01, 0x00, 0x10, 0x80, 0x0E, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
    0x37, 0x37, 0x36, 0x35, 0x34, 0x33, 0x32, 0x31, 0x05, 0x75,
];

const SIM_ADDRESS_ACK: [u8; 12] = [
    0xAA, 0x55, 0x00, 0x0A, 0x00, 0x00, 0x10, 0x81, 0x01, 0x06, 0x01, 0xA1,
];

const SIM_LIVE_HEADER: [u8; 9] = [0xAA, 0x55, 0x00, 0x0A, 0x01, 0x00, 0x11, 0x82, 0x32];

const SIM_LIVE_PAYLOADS: [[u8; 32]; 2] = [
    [
        0x00, 0x0B, 0x00, 0x01, 0x06, 0xDD, 0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x15,
        0x09, 0x21, 0x13, 0x87, 0x01, 0xE7, 0xFF, 0xFF, 0x00, 0x00, 0x12, 0xD3, 0x00, 0x00,
        0x0A, 0x0F, 0x00, 0x02,
    ],
    [
        0x00, 0x0B, 0x00, 0x01, 0x06, 0xCB, 0x00, 0x00, 0x00, 0x1E, 0x00, 0x00, 0x00, 0x14,
        0x09, 0x22, 0x13, 0x89, 0x01, 0xD7, 0xFF, 0xFF, 0x00, 0x00, 0x12, 0xD3, 0x00, 0x00,
        0x0A, 0x0F, 0x00, 0x02,
    ],
];
const SIM_LIVE_CHECKSUMS: [[u8; 2]; 2] = [[0x07, 0x9C], [0x07, 0x7B]];

/// Answers requests with canned responses captured from a real inverter
/// instead of talking to hardware. Each request queues the matching reply
/// for the next read; live data alternates between two captured frames.
/// Reads with nothing queued return no data, as does anything after an
/// unrecognised request.
#[derive(Default)]
pub struct SimulatedInverter {
    pending: Option<Vec<u8>>,
    live_frames_sent: usize,
}

impl SimulatedInverter {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_frame(index: usize) -> Vec<u8> {
        let mut r = SIM_LIVE_HEADER.to_vec();
        r.extend_from_slice(&SIM_LIVE_PAYLOADS[index]);
        r.resize(SIM_LIVE_HEADER.len() + solax::live_data::PAYLOAD_LENGTH, 0);
        r.extend_from_slice(&SIM_LIVE_CHECKSUMS[index]);
        r
    }

    fn reply_to(&mut self, request: &Frame) -> Option<Vec<u8>> {
        match request.function()? {
            FunctionCode::Discover => Some(SIM_DISCOVER_REPLY.to_vec()),
            FunctionCode::AssignAddress => Some(SIM_ADDRESS_ACK.to_vec()),
            FunctionCode::QueryLiveData => {
                let r = Self::live_frame(self.live_frames_sent % SIM_LIVE_PAYLOADS.len());
                self.live_frames_sent += 1;
                Some(r)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Transport for SimulatedInverter {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("TX (simulated){}", Utils::hex_dump(bytes));

        self.pending = match Frame::decode(bytes) {
            Ok(request) => self.reply_to(&request),
            Err(e) => {
                warn!("simulated inverter ignoring request: {}", e);
                None
            }
        };

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let response = self.pending.take().unwrap_or_default();
        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);

        trace!("RX (simulated){}", Utils::hex_dump(&buf[..len]));
        Ok(len)
    }
} // }}}

// {{{ MemoryTransport
/// Scripted transport. Each `receive` pops the next queued reply (an empty
/// queue reads as silence); every sent request is recorded.
#[derive(Default)]
pub struct MemoryTransport {
    replies: VecDeque<Result<Vec<u8>, String>>,
    pub sent: Vec<Vec<u8>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&mut self, bytes: &[u8]) -> &mut Self {
        self.replies.push_back(Ok(bytes.to_vec()));
        self
    }

    pub fn push_silence(&mut self) -> &mut Self {
        self.replies.push_back(Ok(vec![]));
        self
    }

    /// Queues a link failure, e.g. the device being unplugged.
    pub fn push_failure(&mut self, reason: &str) -> &mut Self {
        self.replies.push_back(Err(reason.to_string()));
        self
    }

    pub fn pending(&self) -> usize {
        self.replies.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.replies.pop_front() {
            None => Ok(0),
            Some(Err(reason)) => bail!("{}", reason),
            Some(Ok(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
        }
    }
} // }}}
