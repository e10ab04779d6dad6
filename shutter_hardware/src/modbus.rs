//! Minimal Modbus/TCP client: function 0x05 (write single coil) only.
//!
//! Frame layout (big endian):
//!
//! | transaction | protocol (0) | length | unit | fc | address | value |
//! |     u16     |     u16      |  u16   |  u8  | u8 |   u16   |  u16  |
//!
//! A successful response echoes the request. An exception response carries
//! `fc | 0x80` followed by a one-byte exception code.
use crate::error::{HwError, Result};
use shutter_traits::CoilWriter;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;
const MBAP_LEN: usize = 7;
/// Request/echo frame size for write single coil.
pub const FRAME_LEN: usize = 12;

/// Encode a write-single-coil request.
pub fn encode_write_single_coil(
    transaction: u16,
    unit: u8,
    address: u16,
    state: bool,
) -> [u8; FRAME_LEN] {
    let value = if state { COIL_ON } else { COIL_OFF };
    let mut f = [0u8; FRAME_LEN];
    f[0..2].copy_from_slice(&transaction.to_be_bytes());
    // f[2..4] protocol id stays 0
    f[4..6].copy_from_slice(&6u16.to_be_bytes());
    f[6] = unit;
    f[7] = FC_WRITE_SINGLE_COIL;
    f[8..10].copy_from_slice(&address.to_be_bytes());
    f[10..12].copy_from_slice(&value.to_be_bytes());
    f
}

/// Check a complete response frame against the request that produced it.
pub fn check_response(request: &[u8; FRAME_LEN], response: &[u8]) -> Result<()> {
    if response.len() < MBAP_LEN + 2 {
        return Err(HwError::Protocol(format!(
            "short response ({} bytes)",
            response.len()
        )));
    }
    if response[0..2] != request[0..2] {
        return Err(HwError::Protocol("transaction id mismatch".into()));
    }
    if response[2..4] != [0, 0] {
        return Err(HwError::Protocol("unexpected protocol id".into()));
    }
    let fc = response[7];
    if fc == FC_WRITE_SINGLE_COIL | 0x80 {
        return Err(HwError::Exception(response[8]));
    }
    if fc != FC_WRITE_SINGLE_COIL {
        return Err(HwError::Protocol(format!("unexpected function code {fc:#04x}")));
    }
    if response != request.as_slice() {
        return Err(HwError::Protocol("response does not echo request".into()));
    }
    Ok(())
}

/// Modbus/TCP coil writer for one hub.
///
/// The connection is opened lazily and dropped on any transport error; the
/// next write reconnects. Failed writes are not retried.
#[derive(Debug)]
pub struct ModbusTcpCoilWriter {
    hub: String,
    endpoint: String,
    timeout: Duration,
    stream: Option<TcpStream>,
    transaction: u16,
}

impl ModbusTcpCoilWriter {
    pub fn new(hub: impl Into<String>, host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            hub: hub.into(),
            endpoint: format!("{host}:{port}"),
            timeout,
            stream: None,
            transaction: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connect(&mut self) -> Result<&mut TcpStream> {
        if self.stream.is_none() {
            let addr = self
                .endpoint
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| HwError::Protocol(format!("cannot resolve {}", self.endpoint)))?;
            let stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(map_io)?;
            stream.set_read_timeout(Some(self.timeout))?;
            stream.set_write_timeout(Some(self.timeout))?;
            stream.set_nodelay(true)?;
            tracing::debug!(endpoint = %self.endpoint, "modbus connected");
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| HwError::Protocol("connection unavailable".into()))
    }

    fn transact(&mut self, request: &[u8; FRAME_LEN]) -> Result<()> {
        let stream = self.connect()?;
        stream.write_all(request).map_err(map_io)?;

        let mut header = [0u8; MBAP_LEN];
        stream.read_exact(&mut header).map_err(map_io)?;
        let len = usize::from(u16::from_be_bytes([header[4], header[5]]));
        // length counts the unit byte already read in the header
        if !(2..=253).contains(&len) {
            return Err(HwError::Protocol(format!("invalid length field {len}")));
        }
        let mut frame = Vec::with_capacity(MBAP_LEN + len - 1);
        frame.extend_from_slice(&header);
        frame.resize(MBAP_LEN + len - 1, 0);
        stream.read_exact(&mut frame[MBAP_LEN..]).map_err(map_io)?;
        check_response(request, &frame)
    }
}

fn map_io(e: std::io::Error) -> HwError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => HwError::Timeout,
        _ => HwError::Io(e),
    }
}

impl CoilWriter for ModbusTcpCoilWriter {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if hub != self.hub {
            return Err(Box::new(HwError::Protocol(format!(
                "writer for hub '{}' asked to write to hub '{hub}'",
                self.hub
            ))));
        }
        self.transaction = self.transaction.wrapping_add(1);
        let request = encode_write_single_coil(self.transaction, unit, address, state);
        match self.transact(&request) {
            Ok(()) => {
                tracing::debug!(hub, unit, address, state, "coil write");
                Ok(())
            }
            Err(e) => {
                // Exceptions leave the connection usable; anything else may have
                // desynchronized the stream.
                if !matches!(e, HwError::Exception(_)) {
                    self.stream = None;
                }
                tracing::warn!(hub, unit, address, state, error = %e, "coil write failed");
                Err(Box::new(e))
            }
        }
    }
}
