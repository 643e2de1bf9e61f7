//! HDLC frame delimiting over a byte stream.
//!
//! Serial ports and TCP sockets deliver bytes in arbitrary chunks.
//! [`StreamTransport`] buffers them and hands out one complete HDLC frame per
//! `recv`, as [`HdlcLink`](super::HdlcLink) expects.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::{trace, warn};

use super::Transport;
use crate::hdlc::{HDLC_FLAG, frame_length, is_frame_complete};

const READ_CHUNK: usize = 256;

/// A byte stream whose blocking reads can be bounded.
///
/// The default method ignores the timeout, for streams that have none.
pub trait ReadTimeout {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

impl ReadTimeout for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Frame-delimiting transport over any `Read + Write` stream.
///
/// [`recv_timeout`](Transport::recv_timeout) applies the link's response
/// timeout to the stream before reading. A timed out read surfaces as an
/// error and triggers the link's retransmission.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    pending: Vec<u8>,
    read_timeout: Option<Duration>,
}

impl<S: Read + Write + ReadTimeout> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, pending: Vec::new(), read_timeout: None }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Drops bytes that cannot start a frame and returns the length of the
    /// complete frame at the front of the buffer, if any.
    fn next_frame_len(&mut self) -> Option<usize> {
        loop {
            match self.pending.iter().position(|&b| b == HDLC_FLAG) {
                Some(0) => {}
                Some(start) => {
                    self.pending.drain(..start);
                }
                None => {
                    self.pending.clear();
                    return None;
                }
            }

            // Closing flag of the previous frame followed by an opening flag.
            if self.pending.get(1) == Some(&HDLC_FLAG) {
                self.pending.remove(0);
                continue;
            }

            if is_frame_complete(&self.pending) {
                return frame_length(&self.pending);
            }

            let corrupt = match frame_length(&self.pending) {
                Some(len) => self.pending.len() >= len,
                None => self.pending.len() >= 3,
            };
            if !corrupt {
                return None;
            }

            warn!("discarding unframed bytes");
            self.pending.remove(0);
        }
    }
}

impl<S: Read + Write + ReadTimeout> Transport for StreamTransport<S> {
    type Error = io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.stream.write_all(data)?;
        self.stream.flush()
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(len) = self.next_frame_len() {
                if len > buffer.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame of {len} bytes exceeds receive buffer"),
                    ));
                }
                buffer[..len].copy_from_slice(&self.pending[..len]);
                self.pending.drain(..len);
                return Ok(len);
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Ok(0);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    fn recv_timeout(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        if self.read_timeout != Some(timeout) {
            trace!("stream read timeout set to {timeout:?}");
            self.stream.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }
        self.recv(buffer)
    }
}
