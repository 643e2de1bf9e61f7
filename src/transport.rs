use std::fmt::Debug;
use std::time::Duration;

pub mod hdlc;
pub mod stream;
pub mod trace;

pub use hdlc::{HdlcLink, HdlcParameters, HdlcSessionState, LinkError, LinkState};
pub use stream::{ReadTimeout, StreamTransport};
pub use trace::TracingTransport;

/// Trait representing the byte transport below the link layer (serial port,
/// TCP socket, optical head, ...).
///
/// For HDLC every `recv` must return exactly one complete frame; the
/// transport decides where a frame ends, e.g. with
/// [`is_frame_complete`](crate::hdlc::is_frame_complete).
pub trait Transport {
    /// The error type returned by transport operations.
    type Error: Debug;

    /// Sends data to the remote device.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives one frame into `buffer` and returns its length.
    ///
    /// `Ok(0)` means the peer closed the connection.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Like [`recv`](Transport::recv) but gives up with an error after `timeout`.
    ///
    /// Default implementation calls `recv` (no timeout support).
    fn recv_timeout(
        &mut self,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, Self::Error> {
        self.recv(buffer)
    }
}

/// A link layer carrying COSEM APDUs: HDLC here, a TCP wrapper elsewhere.
///
/// The COSEM client only ever sees whole APDUs through this trait.
pub trait LinkLayer {
    type Error: std::error::Error;

    /// Opens the link.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Sends one APDU.
    fn send(&mut self, apdu: &[u8]) -> Result<(), Self::Error>;

    /// Reads one APDU.
    fn read(&mut self) -> Result<Vec<u8>, Self::Error>;

    /// Closes the link.
    fn disconnect(&mut self) -> Result<(), Self::Error>;
}
