//! Stateful HDLC link on top of a [`Transport`] (IEC 62056-46).
//!
//! The link owns the sequence counters and the connection state:
//!
//! ```text
//!          connect()            UA
//!   Idle ────────────▶ Connecting ────▶ Connected
//!    ▲                     │ error          │ disconnect()
//!    ├─────────────────────┘                ▼
//!    └──────────────────────────────── Disconnecting
//!                 UA or error
//! ```
//!
//! Every exchange is "send one frame, read one frame". When the transport
//! fails while a response is awaited, the last frame is sent again up to
//! [`HdlcParameters::max_retries`] times. Malformed frames are never retried.

use std::fmt::Debug;
use std::time::Duration;

use log::{debug, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LinkLayer, Transport};
use crate::hdlc::{
    AddressSize, Command, DEFAULT_MAX_INFO_LENGTH, Direction, HDLC_FLAG, HdlcError, HdlcFrame,
    MAX_FRAME_LENGTH,
};

/// Format identifier and group identifier of the SNRM/UA parameter block.
const PARAMETER_GROUP: [u8; 2] = [0x81, 0x80];
const PARAM_MAX_INFO_TX: u8 = 0x05;
const PARAM_MAX_INFO_RX: u8 = 0x06;

/// LLC header bytes counted in every I-frame information field.
const LLC_LEN: usize = 3;

/// Link configuration, fixed for the lifetime of a connection.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcParameters {
    pub client_address: u8,
    pub server_logical_address: u16,
    pub server_physical_address: u16,
    pub server_address_size: AddressSize,
    /// Proposed maximum information field length, client to server.
    pub max_info_tx: u16,
    /// Proposed maximum information field length, server to client.
    pub max_info_rx: u16,
    /// Retransmissions of the last frame when the transport fails.
    pub max_retries: u8,
    /// Passed to [`Transport::recv_timeout`] for every reply.
    pub response_timeout: Duration,
}

impl Default for HdlcParameters {
    fn default() -> Self {
        Self {
            client_address: 0x01,
            server_logical_address: 0x0001,
            server_physical_address: 0x3FFF,
            server_address_size: AddressSize::Four,
            max_info_tx: DEFAULT_MAX_INFO_LENGTH,
            max_info_rx: DEFAULT_MAX_INFO_LENGTH,
            max_retries: 1,
            response_timeout: Duration::from_secs(3),
        }
    }
}

/// Mutable state of one HDLC connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcSessionState {
    /// V(S): sequence number of the next I-frame sent.
    pub send_seq: u8,
    /// V(R): sequence number expected in the next I-frame received.
    pub recv_seq: u8,
    /// Negotiated maximum information field lengths.
    pub max_info_tx: u16,
    pub max_info_rx: u16,
    /// Last frame handed to the transport, for retransmission.
    pub last_frame: Vec<u8>,
}

impl HdlcSessionState {
    fn new(params: &HdlcParameters) -> Self {
        Self {
            send_seq: 0,
            recv_seq: 0,
            max_info_tx: params.max_info_tx,
            max_info_rx: params.max_info_rx,
            last_frame: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

/// Errors of the HDLC link session.
#[derive(Debug, Error)]
pub enum LinkError<E: Debug> {
    #[error("transport error: {0:?}")]
    Transport(E),
    #[error(transparent)]
    Frame(#[from] HdlcError),
    #[error("connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("frame rejected by server (FRMR)")]
    FrameRejected,
    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(Command),
    #[error("frame addressed to client {received}, expected {expected}")]
    UnexpectedAddress { expected: u8, received: u8 },
    #[error("information field of {len} bytes exceeds negotiated maximum of {max}")]
    InformationFieldTooLong { len: usize, max: u16 },
    #[error("HDLC link is not connected")]
    NotConnected,
    #[error("connection closed by peer")]
    ConnectionClosed,
}

/// HDLC client link.
#[derive(Debug)]
pub struct HdlcLink<T> {
    transport: T,
    params: HdlcParameters,
    session: HdlcSessionState,
    state: LinkState,
    rx_buffer: Vec<u8>,
}

impl<T: Transport> HdlcLink<T> {
    pub fn new(transport: T, params: HdlcParameters) -> Self {
        let session = HdlcSessionState::new(&params);
        Self {
            transport,
            params,
            session,
            state: LinkState::Idle,
            rx_buffer: vec![0; MAX_FRAME_LENGTH + 2],
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn session(&self) -> &HdlcSessionState {
        &self.session
    }

    pub fn parameters(&self) -> &HdlcParameters {
        &self.params
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends SNRM and waits for UA, negotiating the information field
    /// lengths. Resets both sequence counters.
    pub fn connect(&mut self) -> Result<(), LinkError<T::Error>> {
        self.state = LinkState::Connecting;
        self.session = HdlcSessionState::new(&self.params);

        match self.try_connect() {
            Ok(()) => {
                self.state = LinkState::Connected;
                debug!(
                    "HDLC connected (max info tx {}, rx {})",
                    self.session.max_info_tx, self.session.max_info_rx
                );
                Ok(())
            }
            Err(err) => {
                self.state = LinkState::Idle;
                debug!("HDLC connect failed: {err}");
                Err(err)
            }
        }
    }

    fn try_connect(&mut self) -> Result<(), LinkError<T::Error>> {
        let snrm = self.frame(Command::SNRM, self.snrm_parameters());
        let reply = self.exchange(&snrm)?;

        match reply.command {
            Command::UA => self.apply_ua_parameters(&reply.payload),
            Command::DM => {
                Err(LinkError::ConnectionRejected("server answered SNRM with DM".into()))
            }
            other => {
                Err(LinkError::ConnectionRejected(format!("server answered SNRM with {other:?}")))
            }
        }
    }

    /// Sends `payload` in one I-frame.
    ///
    /// APDUs that do not fit the negotiated information field fail here;
    /// segmentation is not supported.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), LinkError<T::Error>> {
        if self.state != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }

        let len = payload.len() + LLC_LEN;
        if len > self.session.max_info_tx as usize {
            return Err(LinkError::InformationFieldTooLong { len, max: self.session.max_info_tx });
        }

        let frame = self.frame(Command::I, payload.to_vec());
        self.transmit(&frame)?;
        self.session.send_seq = (self.session.send_seq + 1) % 8;
        Ok(())
    }

    /// Reads one I-frame and returns its information field without LLC.
    pub fn read(&mut self) -> Result<Vec<u8>, LinkError<T::Error>> {
        if self.state != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }

        let frame = self.receive()?;
        if frame.command != Command::I {
            return Err(LinkError::UnexpectedFrame(frame.command));
        }

        if frame.send_seq != self.session.recv_seq {
            warn!("HDLC: received N(S)={}, expected {}", frame.send_seq, self.session.recv_seq);
        }
        if frame.recv_seq != self.session.send_seq {
            warn!(
                "HDLC: server acknowledged N(R)={}, expected {}",
                frame.recv_seq, self.session.send_seq
            );
        }
        if frame.payload.len() + LLC_LEN > self.session.max_info_rx as usize {
            warn!(
                "HDLC: information field of {} bytes exceeds negotiated maximum of {}",
                frame.payload.len() + LLC_LEN,
                self.session.max_info_rx
            );
        }
        self.session.recv_seq = (frame.send_seq + 1) % 8;

        Ok(frame.payload)
    }

    /// Sends DISC and requires UA. The link is idle afterwards either way.
    pub fn disconnect(&mut self) -> Result<(), LinkError<T::Error>> {
        self.state = LinkState::Disconnecting;
        let disc = self.frame(Command::DISC, Vec::new());

        let result = self.exchange(&disc).and_then(|reply| match reply.command {
            Command::UA => Ok(()),
            other => Err(LinkError::UnexpectedFrame(other)),
        });

        self.state = LinkState::Idle;
        debug!("HDLC disconnected");
        result
    }

    fn frame(&self, command: Command, payload: Vec<u8>) -> HdlcFrame {
        HdlcFrame {
            command,
            direction: Direction::Command,
            client_address: self.params.client_address,
            logical_address: self.params.server_logical_address,
            physical_address: self.params.server_physical_address,
            address_size: self.params.server_address_size,
            send_seq: self.session.send_seq,
            recv_seq: self.session.recv_seq,
            payload,
        }
    }

    /// SNRM information field. Only lengths that differ from the default are
    /// proposed; no field at all when both are default.
    fn snrm_parameters(&self) -> Vec<u8> {
        let mut group = Vec::new();
        let lengths = [
            (PARAM_MAX_INFO_TX, self.params.max_info_tx),
            (PARAM_MAX_INFO_RX, self.params.max_info_rx),
        ];
        for (id, value) in lengths {
            if value == DEFAULT_MAX_INFO_LENGTH {
                continue;
            }
            group.push(id);
            match u8::try_from(value) {
                Ok(byte) => group.extend_from_slice(&[1, byte]),
                Err(_) => {
                    group.push(2);
                    group.extend_from_slice(&value.to_be_bytes());
                }
            }
        }

        if group.is_empty() {
            return group;
        }
        let mut info = PARAMETER_GROUP.to_vec();
        info.push(group.len() as u8);
        info.extend_from_slice(&group);
        info
    }

    /// Applies the lengths offered in UA; each becomes the smaller of the
    /// proposed and the offered value. An empty UA keeps the proposal.
    fn apply_ua_parameters(&mut self, info: &[u8]) -> Result<(), LinkError<T::Error>> {
        if info.is_empty() {
            return Ok(());
        }

        let params = parse_parameter_group(info)
            .ok_or_else(|| LinkError::ConnectionRejected("malformed UA parameter block".into()))?;

        for (id, value) in params {
            let value = u16::try_from(value).unwrap_or(u16::MAX);
            match id {
                PARAM_MAX_INFO_TX => self.session.max_info_tx = self.params.max_info_tx.min(value),
                PARAM_MAX_INFO_RX => self.session.max_info_rx = self.params.max_info_rx.min(value),
                _ => trace!("HDLC: ignoring UA parameter {id:#04x} = {value}"),
            }
        }
        Ok(())
    }

    fn exchange(&mut self, frame: &HdlcFrame) -> Result<HdlcFrame, LinkError<T::Error>> {
        self.transmit(frame)?;
        self.receive()
    }

    fn transmit(&mut self, frame: &HdlcFrame) -> Result<(), LinkError<T::Error>> {
        self.session.last_frame = frame.serialize()?;
        trace!(
            "HDLC tx {:?} N(S)={} N(R)={} ({} bytes)",
            frame.command,
            frame.send_seq,
            frame.recv_seq,
            frame.payload.len()
        );
        self.transport.send(&self.session.last_frame).map_err(LinkError::Transport)
    }

    fn receive(&mut self) -> Result<HdlcFrame, LinkError<T::Error>> {
        let mut attempt = 0;
        let len = loop {
            match self.transport.recv_timeout(&mut self.rx_buffer, self.params.response_timeout) {
                Ok(0) => return Err(LinkError::ConnectionClosed),
                Ok(n) => break n.min(self.rx_buffer.len()),
                Err(err) if attempt < self.params.max_retries => {
                    attempt += 1;
                    warn!(
                        "HDLC: no response ({err:?}), retransmitting last frame ({attempt}/{})",
                        self.params.max_retries
                    );
                    self.transport.send(&self.session.last_frame).map_err(LinkError::Transport)?;
                }
                Err(err) => return Err(LinkError::Transport(err)),
            }
        };

        self.parse_reply(&self.rx_buffer[..len])
    }

    fn parse_reply(&self, raw: &[u8]) -> Result<HdlcFrame, LinkError<T::Error>> {
        let start = raw
            .iter()
            .position(|&b| b == HDLC_FLAG)
            .ok_or(HdlcError::InvalidFraming("missing opening flag"))?;
        let frame = HdlcFrame::parse(&raw[start..], Direction::Response)?;

        trace!(
            "HDLC rx {:?} N(S)={} N(R)={} ({} bytes)",
            frame.command,
            frame.send_seq,
            frame.recv_seq,
            frame.payload.len()
        );

        if frame.client_address != self.params.client_address {
            return Err(LinkError::UnexpectedAddress {
                expected: self.params.client_address,
                received: frame.client_address,
            });
        }
        if frame.logical_address != self.params.server_logical_address
            || frame.physical_address != self.params.server_physical_address
        {
            warn!(
                "HDLC: reply from server {}/{}, expected {}/{}",
                frame.logical_address,
                frame.physical_address,
                self.params.server_logical_address,
                self.params.server_physical_address
            );
        }
        if frame.command == Command::FRMR {
            return Err(LinkError::FrameRejected);
        }

        Ok(frame)
    }
}

/// Parses `81 80 len { id len value }*` into `(id, value)` pairs.
fn parse_parameter_group(info: &[u8]) -> Option<Vec<(u8, u32)>> {
    let [0x81, 0x80, len, rest @ ..] = info else {
        return None;
    };
    let mut rest = rest.get(..*len as usize)?;

    let mut params = Vec::new();
    while let [id, len, tail @ ..] = rest {
        let len = *len as usize;
        if len > 4 || tail.len() < len {
            return None;
        }
        let value = tail[..len].iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        params.push((*id, value));
        rest = &tail[len..];
    }

    rest.is_empty().then_some(params)
}

impl<T: Transport> LinkLayer for HdlcLink<T> {
    type Error = LinkError<T::Error>;

    fn connect(&mut self) -> Result<(), Self::Error> {
        HdlcLink::connect(self)
    }

    fn send(&mut self, apdu: &[u8]) -> Result<(), Self::Error> {
        HdlcLink::send(self, apdu)
    }

    fn read(&mut self) -> Result<Vec<u8>, Self::Error> {
        HdlcLink::read(self)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        HdlcLink::disconnect(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Timeout;

    #[derive(Debug, Default)]
    struct MockTransport {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Result<Vec<u8>, Timeout>>,
    }

    impl MockTransport {
        fn push_reply(&mut self, frame: Vec<u8>) {
            self.replies.push_back(Ok(frame));
        }

        fn push_timeout(&mut self) {
            self.replies.push_back(Err(Timeout));
        }
    }

    impl Transport for MockTransport {
        type Error = Timeout;

        fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
            let reply = self.replies.pop_front().unwrap_or(Err(Timeout))?;
            buffer[..reply.len()].copy_from_slice(&reply);
            Ok(reply.len())
        }
    }

    fn server_frame(command: Command, send_seq: u8, recv_seq: u8, payload: &[u8]) -> Vec<u8> {
        HdlcFrame {
            command,
            direction: Direction::Response,
            client_address: 1,
            logical_address: 1,
            physical_address: 0x3FFF,
            address_size: AddressSize::Four,
            send_seq,
            recv_seq,
            payload: payload.to_vec(),
        }
        .serialize()
        .unwrap()
    }

    fn link_with(replies: impl IntoIterator<Item = Vec<u8>>) -> HdlcLink<MockTransport> {
        let mut transport = MockTransport::default();
        replies.into_iter().for_each(|r| transport.push_reply(r));
        HdlcLink::new(transport, HdlcParameters::default())
    }

    fn connected_link(replies: impl IntoIterator<Item = Vec<u8>>) -> HdlcLink<MockTransport> {
        let mut link = link_with([server_frame(Command::UA, 0, 0, &[])]);
        replies.into_iter().for_each(|r| link.transport_mut().push_reply(r));
        link.connect().unwrap();
        link
    }

    fn sent_frame(link: &HdlcLink<MockTransport>, index: usize) -> HdlcFrame {
        HdlcFrame::parse(&link.transport().sent[index], Direction::Command).unwrap()
    }

    // ========================================================================
    // Connect
    // ========================================================================

    #[test]
    fn test_connect_sends_snrm() {
        let mut link = link_with([server_frame(Command::UA, 0, 0, &[])]);
        link.connect().unwrap();

        let snrm = hex!("7E A0 0A 00 02 FE FF 03 93 5E 92 7E");
        assert_eq!(link.transport().sent, vec![snrm.to_vec()]);
        assert_eq!(link.state(), LinkState::Connected);
        assert_eq!(link.session().max_info_tx, 128);
        assert_eq!(link.session().max_info_rx, 128);
    }

    #[test]
    fn test_connect_negotiates_lengths() {
        let parameters = hex!("81 80 0D 05 01 80 06 02 01 00 07 04 00 00 00 01");
        let ua = server_frame(Command::UA, 0, 0, &parameters);
        let mut transport = MockTransport::default();
        transport.push_reply(ua);
        let params = HdlcParameters { max_info_tx: 512, max_info_rx: 64, ..Default::default() };
        let mut link = HdlcLink::new(transport, params);

        link.connect().unwrap();

        assert_eq!(sent_frame(&link, 0).payload, hex!("81 80 07 05 02 02 00 06 01 40"));
        assert_eq!(link.session().max_info_tx, 128);
        assert_eq!(link.session().max_info_rx, 64);
    }

    #[test]
    fn test_connect_ua_offers_smaller_lengths() {
        let ua = server_frame(Command::UA, 0, 0, &hex!("81 80 06 05 01 40 06 01 20"));
        let mut link = link_with([ua]);
        link.connect().unwrap();

        assert_eq!(link.session().max_info_tx, 0x40);
        assert_eq!(link.session().max_info_rx, 0x20);
    }

    #[test]
    fn test_connect_rejected_with_dm() {
        let mut link = link_with([server_frame(Command::DM, 0, 0, &[])]);
        assert!(matches!(link.connect(), Err(LinkError::ConnectionRejected(_))));
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_connect_malformed_ua_parameters() {
        let mut link = link_with([server_frame(Command::UA, 0, 0, &hex!("81 80 05 05 03 01"))]);
        assert!(matches!(link.connect(), Err(LinkError::ConnectionRejected(_))));
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_connect_resets_counters() {
        let mut link = connected_link([server_frame(Command::I, 0, 1, &[0xAA])]);
        link.send(&[0x01]).unwrap();
        link.read().unwrap();
        assert_eq!((link.session().send_seq, link.session().recv_seq), (1, 1));

        link.transport_mut().push_reply(server_frame(Command::UA, 0, 0, &[]));
        link.connect().unwrap();
        assert_eq!((link.session().send_seq, link.session().recv_seq), (0, 0));
    }

    // ========================================================================
    // Data exchange
    // ========================================================================

    #[test]
    fn test_send_and_read_sequence_numbers() {
        let mut link = connected_link([
            server_frame(Command::I, 0, 1, &hex!("C4 01 C1 00 11 01")),
            server_frame(Command::I, 1, 2, &hex!("C4 01 C2 00 11 02")),
        ]);

        link.send(&hex!("C0 01 C1")).unwrap();
        assert_eq!(link.transport().sent[1][8], 0x10);
        assert_eq!(link.read().unwrap(), hex!("C4 01 C1 00 11 01"));

        link.send(&hex!("C0 01 C2")).unwrap();
        assert_eq!(link.transport().sent[2][8], 0x32);
        assert_eq!(link.read().unwrap(), hex!("C4 01 C2 00 11 02"));

        let frame = sent_frame(&link, 2);
        assert_eq!(frame.payload, hex!("C0 01 C2"));
        assert_eq!(link.session().send_seq, 2);
        assert_eq!(link.session().recv_seq, 2);
    }

    #[test]
    fn test_sequence_numbers_wrap() {
        let replies: Vec<_> =
            (0..9u8).map(|i| server_frame(Command::I, i % 8, (i + 1) % 8, &[i])).collect();
        let mut link = connected_link(replies);

        for i in 0..9u8 {
            link.send(&[i]).unwrap();
            assert_eq!(link.read().unwrap(), [i]);
        }
        assert_eq!(link.session().send_seq, 1);
        assert_eq!(link.session().recv_seq, 1);
    }

    #[test]
    fn test_send_not_connected() {
        let mut link = link_with(Vec::new());
        assert!(matches!(link.send(&[0x01]), Err(LinkError::NotConnected)));
        assert!(matches!(link.read(), Err(LinkError::NotConnected)));
        assert!(link.transport().sent.is_empty());
    }

    #[test]
    fn test_send_information_field_too_long() {
        let mut link = connected_link(Vec::new());
        let result = link.send(&[0u8; 126]);
        assert!(matches!(result, Err(LinkError::InformationFieldTooLong { len: 129, max: 128 })));
        assert_eq!(link.transport().sent.len(), 1);
        assert_eq!(link.session().send_seq, 0);

        link.send(&[0u8; 125]).unwrap();
    }

    #[test]
    fn test_read_skips_leading_garbage() {
        let mut reply = vec![0x00, 0xFF];
        reply.extend(server_frame(Command::I, 0, 1, &[0x42]));
        let mut link = connected_link([reply]);

        link.send(&[0x01]).unwrap();
        assert_eq!(link.read().unwrap(), [0x42]);
    }

    #[test]
    fn test_read_unexpected_frame() {
        let mut link = connected_link([server_frame(Command::RR, 0, 1, &[])]);
        link.send(&[0x01]).unwrap();
        assert!(matches!(link.read(), Err(LinkError::UnexpectedFrame(Command::RR))));
    }

    #[test]
    fn test_read_frame_rejected() {
        let mut link = connected_link([server_frame(Command::FRMR, 0, 0, &[])]);
        link.send(&[0x01]).unwrap();
        assert!(matches!(link.read(), Err(LinkError::FrameRejected)));
    }

    #[test]
    fn test_read_wrong_client_address() {
        let raw = server_frame(Command::I, 0, 1, &[0x01]);
        let mut frame = HdlcFrame::parse(&raw, Direction::Response).unwrap();
        frame.client_address = 0x10;
        let mut link = connected_link([frame.serialize().unwrap()]);

        link.send(&[0x01]).unwrap();
        assert!(matches!(
            link.read(),
            Err(LinkError::UnexpectedAddress { expected: 1, received: 0x10 })
        ));
    }

    #[test]
    fn test_read_connection_closed() {
        let mut link = connected_link([Vec::new()]);
        link.send(&[0x01]).unwrap();
        assert!(matches!(link.read(), Err(LinkError::ConnectionClosed)));
    }

    // ========================================================================
    // Retransmission
    // ========================================================================

    #[test]
    fn test_retransmits_after_timeout() {
        let mut transport = MockTransport::default();
        transport.push_timeout();
        transport.push_reply(server_frame(Command::UA, 0, 0, &[]));
        let mut link = HdlcLink::new(transport, HdlcParameters::default());

        link.connect().unwrap();

        let sent = &link.transport().sent;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[test]
    fn test_retransmitted_i_frame_keeps_counters() {
        let mut link = connected_link(Vec::new());
        link.transport_mut().push_timeout();
        link.transport_mut().push_reply(server_frame(Command::I, 0, 1, &[0x42]));

        link.send(&[0x01]).unwrap();
        assert_eq!(link.read().unwrap(), [0x42]);

        let sent = &link.transport().sent;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], sent[2]);
        assert_eq!(sent[2][8], 0x10);
        assert_eq!((link.session().send_seq, link.session().recv_seq), (1, 1));
    }

    #[test]
    fn test_retries_exhausted() {
        let mut transport = MockTransport::default();
        transport.push_timeout();
        transport.push_timeout();
        let mut link = HdlcLink::new(transport, HdlcParameters::default());

        assert!(matches!(link.connect(), Err(LinkError::Transport(Timeout))));
        assert_eq!(link.transport().sent.len(), 2);
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_malformed_frame_not_retried() {
        let mut ua = server_frame(Command::UA, 0, 0, &[]);
        let fcs_pos = ua.len() - 3;
        ua[fcs_pos] ^= 0x01;
        let mut link = link_with([ua, server_frame(Command::UA, 0, 0, &[])]);

        assert!(matches!(
            link.connect(),
            Err(LinkError::Frame(HdlcError::ChecksumMismatch { .. }))
        ));
        assert_eq!(link.transport().sent.len(), 1);
    }

    // ========================================================================
    // Disconnect
    // ========================================================================

    #[test]
    fn test_disconnect() {
        let mut link = connected_link([server_frame(Command::UA, 0, 0, &[])]);
        link.disconnect().unwrap();

        assert_eq!(sent_frame(&link, 1).command, Command::DISC);
        assert_eq!(link.transport().sent[1][8], 0x53);
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_disconnect_requires_ua() {
        let mut link = connected_link([server_frame(Command::DM, 0, 0, &[])]);
        assert!(matches!(link.disconnect(), Err(LinkError::UnexpectedFrame(Command::DM))));
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_parse_parameter_group() {
        assert_eq!(
            parse_parameter_group(&hex!("81 80 08 05 02 01 00 06 02 00 80")),
            Some(vec![(5, 0x100), (6, 0x80)])
        );
        assert_eq!(parse_parameter_group(&hex!("81 80 00")), Some(vec![]));
        assert_eq!(parse_parameter_group(&hex!("81 81 00")), None);
        assert_eq!(parse_parameter_group(&hex!("81 80 04 05 02 01")), None);
        assert_eq!(parse_parameter_group(&hex!("81 80 03 05 05 01")), None);
    }
}
