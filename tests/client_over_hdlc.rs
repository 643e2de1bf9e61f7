//! End-to-end tests: `CosemClient` over `HdlcLink` against a simulated meter.
//!
//! The meter parses every frame the client writes and answers the way a
//! real HDLC server would, keeping its own V(S)/V(R).

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use dlms_cosem_client::association::{AareApdu, Conformance, InitiateResponse};
use dlms_cosem_client::hdlc::{AddressSize, Command, Direction, HdlcFrame};
use dlms_cosem_client::transport::LinkState;
use dlms_cosem_client::{
    AssociationState, CosemAttributeDescriptor, CosemClient, CosemSettings, Data, DataAccessResult,
    GetDataResult, HdlcLink, HdlcParameters, ObisCode, TracingTransport, Transport, class_id,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Default)]
struct SimulatedMeter {
    send_seq: u8,
    outbox: VecDeque<Vec<u8>>,
    received: Vec<HdlcFrame>,
    /// Answer GET requests with this instead of the energy register.
    get_override: Option<GetDataResult>,
}

impl SimulatedMeter {
    fn reply(&mut self, command: Command, recv_seq: u8, payload: Vec<u8>) {
        let frame = HdlcFrame {
            command,
            direction: Direction::Response,
            client_address: 1,
            logical_address: 1,
            physical_address: 0x3FFF,
            address_size: AddressSize::Four,
            send_seq: self.send_seq,
            recv_seq,
            payload,
        };
        if command == Command::I {
            self.send_seq = (self.send_seq + 1) % 8;
        }
        self.outbox.push_back(frame.serialize().unwrap());
    }

    fn answer(&mut self, apdu: &[u8]) -> Vec<u8> {
        match apdu[0] {
            0x60 => AareApdu::accepted(InitiateResponse {
                negotiated_quality_of_service: None,
                negotiated_dlms_version_number: 6,
                negotiated_conformance: Conformance::GET | Conformance::SET | Conformance::ACTION,
                server_max_receive_pdu_size: 0x01F4,
                vaa_name: 0x0007,
            })
            .encode(),
            0xC0 => {
                let mut out = vec![0xC4, 0x01, apdu[2]];
                match &self.get_override {
                    Some(result) => result.encode_into(&mut out),
                    None => out.extend_from_slice(&[0x00, 0x06, 0x00, 0x00, 0x30, 0x39]),
                }
                out
            }
            0xC1 => vec![0xC5, 0x01, apdu[2], 0x00],
            0xC3 => vec![0xC7, 0x01, apdu[2], 0x00, 0x00],
            other => panic!("meter received unexpected APDU {other:#04x}"),
        }
    }
}

#[derive(Clone, Default)]
struct MeterHandle(Arc<Mutex<SimulatedMeter>>);

impl Transport for MeterHandle {
    type Error = io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut meter = self.0.lock().unwrap();
        let frame = HdlcFrame::parse(data, Direction::Command)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        match frame.command {
            Command::SNRM => {
                meter.send_seq = 0;
                meter.reply(Command::UA, 0, Vec::new());
            }
            Command::I => {
                let response = meter.answer(&frame.payload);
                meter.reply(Command::I, (frame.send_seq + 1) % 8, response);
            }
            Command::DISC => meter.reply(Command::UA, 0, Vec::new()),
            other => panic!("meter received unexpected frame {other:?}"),
        }
        meter.received.push(frame);
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let mut meter = self.0.lock().unwrap();
        let frame = meter
            .outbox
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "meter has nothing to say"))?;
        buffer[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}

fn client(meter: &MeterHandle) -> CosemClient<HdlcLink<MeterHandle>, ChaCha8Rng> {
    let link = HdlcLink::new(meter.clone(), HdlcParameters::default());
    CosemClient::with_rng(link, CosemSettings::default(), ChaCha8Rng::seed_from_u64(7))
}

fn energy_register() -> CosemAttributeDescriptor {
    CosemAttributeDescriptor::new(class_id::REGISTER, ObisCode::new(1, 0, 1, 8, 0, 255), 2)
}

/// A full session: SNRM/UA, AARQ/AARE, one GET, DISC/UA.
#[test]
fn test_association_get_and_release() {
    let meter = MeterHandle::default();
    let mut client = client(&meter);

    client.connect().unwrap();
    assert_eq!(client.state(), AssociationState::Connected);
    assert!(client.is_associated());
    assert_eq!(client.link().state(), LinkState::Connected);

    let negotiated = client.negotiated().unwrap();
    assert_eq!(negotiated.server_max_receive_pdu_size, 0x01F4);
    assert!(negotiated.negotiated_conformance.contains(Conformance::GET));

    let value = client.get_as::<u32>(energy_register()).unwrap();
    assert_eq!(value, Ok(12345));

    client.disconnect().unwrap();
    assert_eq!(client.state(), AssociationState::Disconnected);
    assert_eq!(client.link().state(), LinkState::Idle);

    let meter = meter.0.lock().unwrap();
    let received = &meter.received;
    let commands: Vec<Command> = received.iter().map(|frame| frame.command).collect();
    assert_eq!(commands, [Command::SNRM, Command::I, Command::I, Command::DISC]);

    // V(S) advances per I-frame, V(R) acknowledges the meter's last one.
    assert_eq!((received[1].send_seq, received[1].recv_seq), (0, 0));
    assert_eq!((received[2].send_seq, received[2].recv_seq), (1, 1));
    assert_eq!(received[1].payload[0], 0x60);
    assert_eq!(received[2].payload[..3], [0xC0, 0x01, 0xC1]);
}

/// SET and ACTION share the invoke-id counter with GET.
#[test]
fn test_set_and_action_round_trip() {
    let meter = MeterHandle::default();
    let mut client = client(&meter);
    client.connect().unwrap();

    let clock =
        CosemAttributeDescriptor::new(class_id::CLOCK, ObisCode::new(0, 0, 1, 0, 0, 255), 2);
    let set = client.set(clock, Data::OctetString(vec![0x07, 0xEA, 0x0A, 0x13])).unwrap();
    assert_eq!(set.result, DataAccessResult::Success);
    assert_eq!(set.invoke_id.invoke_id(), 1);

    let reset = CosemAttributeDescriptor { index: 1, ..energy_register() };
    let action = client.action(reset, Some(Data::Integer(0))).unwrap();
    assert!(action.result.is_success());
    assert_eq!(action.invoke_id.invoke_id(), 2);
    assert!(action.return_data().is_none());

    let meter = meter.0.lock().unwrap();
    let received = &meter.received;
    assert_eq!(received[2].payload[..3], [0xC1, 0x01, 0xC1]);
    assert_eq!(received[3].payload[..3], [0xC3, 0x01, 0xC2]);
    assert_eq!(received[3].send_seq, 2);
}

/// A refused attribute is a successful exchange carrying the refusal.
#[test]
fn test_access_error_is_returned_as_value() {
    let meter = MeterHandle::default();
    let denied = GetDataResult::DataAccessError(DataAccessResult::ReadWriteDenied);
    meter.0.lock().unwrap().get_override = Some(denied);
    let mut client = client(&meter);
    client.connect().unwrap();

    let response = client.get(energy_register()).unwrap();
    assert_eq!(response.result.access_result(), DataAccessResult::ReadWriteDenied);
    assert_eq!(
        client.get_as::<u32>(energy_register()).unwrap(),
        Err(DataAccessResult::ReadWriteDenied)
    );
}

/// Tracing sees every raw frame in both directions.
#[test]
fn test_tracing_transport_observes_frames() {
    let meter = MeterHandle::default();
    let tx = Arc::new(Mutex::new(Vec::new()));
    let rx = Arc::new(Mutex::new(0usize));

    let transport = {
        let tx = Arc::clone(&tx);
        let rx = Arc::clone(&rx);
        TracingTransport::new(meter.clone())
            .with_tx_listener(move |frame| tx.lock().unwrap().push(frame.to_vec()))
            .with_rx_listener(move |_| *rx.lock().unwrap() += 1)
    };
    let link = HdlcLink::new(transport, HdlcParameters::default());
    let mut client =
        CosemClient::with_rng(link, CosemSettings::default(), ChaCha8Rng::seed_from_u64(7));

    client.connect().unwrap();
    client.get(energy_register()).unwrap();

    let tx = tx.lock().unwrap();
    assert_eq!(tx.len(), 3);
    assert_eq!(*rx.lock().unwrap(), 3);
    assert!(tx.iter().all(|frame| frame[0] == 0x7E && frame[frame.len() - 1] == 0x7E));
}
