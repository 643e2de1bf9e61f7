//! A DLMS/COSEM client.
//!
//! The crate is layered bottom-up:
//!
//! - [`data`]: the DLMS common-data TLV codec.
//! - [`hdlc`]: pure HDLC frame codec (addresses, control byte, HCS/FCS).
//! - [`transport`]: the byte [`Transport`] seam, the stateful [`HdlcLink`]
//!   session and helpers for streams and tracing.
//! - [`get`], [`set`], [`action`] and [`association`]: xDLMS/ACSE APDUs.
//! - [`security`]: authentication challenge transforms.
//! - [`client`]: [`CosemClient`], which ties all of the above together.
//!
//! ```no_run
//! use std::net::TcpStream;
//!
//! use dlms_cosem_client::{
//!     CosemAttributeDescriptor, CosemClient, CosemSettings, HdlcLink, HdlcParameters, ObisCode,
//!     StreamTransport, class_id,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("192.168.1.50:4059")?;
//! let link = HdlcLink::new(StreamTransport::new(stream), HdlcParameters::default());
//! let mut client = CosemClient::new(link, CosemSettings::default());
//!
//! client.connect()?;
//! let energy = CosemAttributeDescriptor::new(class_id::REGISTER, ObisCode::new(1, 0, 1, 8, 0, 255), 2);
//! let response = client.get(energy)?;
//! println!("{:?}", response.result);
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod association;
pub mod client;
pub mod cosem;
pub mod data;
pub mod get;
pub mod hdlc;
pub mod obis_code;
pub mod security;
pub mod set;
pub mod transport;

pub use action::{ActionRequest, ActionResponse};
pub use association::{AssociationResult, AuthenticationMechanism, SecurityContext};
pub use client::{AssociationState, ClientError, CosemClient, CosemSettings};
pub use cosem::{
    AccessSelector, ActionResult, CosemAttributeDescriptor, DataAccessResult, InvokeIdAndPriority,
    class_id,
};
pub use data::{Data, DataType, DecodeError, DlmsType};
pub use get::{GetDataResult, GetRequest, GetResponse};
pub use obis_code::ObisCode;
pub use set::{SetRequest, SetResponse};
pub use transport::{
    HdlcLink, HdlcParameters, LinkError, LinkLayer, StreamTransport, TracingTransport, Transport,
};
