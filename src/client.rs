//! COSEM client.
//!
//! [`sync::CosemClient`] drives a [`LinkLayer`](crate::transport::LinkLayer):
//! association (AARQ/AARE plus the optional HLS round trip), then
//! GET/SET/ACTION with invoke-id correlation.

use thiserror::Error;

use crate::association::{AssociationResult, SourceDiagnostic};
use crate::data::DecodeError;
use crate::obis_code::ObisCode;
use crate::security::SecurityError;

// ============================================================================
// Shared Constants
// ============================================================================

/// Logical name of the current Association LN object.
pub const ASSOCIATION_LN_CURRENT: ObisCode = ObisCode::new(0, 0, 40, 0, 0, 255);

/// Association LN method 1, `reply_to_HLS_authentication`.
pub const REPLY_TO_HLS_AUTHENTICATION: i8 = 1;

// ============================================================================
// Submodules
// ============================================================================

pub mod sync;

pub use crate::association::CosemSettings;
pub use sync::CosemClient;

/// Association lifecycle as seen by the client.
///
/// `Connected` is terminal for the lowest and low level mechanisms; HLS
/// needs the extra challenge round trip to reach `Authenticated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssociationState {
    #[default]
    Disconnected,
    Connected,
    Authenticated,
    Rejected,
}

/// Errors that can occur during client operations.
///
/// "The meter said no" to a GET/SET/ACTION is not an error: it comes back as
/// a [`DataAccessResult`](crate::DataAccessResult) or
/// [`ActionResult`](crate::ActionResult) inside an `Ok` response.
#[derive(Debug, Error)]
pub enum ClientError<E> {
    #[error("link error: {0}")]
    Link(E),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("association {result}, diagnostic {diagnostic:?}")]
    AssociationRejected { result: AssociationResult, diagnostic: Option<SourceDiagnostic> },
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("no application association")]
    NotAssociated,
    #[error("invoke id mismatch: expected {expected}, received {received}")]
    InvokeIdMismatch { expected: u8, received: u8 },
    #[error("unexpected response APDU {0:#04x}")]
    UnexpectedResponse(u8),
}

impl<E> From<nom::Err<DecodeError>> for ClientError<E> {
    fn from(err: nom::Err<DecodeError>) -> Self {
        ClientError::Decode(err.into())
    }
}
