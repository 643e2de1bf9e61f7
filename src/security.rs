//! HLS challenge processing
//!
//! The high-level mechanisms run a four-pass exchange: CtoS travels in the
//! AARQ, StoC comes back in the AARE, then the client proves itself with
//! `f(StoC)` in a `reply_to_HLS_authentication` action and the server
//! answers with `f(CtoS)`.
//!
//! | mechanism  | f(StoC) computed by the client                          |
//! |------------|---------------------------------------------------------|
//! | HLS-MD5    | `MD5(StoC ‖ secret)`                                    |
//! | HLS-SHA1   | `SHA1(StoC ‖ secret)`                                   |
//! | HLS-SHA256 | `SHA256(secret ‖ ST_C ‖ ST_S ‖ StoC ‖ CtoS)`            |
//! | HLS-GMAC   | `SC ‖ IC ‖ GMAC(EK, ST_C ‖ IC, SC ‖ AK ‖ StoC)`         |
//!
//! The server side mirrors each row with the titles and challenges swapped.
//!
//! Reference: DLMS Green Book Ed. 12, Section 9.2.7.4

use aes::Aes128;
use aes_gcm::Aes128Gcm;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use cipher::Key;
use md5::Md5;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::association::{AuthenticationMechanism, CosemSettings};

/// Security control byte for authentication only with the global unicast key.
pub const SECURITY_CONTROL_AUTHENTICATION: u8 = 0x10;

/// Truncated GMAC tag length.
const GMAC_TAG_LEN: usize = 12;
const GMAC_REPLY_LEN: usize = 1 + 4 + GMAC_TAG_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("authentication mechanism {0} is not supported")]
    UnsupportedMechanism(AuthenticationMechanism),
    #[error("server system title required but not provided in the AARE")]
    MissingServerSystemTitle,
    #[error("invalid key: expected 16 bytes, got {0}")]
    InvalidKey(usize),
    #[error("cipher operation failed")]
    Cipher,
}

/// Fill a fresh challenge of `len` bytes from `rng`.
pub fn generate_challenge<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut challenge = vec![0; len];
    rng.fill_bytes(&mut challenge);
    challenge
}

/// Both challenges and titles of one HLS exchange, as seen from the client.
#[derive(Debug, Clone, Copy)]
pub struct HlsExchange<'a> {
    pub mechanism: AuthenticationMechanism,
    pub secret: &'a [u8],
    pub client_title: &'a [u8],
    pub server_title: Option<&'a [u8]>,
    /// CtoS, sent in the AARQ
    pub client_challenge: &'a [u8],
    /// StoC, received in the AARE
    pub server_challenge: &'a [u8],
    pub authentication_key: &'a [u8],
    pub encryption_key: &'a [u8],
    pub invocation_counter: u32,
}

impl<'a> HlsExchange<'a> {
    pub fn new(
        settings: &'a CosemSettings,
        server_title: Option<&'a [u8]>,
        client_challenge: &'a [u8],
        server_challenge: &'a [u8],
    ) -> Self {
        Self {
            mechanism: settings.mechanism,
            secret: &settings.secret,
            client_title: &settings.system_title,
            server_title,
            client_challenge,
            server_challenge,
            authentication_key: &settings.authentication_key,
            encryption_key: &settings.encryption_key,
            invocation_counter: settings.invocation_counter,
        }
    }

    /// `f(StoC)`, the value the client sends in `reply_to_HLS_authentication`.
    pub fn client_response(&self) -> Result<Vec<u8>, SecurityError> {
        let challenge_then_secret = [self.server_challenge, self.secret];
        match self.mechanism {
            AuthenticationMechanism::HlsMd5 => Ok(digest::<Md5>(&challenge_then_secret)),
            AuthenticationMechanism::HlsSha1 => Ok(digest::<Sha1>(&challenge_then_secret)),
            AuthenticationMechanism::HlsSha256 => {
                let server_title = self.server_title()?;
                Ok(digest::<Sha256>(&[
                    self.secret,
                    self.client_title,
                    server_title,
                    self.server_challenge,
                    self.client_challenge,
                ]))
            }
            AuthenticationMechanism::HlsGmac => {
                self.gmac(self.client_title, self.invocation_counter, self.server_challenge)
            }
            other => Err(SecurityError::UnsupportedMechanism(other)),
        }
    }

    /// Check the server's `f(CtoS)`.
    pub fn verify_server_response(&self, reply: &[u8]) -> Result<bool, SecurityError> {
        let challenge_then_secret = [self.client_challenge, self.secret];
        let expected = match self.mechanism {
            AuthenticationMechanism::HlsMd5 => digest::<Md5>(&challenge_then_secret),
            AuthenticationMechanism::HlsSha1 => digest::<Sha1>(&challenge_then_secret),
            AuthenticationMechanism::HlsSha256 => {
                let server_title = self.server_title()?;
                digest::<Sha256>(&[
                    self.secret,
                    server_title,
                    self.client_title,
                    self.client_challenge,
                    self.server_challenge,
                ])
            }
            AuthenticationMechanism::HlsGmac => {
                let server_title = self.server_title()?;
                if reply.len() != GMAC_REPLY_LEN || reply[0] != SECURITY_CONTROL_AUTHENTICATION {
                    return Ok(false);
                }
                let counter = u32::from_be_bytes([reply[1], reply[2], reply[3], reply[4]]);
                self.gmac(server_title, counter, self.client_challenge)?
            }
            other => return Err(SecurityError::UnsupportedMechanism(other)),
        };
        Ok(expected == reply)
    }

    fn server_title(&self) -> Result<&'a [u8], SecurityError> {
        self.server_title.ok_or(SecurityError::MissingServerSystemTitle)
    }

    fn gmac(&self, title: &[u8], counter: u32, challenge: &[u8]) -> Result<Vec<u8>, SecurityError> {
        if self.encryption_key.len() != 16 {
            return Err(SecurityError::InvalidKey(self.encryption_key.len()));
        }
        let key = Key::<Aes128>::from_slice(self.encryption_key);
        let cipher = Aes128Gcm::new(key);

        let mut iv = [0u8; 12];
        let title_len = title.len().min(8);
        iv[..title_len].copy_from_slice(&title[..title_len]);
        iv[8..].copy_from_slice(&counter.to_be_bytes());

        let mut aad = Vec::with_capacity(1 + self.authentication_key.len() + challenge.len());
        aad.push(SECURITY_CONTROL_AUTHENTICATION);
        aad.extend_from_slice(self.authentication_key);
        aad.extend_from_slice(challenge);

        let mut empty: [u8; 0] = [];
        let tag = cipher
            .encrypt_in_place_detached(&iv.into(), &aad, &mut empty)
            .map_err(|_| SecurityError::Cipher)?;

        let mut out = Vec::with_capacity(GMAC_REPLY_LEN);
        out.push(SECURITY_CONTROL_AUTHENTICATION);
        out.extend_from_slice(&counter.to_be_bytes());
        out.extend_from_slice(&tag[..GMAC_TAG_LEN]);
        Ok(out)
    }
}

fn digest<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}
