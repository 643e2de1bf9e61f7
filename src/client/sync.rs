//! Blocking COSEM client over any [`LinkLayer`].

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};

use super::{ASSOCIATION_LN_CURRENT, AssociationState, ClientError, REPLY_TO_HLS_AUTHENTICATION};
use crate::action::{ACTION_RESPONSE_TAG, ActionRequest, ActionResponse};
use crate::association::{AareApdu, AarqApdu, CosemSettings, InitiateResponse};
use crate::cosem::{
    AccessSelector, CosemAttributeDescriptor, CosemMethodDescriptor, DataAccessResult,
    InvokeIdAndPriority, class_id,
};
use crate::data::{Data, DecodeError, DecodeResult, DlmsType};
use crate::get::{GET_RESPONSE_TAG, GetDataResult, GetRequest, GetResponse};
use crate::security::{HlsExchange, generate_challenge};
use crate::set::{SET_RESPONSE_TAG, SetRequest, SetResponse};
use crate::transport::LinkLayer;

type Result<T, L> = std::result::Result<T, ClientError<<L as LinkLayer>::Error>>;

/// A DLMS/COSEM client.
///
/// One request is outstanding at a time. Every request takes the next
/// invoke id (modulo 16) and the response must echo it.
///
/// `R` supplies the HLS client challenge; inject a seeded generator for
/// reproducible association requests.
#[derive(Debug)]
pub struct CosemClient<L: LinkLayer, R: RngCore + CryptoRng = StdRng> {
    link: L,
    settings: CosemSettings,
    rng: R,
    state: AssociationState,
    invoke_id: u8,
    negotiated: Option<InitiateResponse>,
    server_system_title: Option<Vec<u8>>,
}

impl<L: LinkLayer> CosemClient<L> {
    /// Creates a client seeded from the operating system's entropy source.
    pub fn new(link: L, settings: CosemSettings) -> Self {
        Self::with_rng(link, settings, StdRng::from_entropy())
    }
}

impl<L: LinkLayer, R: RngCore + CryptoRng> CosemClient<L, R> {
    pub fn with_rng(link: L, settings: CosemSettings, rng: R) -> Self {
        Self {
            link,
            settings,
            rng,
            state: AssociationState::Disconnected,
            invoke_id: 0,
            negotiated: None,
            server_system_title: None,
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn settings(&self) -> &CosemSettings {
        &self.settings
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    /// xDLMS parameters granted by the server in the last AARE.
    pub fn negotiated(&self) -> Option<&InitiateResponse> {
        self.negotiated.as_ref()
    }

    /// Server system title from the last AARE, if it sent one.
    pub fn server_system_title(&self) -> Option<&[u8]> {
        self.server_system_title.as_deref()
    }

    /// Whether GET/SET/ACTION may be issued.
    pub fn is_associated(&self) -> bool {
        match self.state {
            AssociationState::Authenticated => true,
            AssociationState::Connected => !self.settings.mechanism.is_high_level(),
            AssociationState::Disconnected | AssociationState::Rejected => false,
        }
    }

    /// Opens the link and establishes the application association.
    ///
    /// For the HLS mechanisms this includes `reply_to_HLS_authentication`
    /// and, when the server returns one, verification of `f(CtoS)`.
    pub fn connect(&mut self) -> Result<(), L> {
        self.state = AssociationState::Disconnected;
        self.invoke_id = 0;
        self.negotiated = None;
        self.server_system_title = None;

        self.link.connect().map_err(ClientError::Link)?;

        let mechanism = self.settings.mechanism;
        let challenge = if mechanism.is_high_level() {
            generate_challenge(&mut self.rng, self.settings.challenge_length)
        } else {
            Vec::new()
        };

        let aarq = AarqApdu::from_settings(&self.settings, &challenge);
        let reply = self.exchange(&aarq.encode())?;
        let (_, aare) = AareApdu::parse(&reply)?;
        debug!("{aare}");

        if !aare.is_accepted() {
            self.state = AssociationState::Rejected;
            return Err(ClientError::AssociationRejected {
                result: aare.result,
                diagnostic: aare.diagnostic,
            });
        }

        self.negotiated = aare.initiate_response.clone();
        self.server_system_title = aare.responding_ap_title.clone();
        self.state = AssociationState::Connected;

        if mechanism.is_high_level() {
            self.authenticate(&aare, &challenge)?;
            self.state = AssociationState::Authenticated;
            debug!("{mechanism} authentication complete");
        }
        Ok(())
    }

    fn authenticate(&mut self, aare: &AareApdu, client_challenge: &[u8]) -> Result<(), L> {
        let server_challenge =
            aare.responding_authentication_value.as_deref().ok_or_else(|| {
                ClientError::AuthenticationFailed("AARE carries no server challenge".into())
            })?;
        let server_title = aare.responding_ap_title.as_deref();
        let settings = self.settings.clone();
        let exchange =
            HlsExchange::new(&settings, server_title, client_challenge, server_challenge);

        let reply = exchange.client_response()?;

        let descriptor = CosemMethodDescriptor::new(
            class_id::ASSOCIATION_LN,
            ASSOCIATION_LN_CURRENT,
            REPLY_TO_HLS_AUTHENTICATION,
        );
        let response = self.invoke_action(descriptor, Some(Data::OctetString(reply)))?;
        if !response.result.is_success() {
            return Err(ClientError::AuthenticationFailed(format!(
                "reply_to_HLS_authentication returned {}",
                response.result
            )));
        }

        match response.return_parameters {
            Some(GetDataResult::Data(Data::OctetString(server_reply))) => {
                if !exchange.verify_server_response(&server_reply)? {
                    return Err(ClientError::AuthenticationFailed(
                        "server response to challenge is invalid".into(),
                    ));
                }
            }
            Some(GetDataResult::Data(other)) => {
                return Err(ClientError::AuthenticationFailed(format!(
                    "server response is {:?}, expected octet-string",
                    other.data_type()
                )));
            }
            Some(GetDataResult::DataAccessError(result)) => {
                return Err(ClientError::AuthenticationFailed(format!(
                    "server response withheld: {result}"
                )));
            }
            None => warn!("server returned no f(CtoS), skipping verification"),
        }
        Ok(())
    }

    /// Closes the link. The association ends with it.
    pub fn disconnect(&mut self) -> Result<(), L> {
        self.state = AssociationState::Disconnected;
        self.link.disconnect().map_err(ClientError::Link)
    }

    /// GET-Request-Normal for one attribute.
    pub fn get(&mut self, descriptor: CosemAttributeDescriptor) -> Result<GetResponse, L> {
        self.get_with_selector(descriptor, None)
    }

    /// GET with selective access, e.g. a range of a profile buffer.
    pub fn get_with_selector(
        &mut self,
        descriptor: CosemAttributeDescriptor,
        access_selection: Option<AccessSelector>,
    ) -> Result<GetResponse, L> {
        self.ensure_associated()?;
        let invoke_id = self.next_invoke_id();
        let request = GetRequest { invoke_id, descriptor, access_selection };

        let reply = self.exchange(&request.encode())?;
        let response = Self::parse_response(&reply, GET_RESPONSE_TAG, GetResponse::parse)?;
        Self::check_invoke_id(invoke_id, response.invoke_id)?;
        Ok(response)
    }

    /// GET an attribute whose value must be of type `T`.
    ///
    /// The inner `Result` is the meter's verdict; a body of another type is a
    /// [`DecodeError`].
    pub fn get_as<T: DlmsType>(
        &mut self,
        descriptor: CosemAttributeDescriptor,
    ) -> Result<std::result::Result<T, DataAccessResult>, L> {
        let response = self.get(descriptor)?;
        Ok(response.result.decode_as::<T>()?)
    }

    /// SET-Request-Normal for one attribute.
    pub fn set(
        &mut self,
        descriptor: CosemAttributeDescriptor,
        value: Data,
    ) -> Result<SetResponse, L> {
        self.ensure_associated()?;
        let invoke_id = self.next_invoke_id();
        let request = SetRequest::new(invoke_id, descriptor, value);

        let reply = self.exchange(&request.encode())?;
        let response = Self::parse_response(&reply, SET_RESPONSE_TAG, SetResponse::parse)?;
        Self::check_invoke_id(invoke_id, response.invoke_id)?;
        Ok(response)
    }

    /// ACTION-Request-Normal for one method.
    pub fn action(
        &mut self,
        descriptor: CosemMethodDescriptor,
        parameters: Option<Data>,
    ) -> Result<ActionResponse, L> {
        self.ensure_associated()?;
        self.invoke_action(descriptor, parameters)
    }

    fn invoke_action(
        &mut self,
        descriptor: CosemMethodDescriptor,
        parameters: Option<Data>,
    ) -> Result<ActionResponse, L> {
        let invoke_id = self.next_invoke_id();
        let request = ActionRequest::new(invoke_id, descriptor, parameters);

        let reply = self.exchange(&request.encode())?;
        let response = Self::parse_response(&reply, ACTION_RESPONSE_TAG, ActionResponse::parse)?;
        Self::check_invoke_id(invoke_id, response.invoke_id)?;
        Ok(response)
    }

    fn ensure_associated(&self) -> Result<(), L> {
        if self.is_associated() { Ok(()) } else { Err(ClientError::NotAssociated) }
    }

    fn next_invoke_id(&mut self) -> InvokeIdAndPriority {
        self.invoke_id = (self.invoke_id + 1) % 16;
        InvokeIdAndPriority::new(self.invoke_id)
    }

    fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, L> {
        self.link.send(apdu).map_err(ClientError::Link)?;
        self.link.read().map_err(ClientError::Link)
    }

    /// Checks the tag, then parses. Bytes after the response are logged and
    /// dropped.
    fn parse_response<'a, T>(
        apdu: &'a [u8],
        expected: u8,
        parse: impl FnOnce(&'a [u8]) -> DecodeResult<'a, T>,
    ) -> Result<T, L> {
        match apdu.first() {
            Some(&tag) if tag == expected => {}
            Some(&tag) => return Err(ClientError::UnexpectedResponse(tag)),
            None => return Err(ClientError::Decode(DecodeError::UnexpectedEndOfData)),
        }

        let (rest, response) = parse(apdu)?;
        if !rest.is_empty() {
            warn!("ignoring {} bytes after response {expected:#04x}", rest.len());
        }
        Ok(response)
    }

    fn check_invoke_id(sent: InvokeIdAndPriority, received: InvokeIdAndPriority) -> Result<(), L> {
        if sent.invoke_id() == received.invoke_id() {
            Ok(())
        } else {
            Err(ClientError::InvokeIdMismatch {
                expected: sent.invoke_id(),
                received: received.invoke_id(),
            })
        }
    }
}
