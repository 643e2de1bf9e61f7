//! Raw byte tracing for any [`Transport`].

use std::fmt;
use std::time::Duration;

use log::trace;

use super::Transport;

type Listener = Box<dyn FnMut(&[u8]) + Send>;

/// Wraps a transport, logs every buffer at `trace` level as hex and hands it
/// to the optional tx/rx listeners.
pub struct TracingTransport<T> {
    inner: T,
    on_tx: Option<Listener>,
    on_rx: Option<Listener>,
}

impl<T> TracingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, on_tx: None, on_rx: None }
    }

    /// Called with every buffer before it is sent.
    pub fn with_tx_listener(mut self, listener: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_tx = Some(Box::new(listener));
        self
    }

    /// Called with every buffer received.
    pub fn with_rx_listener(mut self, listener: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_rx = Some(Box::new(listener));
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn received(&mut self, data: &[u8]) {
        trace!("rx {}", hex::encode(data));
        if let Some(listener) = self.on_rx.as_mut() {
            listener(data);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TracingTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingTransport")
            .field("inner", &self.inner)
            .field("on_tx", &self.on_tx.is_some())
            .field("on_rx", &self.on_rx.is_some())
            .finish()
    }
}

impl<T: Transport> Transport for TracingTransport<T> {
    type Error = T::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        trace!("tx {}", hex::encode(data));
        if let Some(listener) = self.on_tx.as_mut() {
            listener(data);
        }
        self.inner.send(data)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.inner.recv(buffer)?;
        self.received(&buffer[..n]);
        Ok(n)
    }

    fn recv_timeout(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        let n = self.inner.recv_timeout(buffer, timeout)?;
        self.received(&buffer[..n]);
        Ok(n)
    }
}
