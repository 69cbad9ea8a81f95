//! The chain of layers between a [`Connection`] and the [`XmppLayer`].
//!
//! Outbound bytes travel down through [`LowLayer::write_data`]. Inbound bytes
//! are pulled up: [`LowLayer::lift_data_read`] runs them through a layer and
//! everything beneath it, so the stack needs no links from a layer to the one
//! above it.
//!
//! [`Connection`]: ../connection/struct.Connection.html
//! [`XmppLayer`]: ../protocol/struct.XmppLayer.html
//! [`LowLayer::write_data`]: trait.LowLayer.html#tymethod.write_data
//! [`LowLayer::lift_data_read`]: trait.LowLayer.html#tymethod.lift_data_read

use tracing::debug;

use crate::connection::Connection;
use crate::error::*;
use crate::protocol::{XmppLayer, XmppLayerClient};

/// A layer as seen from the layer above it.
pub trait LowLayer {
    /// Sends `data` towards the wire.
    fn write_data(&mut self, data: Vec<u8>) -> Result<()>;

    /// Runs bytes read from the wire through every layer from the bottom up
    /// to and including this one.
    fn lift_data_read(&mut self, data: Vec<u8>) -> Result<Vec<u8>>;

    fn child_layer(&self) -> Option<&dyn LowLayer> {
        None
    }

    fn take_child_layer(&mut self) -> Option<Box<dyn LowLayer>> {
        None
    }
}

/// A layer as seen from the layer below it.
pub trait HighLayer {
    fn handle_data_read(&mut self, data: &[u8]);
}

/// A byte stream transformation such as compression or encryption.
///
/// Both directions must keep byte order and neither lose nor duplicate data.
/// A call may return fewer bytes than it was given, even none, if the
/// transform needs more input.
pub trait ByteTransform {
    fn encode(&mut self, data: Vec<u8>) -> Result<Vec<u8>>;
    fn decode(&mut self, data: Vec<u8>) -> Result<Vec<u8>>;
}

/// Puts a [`ByteTransform`] in front of a child layer.
///
/// [`ByteTransform`]: trait.ByteTransform.html
pub struct TransformLayer<T> {
    transform: T,
    child: Option<Box<dyn LowLayer>>,
}

impl<T: ByteTransform> TransformLayer<T> {
    pub fn new(transform: T, child: Box<dyn LowLayer>) -> Self {
        TransformLayer {
            transform,
            child: Some(child),
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut T {
        &mut self.transform
    }
}

impl<T: ByteTransform> LowLayer for TransformLayer<T> {
    fn write_data(&mut self, data: Vec<u8>) -> Result<()> {
        let child = self.child.as_mut().ok_or(ErrorKind::NoChildLayer)?;
        let encoded = self.transform.encode(data)?;
        if encoded.is_empty() {
            return Ok(());
        }
        child.write_data(encoded)
    }

    fn lift_data_read(&mut self, data: Vec<u8>) -> Result<Vec<u8>> {
        let lifted = match self.child.as_mut() {
            Some(child) => child.lift_data_read(data)?,
            None => data,
        };
        if lifted.is_empty() {
            return Ok(lifted);
        }
        self.transform.decode(lifted)
    }

    fn child_layer(&self) -> Option<&dyn LowLayer> {
        self.child.as_deref()
    }

    fn take_child_layer(&mut self) -> Option<Box<dyn LowLayer>> {
        self.child.take()
    }
}

/// The bottom layer: hands outbound bytes to a [`Connection`].
///
/// [`Connection`]: ../connection/struct.Connection.html
#[derive(Debug, Clone)]
pub struct ConnectionLayer {
    connection: Connection,
}

impl ConnectionLayer {
    pub fn new(connection: Connection) -> Self {
        ConnectionLayer { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl LowLayer for ConnectionLayer {
    fn write_data(&mut self, data: Vec<u8>) -> Result<()> {
        self.connection.write(data);
        Ok(())
    }

    fn lift_data_read(&mut self, data: Vec<u8>) -> Result<Vec<u8>> {
        Ok(data)
    }
}

/// Owns an [`XmppLayer`] and the layers beneath it.
///
/// Feed it the `DataRead` payloads of the connection it was built on:
///
/// ```no_run
/// use std::sync::Arc;
/// use xmppstream::*;
///
/// struct Client;
///
/// impl XmppLayerClient for Client {
///     fn handle_stream_start(&mut self, _: &mut LayerContext, header: ProtocolHeader) {
///         println!("stream {} from {}", header.id, header.from);
///     }
///     fn handle_element(&mut self, _: &mut LayerContext, element: Box<dyn Element>) {
///         println!("{:?}", element);
///     }
///     fn handle_error(&mut self, error: &Error) {
///         eprintln!("{}", error);
///     }
/// }
///
/// # fn main() -> xmppstream::Result<()> {
/// let mut event_loop = EventLoop::<ConnectionEvent>::new();
/// let connection = Connection::new(event_loop.sender(), ConnectionConfig::default());
/// let xmpp = XmppLayer::new(Client, Arc::new(ElementRegistry::default()), XmppLayerConfig::default());
/// let mut stack = StreamStack::new(xmpp, connection.clone());
///
/// connection.connect("127.0.0.1:5222".parse()?)?;
/// while let Some(event) = event_loop.next_event(std::time::Duration::from_secs(30)) {
///     match event.kind {
///         ConnectionEventKind::Connected { error: false } => {
///             stack.xmpp_layer_mut().write_header(&ProtocolHeader::to("example.com"))?;
///         }
///         ConnectionEventKind::DataRead(data) => stack.handle_data_read(data),
///         _ => break,
///     }
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`XmppLayer`]: ../protocol/struct.XmppLayer.html
pub struct StreamStack<C: XmppLayerClient> {
    xmpp: XmppLayer<C>,
}

impl<C: XmppLayerClient> StreamStack<C> {
    pub fn new(xmpp: XmppLayer<C>, connection: Connection) -> Self {
        Self::with_bottom_layer(xmpp, Box::new(ConnectionLayer::new(connection)))
    }

    /// Builds a stack on an arbitrary bottom layer instead of a connection.
    pub fn with_bottom_layer(mut xmpp: XmppLayer<C>, bottom: Box<dyn LowLayer>) -> Self {
        xmpp.set_child_layer(bottom);
        StreamStack { xmpp }
    }

    /// Splices `transform` in directly beneath the protocol layer.
    pub fn add_layer<T: ByteTransform + 'static>(&mut self, transform: T) -> Result<()> {
        let child = self
            .xmpp
            .take_child_layer()
            .ok_or(ErrorKind::NoChildLayer)?;
        self.xmpp
            .set_child_layer(Box::new(TransformLayer::new(transform, child)));
        debug!(layers = self.layer_count(), "layer added");
        Ok(())
    }

    /// Unsplices the layer directly beneath the protocol layer and returns
    /// it. The bottom layer is never removed.
    pub fn remove_layer(&mut self) -> Option<Box<dyn LowLayer>> {
        let mut top = self.xmpp.take_child_layer()?;
        match top.take_child_layer() {
            Some(below) => {
                self.xmpp.set_child_layer(below);
                debug!(layers = self.layer_count(), "layer removed");
                Some(top)
            }
            None => {
                self.xmpp.set_child_layer(top);
                None
            }
        }
    }

    /// Number of layers beneath the protocol layer, the bottom one included.
    pub fn layer_count(&self) -> usize {
        let mut count = 0;
        let mut layer = self.xmpp.child_layer();
        while let Some(l) = layer {
            count += 1;
            layer = l.child_layer();
        }
        count
    }

    /// Delivers bytes read from the wire.
    pub fn handle_data_read(&mut self, data: Vec<u8>) {
        let lifted = match self.xmpp.child_layer_mut() {
            Some(child) => child.lift_data_read(data),
            None => Ok(data),
        };
        match lifted {
            Ok(data) if data.is_empty() => {}
            Ok(data) => HighLayer::handle_data_read(&mut self.xmpp, &data),
            Err(e) => {
                debug!(error = %e, "inbound transform failed");
                self.xmpp.client_mut().handle_error(&e);
            }
        }
    }

    pub fn xmpp_layer(&self) -> &XmppLayer<C> {
        &self.xmpp
    }

    pub fn xmpp_layer_mut(&mut self) -> &mut XmppLayer<C> {
        &mut self.xmpp
    }

    pub fn into_xmpp_layer(self) -> XmppLayer<C> {
        self.xmpp
    }
}
