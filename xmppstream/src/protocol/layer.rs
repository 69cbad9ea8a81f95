use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::XmppLayerConfig;
use crate::element::{Element, ProtocolHeader};
use crate::error::*;
use crate::protocol::parser::{ParserEvent, XmppParser};
use crate::protocol::serializer::XmppSerializer;
use crate::registry::ElementRegistry;
use crate::streamstack::{HighLayer, LowLayer};

/// Receives what an [`XmppLayer`] parses.
///
/// The stream callbacks get a [`LayerContext`] to answer through; writes made
/// there go out immediately, a parser reset requested there waits until the
/// data being parsed has been handled.
///
/// [`XmppLayer`]: struct.XmppLayer.html
/// [`LayerContext`]: struct.LayerContext.html
pub trait XmppLayerClient {
    fn handle_stream_start(&mut self, ctx: &mut LayerContext, header: ProtocolHeader);

    fn handle_element(&mut self, ctx: &mut LayerContext, element: Box<dyn Element>);

    fn handle_stream_end(&mut self, _ctx: &mut LayerContext) {}

    /// Called once for input that cannot be parsed, or that a layer below
    /// failed to decode.
    fn handle_error(&mut self, error: &Error);

    /// Sees every chunk of inbound data before it is parsed.
    fn handle_data_read(&mut self, _data: &[u8]) {}

    /// Sees every chunk of outbound data, in the order it was written.
    fn handle_write_data(&mut self, _data: &[u8]) {}
}

/// The writing half of an [`XmppLayer`], lent to client callbacks.
///
/// [`XmppLayer`]: struct.XmppLayer.html
pub struct LayerContext {
    serializer: XmppSerializer,
    child: Option<Box<dyn LowLayer>>,
    reset_pending: bool,
    generation: u64,
    // Outbound chunks not yet shown to the client.
    written: Vec<Vec<u8>>,
}

impl LayerContext {
    pub fn write_header(&mut self, header: &ProtocolHeader) -> Result<()> {
        let data = self.serializer.serialize_header(header);
        self.write(data.into_bytes())
    }

    pub fn write_footer(&mut self) -> Result<()> {
        let data = self.serializer.serialize_footer();
        self.write(data.as_bytes().to_vec())
    }

    pub fn write_element(&mut self, element: &dyn Element) -> Result<()> {
        let data = self.serializer.serialize_element(element)?;
        self.write(data.into_bytes())
    }

    pub fn write_data(&mut self, data: &str) -> Result<()> {
        self.write(data.as_bytes().to_vec())
    }

    fn write(&mut self, data: Vec<u8>) -> Result<()> {
        let child = self.child.as_mut().ok_or(ErrorKind::NoChildLayer)?;
        trace!(bytes = data.len(), "write");
        self.written.push(data.clone());
        child.write_data(data)
    }

    /// Replaces the parser once the current input has been handled.
    pub fn reset_parser(&mut self) {
        self.reset_pending = true;
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn parser_generation(&self) -> u64 {
        self.generation
    }
}

/// The top of a stream stack: serializes outbound elements and parses the
/// inbound stream for its client.
pub struct XmppLayer<C> {
    client: C,
    registry: Arc<ElementRegistry>,
    parser: XmppParser,
    ctx: LayerContext,
}

impl<C: XmppLayerClient> XmppLayer<C> {
    pub fn new(client: C, registry: Arc<ElementRegistry>, config: XmppLayerConfig) -> Self {
        XmppLayer {
            client,
            parser: XmppParser::new(registry.clone()),
            ctx: LayerContext {
                serializer: XmppSerializer::new(registry.clone(), config),
                child: None,
                reset_pending: false,
                generation: 0,
                written: Vec::new(),
            },
            registry,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn set_child_layer(&mut self, child: Box<dyn LowLayer>) {
        self.ctx.child = Some(child);
    }

    pub fn take_child_layer(&mut self) -> Option<Box<dyn LowLayer>> {
        self.ctx.child.take()
    }

    pub fn child_layer(&self) -> Option<&dyn LowLayer> {
        self.ctx.child.as_deref()
    }

    pub(crate) fn child_layer_mut(&mut self) -> Option<&mut Box<dyn LowLayer>> {
        self.ctx.child.as_mut()
    }

    pub fn write_header(&mut self, header: &ProtocolHeader) -> Result<()> {
        let result = self.ctx.write_header(header);
        self.mirror_writes();
        result
    }

    pub fn write_footer(&mut self) -> Result<()> {
        let result = self.ctx.write_footer();
        self.mirror_writes();
        result
    }

    pub fn write_element(&mut self, element: &dyn Element) -> Result<()> {
        let result = self.ctx.write_element(element);
        self.mirror_writes();
        result
    }

    pub fn write_data(&mut self, data: &str) -> Result<()> {
        let result = self.ctx.write_data(data);
        self.mirror_writes();
        result
    }

    fn mirror_writes(&mut self) {
        for data in self.ctx.written.drain(..) {
            self.client.handle_write_data(&data);
        }
    }

    /// Starts a new stream document with a fresh parser.
    pub fn reset_parser(&mut self) {
        self.parser = XmppParser::new(self.registry.clone());
        self.ctx.reset_pending = false;
        self.ctx.generation += 1;
        debug!(generation = self.ctx.generation, "parser reset");
    }

    /// Number of times the parser has been replaced.
    pub fn parser_generation(&self) -> u64 {
        self.ctx.generation
    }

    pub fn is_reset_pending(&self) -> bool {
        self.ctx.reset_pending
    }
}

impl<C: XmppLayerClient> HighLayer for XmppLayer<C> {
    fn handle_data_read(&mut self, data: &[u8]) {
        self.client.handle_data_read(data);

        let XmppLayer {
            client,
            parser,
            ctx,
            ..
        } = self;
        let result = parser.parse(data, &mut |event| {
            match event {
                ParserEvent::StreamStart(header) => client.handle_stream_start(ctx, header),
                ParserEvent::Element(element) => client.handle_element(ctx, element),
                ParserEvent::StreamEnd => client.handle_stream_end(ctx),
            }
            for data in ctx.written.drain(..) {
                client.handle_write_data(&data);
            }
        });

        if let Err(e) = result {
            warn!(error = %e, "protocol error");
            self.client.handle_error(&e);
            return;
        }
        if self.ctx.reset_pending {
            self.reset_parser();
        }
    }
}
