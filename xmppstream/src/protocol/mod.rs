//! The XMPP protocol layer: stream framing on top of a byte layer stack.

mod layer;
mod parser;
mod serializer;

pub use self::layer::{LayerContext, XmppLayer, XmppLayerClient};
pub use self::parser::{ParserEvent, XmppParser};
pub use self::serializer::{XmppSerializer, STREAM_FOOTER};
