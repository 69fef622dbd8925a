//! WebSocket connector backed by `tokio-tungstenite`

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::{Connection, Connector, Fragment};
use crate::{Error, Result};

/// Opens `ws://` / `wss://` connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, address: &str) -> Result<Connection> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(address).await?;
        tracing::debug!(status = %response.status(), "websocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write.with(|text: String| future::ready(Ok::<_, Error>(WsMessage::Text(text))));
        let stream = read.filter_map(|msg| future::ready(to_fragment(msg)));

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Map a tungstenite message onto a transport fragment
///
/// Control frames other than close are handled by tungstenite and skipped.
fn to_fragment(
    msg: std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Fragment>> {
    match msg {
        Ok(WsMessage::Text(text)) => Some(Ok(Fragment::Data {
            bytes: text.into_bytes(),
            fin: true,
        })),
        Ok(WsMessage::Binary(bytes)) => Some(Ok(Fragment::Data { bytes, fin: true })),
        Ok(WsMessage::Frame(frame)) => {
            let fin = frame.header().is_final;
            Some(Ok(Fragment::Data {
                bytes: frame.into_data(),
                fin,
            }))
        }
        Ok(WsMessage::Close(_)) => Some(Ok(Fragment::Close)),
        Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => None,
        Err(e) => Some(Err(e.into())),
    }
}
