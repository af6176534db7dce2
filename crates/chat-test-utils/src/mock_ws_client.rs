use std::time::Duration;

use chat_protocol::{ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A WebSocket client speaking the chat frame vocabulary.
///
/// Pongs, pings, and non-text frames are skipped transparently; callers only
/// ever see typed `ServerFrame`s.
pub struct MockWsClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockWsClient {
    /// Connect to `base_url` (e.g. `ws://127.0.0.1:4000`) with the given
    /// access token in the query string, as browsers do.
    pub async fn connect(
        base_url: &str,
        token: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let url = format!("{base_url}/ws?token={token}");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send_frame(
        &mut self,
        frame: &ClientFrame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(frame)?;
        self.write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a raw text frame, for exercising the server's tolerance of
    /// malformed or unknown input.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    pub async fn recv_frame(&mut self) -> Result<ServerFrame, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: ServerFrame = serde_json::from_str(&text)?;
                    return Ok(frame);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    /// Receive with a deadline; `Err` on timeout.  Useful when a test must
    /// assert that *some* frame arrives without hanging the suite.
    pub async fn recv_frame_timeout(
        &mut self,
        wait: Duration,
    ) -> Result<ServerFrame, Box<dyn std::error::Error>> {
        tokio::time::timeout(wait, self.recv_frame())
            .await
            .map_err(|_| Box::<dyn std::error::Error>::from("timed out waiting for frame"))?
    }

    /// Drain frames until `pred` matches, bounded by `wait` per frame.
    /// Presence and typing events interleave freely with message events, so
    /// most assertions want this rather than `recv_frame`.
    pub async fn recv_until(
        &mut self,
        wait: Duration,
        mut pred: impl FnMut(&ServerFrame) -> bool,
    ) -> Result<ServerFrame, Box<dyn std::error::Error>> {
        loop {
            let frame = self.recv_frame_timeout(wait).await?;
            if pred(&frame) {
                return Ok(frame);
            }
        }
    }

    /// Assert that nothing arrives for `quiet`.  Consumes and fails on any
    /// frame received in the window.
    pub async fn expect_silence(
        &mut self,
        quiet: Duration,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match tokio::time::timeout(quiet, self.recv_frame()).await {
            Err(_) => Ok(()),
            Ok(Ok(frame)) => Err(format!("expected silence, got {frame:?}").into()),
            Ok(Err(e)) => Err(e),
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}
