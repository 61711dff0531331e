//! TCP debug server

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::protocol::{DebugCommand, DebugResponse};

/// Trait that the application implements to handle debug commands
pub trait DebugHandler: Send + Sync + 'static {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse;
}

/// Debug server handle - keep this alive to keep the server running
pub struct DebugServer {
    _handle: tokio::task::JoinHandle<()>,
}

impl DebugServer {
    /// Start the debug server on the given port.
    /// The handler is called for each incoming command.
    /// Returns immediately -- server runs in background.
    pub fn start(handler: Arc<Mutex<dyn DebugHandler>>, port: u16) -> Self {
        let handle = tokio::spawn(async move {
            let addr = format!("127.0.0.1:{}", port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(l) => {
                    log::info!("Debug server listening on {}", addr);
                    l
                }
                Err(e) => {
                    log::error!("Failed to bind debug server on {}: {}", addr, e);
                    return;
                }
            };

            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        log::info!("Debug client connected from {}", peer);
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_connection(reader, writer, handler).await;
                            log::info!("Debug client disconnected: {}", peer);
                        });
                    }
                    Err(e) => {
                        log::error!("Debug server accept error: {}", e);
                    }
                }
            }
        });

        Self { _handle: handle }
    }
}

/// Answer one request line. Blank lines get no answer.
pub async fn respond(line: &str, handler: &Arc<Mutex<dyn DebugHandler>>) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let response = match serde_json::from_str::<DebugCommand>(trimmed) {
        Ok(cmd) => {
            log::debug!("Debug command: {:?}", cmd);
            let mut h = handler.lock().await;
            h.handle_command(cmd)
        }
        Err(e) => DebugResponse::error(format!("Invalid command JSON: {}", e)),
    };
    Some(encode(&response))
}

/// One response line, newline included
fn encode(response: &DebugResponse) -> String {
    let mut resp_json = serde_json::to_string(response).unwrap_or_else(|e| {
        format!(
            "{{\"status\":\"error\",\"message\":\"Serialize error: {}\"}}",
            e
        )
    });
    resp_json.push('\n');
    resp_json
}

/// Serve one client until it disconnects. Malformed lines get an error reply.
async fn handle_connection<R, W>(reader: R, mut writer: W, handler: Arc<Mutex<dyn DebugHandler>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break, // Connection closed
            Ok(_) => {
                let reply = match std::str::from_utf8(&buf) {
                    Ok(line) => respond(line, &handler).await,
                    Err(e) => Some(encode(&DebugResponse::error(format!("Request is not UTF-8: {}", e)))),
                };
                let Some(resp_json) = reply else {
                    continue;
                };

                if let Err(e) = writer.write_all(resp_json.as_bytes()).await {
                    log::error!("Debug server write error: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    log::error!("Debug server flush error: {}", e);
                    break;
                }
            }
            Err(e) => {
                log::error!("Debug server read error: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseData;

    struct Counter {
        pings: u32,
    }

    impl DebugHandler for Counter {
        fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
            match cmd {
                DebugCommand::Ping => {
                    self.pings += 1;
                    DebugResponse::pong()
                }
                _ => DebugResponse::none(),
            }
        }
    }

    fn handler() -> Arc<Mutex<dyn DebugHandler>> {
        Arc::new(Mutex::new(Counter { pings: 0 }))
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let h = handler();
        let reply = respond("{\"cmd\":\"Ping\"}\n", &h).await.unwrap();
        assert!(reply.ends_with('\n'));
        let resp: DebugResponse = serde_json::from_str(reply.trim()).unwrap();
        assert_eq!(
            resp,
            DebugResponse::ok(ResponseData::Pong {
                message: "pong".into()
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error_response() {
        let h = handler();
        let reply = respond("{not json", &h).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(reply.trim()).unwrap();
        assert_eq!(value["status"], "error");
    }

    #[tokio::test]
    async fn test_non_utf8_line_keeps_connection_open() {
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(handle_connection(server_read, server_write, handler()));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        client_write
            .write_all(b"{\"cmd\":\xff\xfe}\n{\"cmd\":\"Ping\"}\n")
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["status"], "error");
        let second: DebugResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second, DebugResponse::pong());

        client_write.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_line_is_ignored() {
        let h = handler();
        assert!(respond("   \n", &h).await.is_none());
    }
}
