use crate::hub::Hub;
use crate::hub::registry::Outbound;
use crate::models::events::ServerEvent;
use crate::models::session::Session;
use rocket::futures::{Sink, SinkExt, Stream, StreamExt};
use rocket_ws::Message;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives one socket until either side closes it.
///
/// `session` is whatever the upgrade request carried; it is only consulted
/// when the transport identifies itself as a web client. A transport that
/// has not completed a handshake within `handshake_timeout` is dropped.
pub async fn serve<S, R, E>(hub: Arc<Hub>, session: Option<Session>, handshake_timeout: Duration, mut sink: S, mut stream: R)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (id, mut outbound) = hub.open().await;
    let deadline = tokio::time::sleep(handshake_timeout);
    tokio::pin!(deadline);
    let mut identified = false;

    loop {
        tokio::select! {
            _ = &mut deadline, if !identified => {
                info!(connection_id = id, "handshake timed out");
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    hub.handle_text(id, session.as_ref(), &text).await;
                    if !identified {
                        identified = hub.is_identified(id).await;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    hub.reply(id, ServerEvent::error("Binary frames are not supported")).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection_id = id, error = %e, "socket read failed");
                    break;
                }
            },
            next = outbound.recv() => match next {
                Some(Outbound::Event(event)) => {
                    let text = match serde_json::to_string(&*event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(connection_id = id, error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!(connection_id = id, error = %e, "socket write failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            },
        }
    }

    if let Err(e) = sink.close().await {
        debug!(connection_id = id, error = %e, "socket close failed");
    }
    hub.close(id).await;
}
