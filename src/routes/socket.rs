use crate::Config;
use crate::auth::MaybeSession;
use crate::hub::Hub;
use crate::hub::connection::serve;
use crate::middleware::RequestId;
use rocket::futures::StreamExt;
use rocket::{State, get, routes};
use rocket_ws::{Channel, WebSocket};
use std::sync::Arc;
use tracing::debug;

/// Shared gateway for devices and browsers. The browser's session cookie is
/// read at upgrade time; the transport's role is fixed by its first message.
#[get("/ws")]
pub async fn socket(ws: WebSocket, hub: &State<Arc<Hub>>, config: &State<Config>, session: MaybeSession, request_id: RequestId) -> Channel<'static> {
    let hub = Arc::clone(hub.inner());
    let handshake_timeout = config.relay.handshake_timeout();
    debug!(request_id = %request_id.0, has_session = session.0.is_some(), "socket upgrade");

    ws.channel(move |stream| {
        Box::pin(async move {
            let (sink, source) = stream.split();
            serve(hub, session.0, handshake_timeout, sink, source).await;
            Ok(())
        })
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![socket]
}
