use std::{sync::Arc, time::Duration};

use actix_ws::{CloseCode, CloseReason, Message};
use buildwatch_model::data::ComponentView;
use futures::StreamExt;
use tokio::time::{interval, Instant};

use crate::panel::PanelHandle;

const HEARTBEAT: Duration = Duration::from_secs(5);
const TIMEOUT: Duration = Duration::from_secs(20);

/// Stream every published view to the socket, until either side goes away.
pub async fn run(panel: PanelHandle, mut session: actix_ws::Session, mut msg_stream: actix_ws::MessageStream) {
    let mut views = panel.subscribe();

    let close_reason: Option<CloseReason> = 'session: {
        let current = views.borrow_and_update().clone();
        if let Err(err) = send_view(&mut session, &current).await {
            break 'session Some((CloseCode::Error, err.to_string()).into());
        }

        let mut last_heartbeat = Instant::now();
        let mut interval = interval(HEARTBEAT);

        loop {
            tokio::select! {
                msg = msg_stream.next() => {
                    match msg {
                        None => break None,
                        Some(Err(err)) => {
                            break Some(CloseReason {
                                code: CloseCode::Error,
                                description: Some(err.to_string()),
                            })
                        }
                        // mirror reason
                        Some(Ok(Message::Close(reason))) => break reason,
                        Some(Ok(Message::Ping(data))) => {
                            last_heartbeat = Instant::now();
                            let _ = session.pong(&data).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_heartbeat = Instant::now();
                        }
                        Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                            break Some((CloseCode::Protocol, "Must not send data").into());
                        }
                        Some(Ok(Message::Nop | Message::Continuation(_))) => {}
                    }
                }
                changed = views.changed() => {
                    if changed.is_err() {
                        break Some(CloseCode::Restart.into());
                    }
                    let view = views.borrow_and_update().clone();
                    if let Err(err) = send_view(&mut session, &view).await {
                        break Some((CloseCode::Error, err.to_string()).into());
                    }
                }
                _ = interval.tick() => {
                    if Instant::now() - last_heartbeat > TIMEOUT {
                        break None;
                    }

                    // we still have time to send one
                    let _ = session.ping(b"").await;
                }
            }
        }
    };

    let _ = session.close(close_reason).await;
    panel.teardown().await;
}

async fn send_view(session: &mut actix_ws::Session, view: &Arc<ComponentView>) -> anyhow::Result<()> {
    session.text(serde_json::to_string(view.as_ref())?).await?;
    Ok(())
}
