//! # Frame Link Demo
//!
//! Plays both sides of the protocol in one process:
//! 1. A top-level container opens a frame whose name carries the component tag.
//! 2. The container answers `Init` with its initial props.
//! 3. The container pushes a props update, then the component asks to be closed.

use frame_link::channel::{Channel, InitReply, MailboxTransport, MessageKind, PropsUpdate};
use frame_link::component::{ComponentOptions, EmbeddedComponent, Environment, Props};
use frame_link::context::{ContextHandle, ContextKind};
use frame_link::error::ComponentError;
use frame_link::runtime::setup_tracing;
use frame_link::topology::EmbedName;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, Instrument};

fn props(value: serde_json::Value) -> Props {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    info!("Starting container");
    let container = ContextHandle::top_level("checkout-page");
    let frame = container.open_frame(EmbedName::new("card-form").with_id("uid-1").encode());

    // Container side: answer Init and wait for Close.
    let owner = Channel::new(container.clone(), Arc::new(MailboxTransport));
    owner.register_handler(&frame, MessageKind::Init, |message| async move {
        info!(from = %message.source.id(), "Init received");
        let reply = InitReply {
            context: ContextKind::Iframe,
            props: props(json!({ "currency": "EUR", "amount": 1200 })),
        };
        serde_json::to_value(reply).map_err(|e| ComponentError::Channel(e.into()))
    });
    let (closed_tx, closed_rx) = oneshot::channel();
    let closed_tx = parking_lot::Mutex::new(Some(closed_tx));
    owner.register_handler(&frame, MessageKind::Close, move |_| {
        if let Some(tx) = closed_tx.lock().take() {
            let _ = tx.send(());
        }
        async { Ok(serde_json::Value::Null) }
    });
    let _owner_listener = owner.listen()?;

    // Component side.
    let options = ComponentOptions::new()
        .default_props(props(json!({ "currency": "USD", "theme": "light" })))
        .on_enter(|| {
            info!("Component entered");
            Ok(())
        })
        .on_props(|props| {
            info!(?props, "Props changed");
            Ok(())
        })
        .on_close(|reason| {
            match reason {
                Some(reason) => info!(%reason, "Component closed"),
                None => info!("Component closed"),
            }
            Ok(())
        })
        .on_error(|e| error!(error = %e, "Component error"));

    let component = EmbeddedComponent::attach(&frame, &Environment::default(), options)?;
    component
        .init()
        .instrument(tracing::info_span!("handshake"))
        .await?;
    info!(amount = ?component.prop("amount"), theme = ?component.prop("theme"), "Ready");

    owner.emit(
        &frame,
        MessageKind::Props,
        PropsUpdate {
            props: props(json!({ "amount": 1500 })),
        },
    )?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(amount = ?component.prop("amount"), "After update");

    // The component asks to be closed; the container tears the frame down.
    component.close();
    tokio::time::timeout(Duration::from_secs(1), closed_rx).await??;
    container.close();
    info!(phase = ?component.phase(), termination = ?frame.termination(), "Demo completed");
    Ok(())
}
