mod common;

use common::{props, Recorder, WAIT};
use frame_link::channel::mock::{init_reply, MockPeer};
use frame_link::channel::MessageKind;
use frame_link::component::{
    ComponentOptions, ComponentSettings, EmbeddedComponent, Environment, LifecyclePhase,
};
use frame_link::context::{AttachmentRegistry, ContextHandle, ContextKind};
use frame_link::error::ComponentError;
use frame_link::runtime::try_setup_tracing;
use frame_link::topology::EmbedName;
use serde_json::json;
use std::sync::Arc;

/// Not embedded by a container: `init` resolves at once, without traffic or
/// callbacks, and the component runs on its defaults.
#[tokio::test]
async fn test_standalone_runs_on_defaults() {
    let _ = try_setup_tracing();
    let top = ContextHandle::top_level("top");
    let frame = top.open_frame("ad-slot");
    let host = MockPeer::new(&top);

    let recorder = Recorder::new();
    let options = recorder
        .options()
        .standalone(true)
        .default_props(props(json!({ "theme": "dark" })));
    let component = EmbeddedComponent::attach(&frame, &Environment::default(), options).unwrap();

    tokio::time::timeout(WAIT, component.init())
        .await
        .unwrap()
        .unwrap();

    assert!(component.is_standalone());
    assert_eq!(component.phase(), LifecyclePhase::Uninitialized);
    assert_eq!(component.prop("theme"), Some(json!("dark")));
    assert_eq!(component.context_kind(), None);
    assert!(recorder.events().is_empty());
    assert!(host.received().is_empty());

    component.close();
    assert_eq!(component.phase(), LifecyclePhase::Uninitialized);
    assert!(host.received().is_empty());
}

/// Settings loaded from JSON switch standalone mode on for a top-level context.
#[tokio::test]
async fn test_standalone_from_settings() {
    let top = ContextHandle::top_level("top");
    let settings =
        ComponentSettings::from_json(r#"{ "standalone": true, "default_props": { "n": 1 } }"#).unwrap();

    let component = EmbeddedComponent::attach(
        &top,
        &Environment::default(),
        ComponentOptions::from_settings(settings),
    )
    .unwrap();
    component.init().await.unwrap();
    assert_eq!(component.props(), props(json!({ "n": 1 })));
    assert_eq!(component.tag(), "top");
}

/// Without standalone, topology errors reach the caller.
#[tokio::test]
async fn test_topology_errors_propagate() {
    let env = Environment::default();
    let top = ContextHandle::top_level("top");
    assert_eq!(
        EmbeddedComponent::attach(&top, &env, ComponentOptions::new()).unwrap_err(),
        ComponentError::NoParentContext(top.id())
    );

    let frame = top.open_frame("ad-slot");
    assert!(matches!(
        EmbeddedComponent::attach(&frame, &env, ComponentOptions::new()),
        Err(ComponentError::NotEmbedded(_))
    ));
}

/// A standalone component on an occupied context runs inert; the component already
/// attached there keeps its marker and its handshake.
#[tokio::test]
async fn test_standalone_second_attach_is_inert() {
    let env = Environment::new(
        Arc::new(frame_link::channel::MailboxTransport),
        Arc::new(AttachmentRegistry::new()),
    );
    let top = ContextHandle::top_level("top");
    let frame = top.open_frame(EmbedName::new("card").encode());
    let mut owner = MockPeer::new(&top);
    owner
        .expect_request(MessageKind::Init)
        .return_ok(init_reply(ContextKind::Iframe, props(json!({ "n": 1 }))));

    let first = EmbeddedComponent::attach(&frame, &env, ComponentOptions::new()).unwrap();

    let recorder = Recorder::new();
    let second = EmbeddedComponent::attach(&frame, &env, recorder.options().standalone(true)).unwrap();
    assert!(second.is_standalone());
    second.init().await.unwrap();
    second.close();
    assert_eq!(second.phase(), LifecyclePhase::Uninitialized);
    assert!(recorder.events().is_empty());

    assert!(env.registry.is_attached(&frame));
    tokio::time::timeout(WAIT, first.init())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.phase(), LifecyclePhase::Ready);
    assert_eq!(first.prop("n"), Some(json!(1)));
    owner.verify();
    assert_eq!(owner.received_of(MessageKind::Init).len(), 1);
    assert!(owner.received_of(MessageKind::Close).is_empty());
}
