#![allow(dead_code)]

use frame_link::component::{ComponentOptions, Props};
use frame_link::error::ComponentError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(1);

/// A callback invocation, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Enter,
    Props(Value),
    Close(Option<ComponentError>),
    Error(ComponentError),
}

/// Collects every callback of a component.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> ComponentOptions {
        let (enter, props, close, error) = (self.clone(), self.clone(), self.clone(), self.clone());
        ComponentOptions::new()
            .on_enter(move || {
                enter.push(Event::Enter);
                Ok(())
            })
            .on_props(move |values| {
                props.push(Event::Props(Value::Object(values.clone())));
                Ok(())
            })
            .on_close(move |reason| {
                close.push(Event::Close(reason.cloned()));
                Ok(())
            })
            .on_error(move |e| error.push(Event::Error(e.clone())))
    }

    pub fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    /// Waits until `matches` holds for at least `count` recorded events.
    pub async fn wait_for(&self, count: usize, matches: impl Fn(&Event) -> bool) {
        tokio::time::timeout(WAIT, async {
            while self.count(&matches) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out, recorded: {:?}", self.events()));
    }
}

pub fn props(value: Value) -> Props {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn is_close(event: &Event) -> bool {
    matches!(event, Event::Close(_))
}

pub fn is_props(event: &Event) -> bool {
    matches!(event, Event::Props(_))
}

pub fn is_error(event: &Event) -> bool {
    matches!(event, Event::Error(_))
}
