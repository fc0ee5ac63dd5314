//! # Component Options
//!
//! User-supplied configuration of an [`EmbeddedComponent`](crate::component::EmbeddedComponent):
//! lifecycle callbacks, default properties, and the standalone switch.
//!
//! ```rust
//! use frame_link::component::{ComponentOptions, ComponentSettings};
//!
//! let settings = ComponentSettings::from_json(r#"{ "standalone": true, "default_props": { "theme": "dark" } }"#).unwrap();
//! let options = ComponentOptions::from_settings(settings)
//!     .on_enter(|| {
//!         println!("ready");
//!         Ok(())
//!     })
//!     .on_error(|e| eprintln!("component error: {e}"));
//! assert!(options.is_standalone());
//! ```

use crate::component::Props;
use crate::error::{panic_message, ComponentError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Error a user callback may return. It is routed to `on_error`.
pub type CallbackError = Box<dyn Error + Send + Sync>;
pub type CallbackResult = Result<(), CallbackError>;

type EnterFn = Arc<dyn Fn() -> CallbackResult + Send + Sync>;
type CloseFn = Arc<dyn Fn(Option<&ComponentError>) -> CallbackResult + Send + Sync>;
type PropsFn = Arc<dyn Fn(&Props) -> CallbackResult + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&ComponentError) + Send + Sync>;

/// Serializable part of the options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSettings {
    /// Degrade to an inert component instead of failing when the context was not
    /// embedded by a container.
    pub standalone: bool,
    pub default_props: Props,
}

impl ComponentSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Clone, Default)]
pub struct ComponentOptions {
    settings: ComponentSettings,
    on_enter: Option<EnterFn>,
    on_close: Option<CloseFn>,
    on_props: Option<PropsFn>,
    on_error: Option<ErrorFn>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: ComponentSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Runs once, when the handshake completed and the initial props are in place.
    pub fn on_enter(mut self, f: impl Fn() -> CallbackResult + Send + Sync + 'static) -> Self {
        self.on_enter = Some(Arc::new(f));
        self
    }

    /// Runs once, when the component closes. The argument is `None` for a requested
    /// close and the cascade error when the container or owner went away.
    pub fn on_close(
        mut self,
        f: impl Fn(Option<&ComponentError>) -> CallbackResult + Send + Sync + 'static,
    ) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Runs after every property merge with the merged values.
    pub fn on_props(mut self, f: impl Fn(&Props) -> CallbackResult + Send + Sync + 'static) -> Self {
        self.on_props = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ComponentError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn default_props(mut self, props: Props) -> Self {
        self.settings.default_props = props;
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.settings.standalone = standalone;
        self
    }

    pub fn is_standalone(&self) -> bool {
        self.settings.standalone
    }

    pub fn settings(&self) -> &ComponentSettings {
        &self.settings
    }

    pub(crate) fn into_parts(self) -> (ComponentSettings, Callbacks) {
        let callbacks = Callbacks {
            on_enter: self.on_enter,
            on_close: self.on_close,
            on_props: self.on_props,
            on_error: self.on_error,
        };
        (self.settings, callbacks)
    }
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("settings", &self.settings)
            .field("on_enter", &self.on_enter.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_props", &self.on_props.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// The callbacks of one component, each wrapped so that a returned error or a panic
/// ends up in `on_error` instead of unwinding into the lifecycle.
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    on_enter: Option<EnterFn>,
    on_close: Option<CloseFn>,
    on_props: Option<PropsFn>,
    on_error: Option<ErrorFn>,
}

impl Callbacks {
    pub(crate) fn enter(&self) {
        if let Some(f) = &self.on_enter {
            self.guarded("on_enter", || f());
        }
    }

    pub(crate) fn props_changed(&self, props: &Props) {
        if let Some(f) = &self.on_props {
            self.guarded("on_props", || f(props));
        }
    }

    pub(crate) fn close(&self, reason: Option<&ComponentError>) {
        if let Some(f) = &self.on_close {
            self.guarded("on_close", || f(reason));
        }
    }

    pub(crate) fn error(&self, error: &ComponentError) {
        let Some(f) = &self.on_error else {
            warn!(%error, "Component error with no on_error callback");
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(error))) {
            warn!(%error, panic = %panic_message(panic.as_ref()), "on_error callback panicked");
        }
    }

    fn guarded(&self, callback: &'static str, f: impl FnOnce() -> CallbackResult) {
        let reason = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };
        self.error(&ComponentError::Callback { callback, reason });
    }
}
