//! # Commands
//!
//! One-way operations on the current context and the owner. All of them need an
//! owner and fail with `NotAttached` in standalone mode, except
//! [`report_error`](EmbeddedComponent::report_error), which never fails.
//!
//! `focus` and `resize` are platform requests that only work from within a
//! user-initiated action. That precondition is the caller's to meet.

use crate::channel::{ErrorReport, MessageKind, RedirectRequest};
use crate::component::EmbeddedComponent;
use crate::context::ContextHandle;
use crate::error::ComponentError;
use std::error::Error;
use tracing::{debug, info};

impl EmbeddedComponent {
    fn owner(&self) -> Result<&ContextHandle, ComponentError> {
        self.topology()
            .map(|topology| &topology.logical_owner)
            .ok_or(ComponentError::NotAttached)
    }

    /// Brings the current context to the foreground.
    pub fn focus(&self) -> Result<(), ComponentError> {
        self.owner()?;
        self.current().focus();
        Ok(())
    }

    /// Resizes the visible surface of the current context.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), ComponentError> {
        self.owner()?;
        self.current().resize(width, height);
        Ok(())
    }

    /// Asks the owner to navigate to `url`. Nothing waits for the owner to act.
    pub fn redirect_owner(&self, url: impl Into<String>) -> Result<(), ComponentError> {
        let owner = self.owner()?;
        let url = url.into();
        info!(tag = %self.tag(), %url, "Redirecting owner");
        let channel = self.shared.channel.as_ref().ok_or(ComponentError::NotAttached)?;
        channel.emit(owner, MessageKind::Redirect, RedirectRequest { url })?;
        Ok(())
    }

    /// Sends the owner to the current context's location, taking the component out of
    /// its frame.
    pub fn break_out_to_full_page(&self) -> Result<(), ComponentError> {
        self.redirect_owner(self.current().location())
    }

    /// Tells the owner about `error`, with its source chain as the trace.
    ///
    /// Best effort: a failed send is only logged.
    pub fn report_error(&self, error: &(dyn Error + 'static)) {
        let (Ok(owner), Some(channel)) = (self.owner(), self.shared.channel.as_ref()) else {
            debug!(tag = %self.tag(), %error, "No owner to report to");
            return;
        };

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        let report = ErrorReport {
            error: error.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        };

        if let Err(e) = channel.emit(owner, MessageKind::Error, report) {
            debug!(tag = %self.tag(), error = %e, "Error report dropped");
        }
    }
}
