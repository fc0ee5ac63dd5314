//! # Close Cascade
//!
//! Watches the direct container and, when it is a different context, the logical
//! owner. Whichever terminates first triggers its callback once; the component then
//! tears down and drops the monitor, which stops the other observer.

use crate::topology::Topology;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug)]
pub struct CascadeMonitor {
    observers: Vec<JoinHandle<()>>,
}

impl CascadeMonitor {
    /// Starts observing. Contexts that are already closed trigger right away.
    pub fn arm<C, O>(topology: &Topology, on_container_closed: C, on_owner_closed: O) -> Self
    where
        C: FnOnce() + Send + 'static,
        O: FnOnce() + Send + 'static,
    {
        let mut observers = Vec::with_capacity(2);

        let container = topology.direct_container.clone();
        let tag = topology.tag.clone();
        observers.push(tokio::spawn(async move {
            container.closed().await;
            info!(%tag, container = %container.id(), "Container closed");
            on_container_closed();
        }));

        if !topology.owner_is_container() {
            let owner = topology.logical_owner.clone();
            let tag = topology.tag.clone();
            observers.push(tokio::spawn(async move {
                owner.closed().await;
                info!(%tag, owner = %owner.id(), "Owner closed");
                on_owner_closed();
            }));
        }

        Self { observers }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn disarm(&mut self) {
        for observer in self.observers.drain(..) {
            observer.abort();
        }
    }
}

impl Drop for CascadeMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
