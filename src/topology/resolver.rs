//! # Topology Resolver
//!
//! Works out, once per component, which context structurally contains the current
//! one and which context logically owns it.

use crate::context::{AttachmentRegistry, ContextHandle};
use crate::error::ComponentError;
use crate::topology::EmbedName;
use tracing::info;

/// Resolved position of the current context. Immutable after [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    /// The context that structurally embeds the current one.
    pub direct_container: ContextHandle,
    /// The protocol counterpart. Equals `direct_container` unless sibling-rendered.
    pub logical_owner: ContextHandle,
    pub sibling: Option<usize>,
    pub tag: String,
    pub id: Option<String>,
}

impl Topology {
    pub fn is_sibling_rendered(&self) -> bool {
        self.sibling.is_some()
    }

    pub fn owner_is_container(&self) -> bool {
        self.logical_owner == self.direct_container
    }
}

/// Resolves the topology of `current` and marks it as hosting a component.
///
/// The marker is set first, before anything else is inspected, so a second call for
/// the same context fails with `AlreadyAttached` and has no other effect. Then:
///
/// 1. no parent → `NoParentContext`
/// 2. name string does not decode → `NotEmbedded`
/// 3. sibling marker `N` → owner is the container's `N`-th frame (`NotEmbedded` if
///    there is no such frame); otherwise the owner is the container itself
pub fn resolve(
    current: &ContextHandle,
    registry: &AttachmentRegistry,
) -> Result<Topology, ComponentError> {
    registry.try_attach(current)?;

    let direct_container = current
        .parent()
        .ok_or(ComponentError::NoParentContext(current.id()))?;
    let name = EmbedName::decode(current.name())?;

    let logical_owner = match name.sibling {
        Some(index) => direct_container.frame(index).ok_or_else(|| {
            ComponentError::NotEmbedded(format!("[{}] no sibling frame at index {index}", name.tag))
        })?,
        None => direct_container.clone(),
    };

    info!(
        tag = %name.tag,
        context = %current.id(),
        container = %direct_container.id(),
        owner = %logical_owner.id(),
        sibling = ?name.sibling,
        "Topology resolved"
    );

    Ok(Topology {
        direct_container,
        logical_owner,
        sibling: name.sibling,
        tag: name.tag,
        id: name.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_defaults_to_container() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame(EmbedName::new("card").encode());

        let topology = resolve(&frame, &registry).unwrap();
        assert_eq!(topology.direct_container, top);
        assert_eq!(topology.logical_owner, top);
        assert!(!topology.is_sibling_rendered());
        assert!(topology.owner_is_container());
        assert_eq!(topology.tag, "card");
    }

    #[test]
    fn sibling_marker_selects_container_frame() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let _unrelated = top.open_frame("unrelated");
        let renderer = top.open_frame("renderer");
        let frame = top.open_frame(EmbedName::new("card").rendered_by_sibling(1).encode());

        let topology = resolve(&frame, &registry).unwrap();
        assert_eq!(topology.direct_container, top);
        assert_eq!(topology.logical_owner, renderer);
        assert!(topology.is_sibling_rendered());
        assert!(!topology.owner_is_container());
    }

    #[test]
    fn popup_container_is_its_opener() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let popup = top.open_popup(EmbedName::new("checkout").encode());

        let topology = resolve(&popup, &registry).unwrap();
        assert_eq!(topology.direct_container, top);
    }

    #[test]
    fn second_resolve_fails_without_touching_the_first() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame(EmbedName::new("card").encode());

        let first = resolve(&frame, &registry).unwrap();
        assert_eq!(
            resolve(&frame, &registry),
            Err(ComponentError::AlreadyAttached(frame.id()))
        );
        assert_eq!(first.logical_owner, top);
        assert!(registry.is_attached(&frame));
    }

    #[test]
    fn top_level_context_has_no_parent() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level(EmbedName::new("card").encode());
        assert_eq!(
            resolve(&top, &registry),
            Err(ComponentError::NoParentContext(top.id()))
        );
    }

    #[test]
    fn foreign_name_is_not_embedded() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("ad-slot");
        assert!(matches!(
            resolve(&frame, &registry),
            Err(ComponentError::NotEmbedded(_))
        ));
    }

    #[test]
    fn missing_sibling_is_not_embedded() {
        let registry = AttachmentRegistry::new();
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame(EmbedName::new("card").rendered_by_sibling(5).encode());
        assert!(matches!(
            resolve(&frame, &registry),
            Err(ComponentError::NotEmbedded(_))
        ));
    }
}
