//! The shared resource handle

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pkgdeck_events::{AppEvent, EventEmitter, EventSender, ResourceEvent};
use pkgdeck_types::{ResourceKey, ResourceKind, ResourceState};

/// One installable/installed software item from one backend.
///
/// `Resource` is a cheap cloneable handle; all clones observe the same
/// state. State is only ever mutated from the event-loop thread by the
/// owning backend or by the transaction targeting the resource (there is
/// at most one of those at a time), so the mutex is uncontended.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    key: ResourceKey,
    kind: ResourceKind,
    appstream_id: Option<String>,
    display_name: String,
    comment: String,
    icon: String,
    origin: String,
    extends: Vec<String>,
    size: AtomicU64,
    mutable: Mutex<MutableState>,
    events: Option<EventSender>,
}

#[derive(Default)]
struct MutableState {
    state: ResourceState,
    installed_version: Option<String>,
    available_version: Option<String>,
}

impl Resource {
    /// Start building a resource owned by `backend`.
    #[must_use]
    pub fn builder(backend: impl Into<String>, name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(ResourceKey::new(backend, name))
    }

    /// Backend-scoped identity.
    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.inner.key
    }

    /// Name of the owning backend.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.inner.key.backend
    }

    /// Package name within the backend.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.inner.key.name
    }

    /// Global appstream identifier, when the backend knows one.
    #[must_use]
    pub fn appstream_id(&self) -> Option<&str> {
        self.inner.appstream_id.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.inner.kind
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    #[must_use]
    pub fn comment(&self) -> &str {
        &self.inner.comment
    }

    #[must_use]
    pub fn icon(&self) -> &str {
        &self.inner.icon
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Appstream ids this resource extends (addons name their host here).
    #[must_use]
    pub fn extends(&self) -> &[String] {
        &self.inner.extends
    }

    /// Package size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.size.load(Ordering::Relaxed)
    }

    pub fn set_size(&self, size: u64) {
        self.inner.size.store(size, Ordering::Relaxed);
    }

    /// Current install state.
    #[must_use]
    pub fn state(&self) -> ResourceState {
        self.lock().state
    }

    /// Update the install state, notifying the event bus on change.
    pub fn set_state(&self, new: ResourceState) {
        let old = {
            let mut mutable = self.lock();
            let old = mutable.state;
            mutable.state = new;
            old
        };
        if old != new {
            self.inner.events.emit(AppEvent::Resource(ResourceEvent::StateChanged {
                resource: self.inner.key.clone(),
                old,
                new,
            }));
        }
    }

    #[must_use]
    pub fn installed_version(&self) -> Option<String> {
        self.lock().installed_version.clone()
    }

    pub fn set_installed_version(&self, version: Option<String>) {
        self.lock().installed_version = version;
    }

    #[must_use]
    pub fn available_version(&self) -> Option<String> {
        self.lock().available_version.clone()
    }

    pub fn set_available_version(&self, version: Option<String>) {
        self.lock().available_version = version;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MutableState> {
        self.inner
            .mutable
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// Identity is the backend-scoped key: a backend never hands out two
// distinct resources with the same key.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl Eq for Resource {}

impl std::hash::Hash for Resource {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("key", &self.inner.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Resource`]
pub struct ResourceBuilder {
    key: ResourceKey,
    kind: ResourceKind,
    appstream_id: Option<String>,
    display_name: Option<String>,
    comment: String,
    icon: String,
    origin: String,
    extends: Vec<String>,
    size: u64,
    state: ResourceState,
    installed_version: Option<String>,
    available_version: Option<String>,
    events: Option<EventSender>,
}

impl ResourceBuilder {
    fn new(key: ResourceKey) -> Self {
        Self {
            key,
            kind: ResourceKind::Application,
            appstream_id: None,
            display_name: None,
            comment: String::new(),
            icon: String::new(),
            origin: String::new(),
            extends: Vec::new(),
            size: 0,
            state: ResourceState::None,
            installed_version: None,
            available_version: None,
            events: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn appstream_id(mut self, id: impl Into<String>) -> Self {
        self.appstream_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub fn extends(mut self, extends: Vec<String>) -> Self {
        self.extends = extends;
        self
    }

    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn installed_version(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn available_version(mut self, version: impl Into<String>) -> Self {
        self.available_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn build(self) -> Resource {
        let display_name = self.display_name.unwrap_or_else(|| self.key.name.clone());
        Resource {
            inner: Arc::new(ResourceInner {
                key: self.key,
                kind: self.kind,
                appstream_id: self.appstream_id,
                display_name,
                comment: self.comment,
                icon: self.icon,
                origin: self.origin,
                extends: self.extends,
                size: AtomicU64::new(self.size),
                mutable: Mutex::new(MutableState {
                    state: self.state,
                    installed_version: self.installed_version,
                    available_version: self.available_version,
                }),
                events: self.events,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let res = Resource::builder("dummy", "krita").build();
        assert_eq!(res.display_name(), "krita");
        assert_eq!(res.state(), ResourceState::None);
        assert_eq!(res.kind(), ResourceKind::Application);
        assert_eq!(res.size(), 0);
    }

    #[test]
    fn state_change_is_observable_on_all_handles() {
        let res = Resource::builder("dummy", "krita").build();
        let other = res.clone();
        res.set_state(ResourceState::Installed);
        assert_eq!(other.state(), ResourceState::Installed);
    }

    #[tokio::test]
    async fn state_change_emits_event() {
        let (tx, mut rx) = pkgdeck_events::channel();
        let res = Resource::builder("dummy", "krita").events(tx).build();
        res.set_state(ResourceState::Upgradeable);
        // Same-state writes are silent.
        res.set_state(ResourceState::Upgradeable);

        let message = rx.recv().await.expect("event");
        match message.event {
            AppEvent::Resource(ResourceEvent::StateChanged { old, new, .. }) => {
                assert_eq!(old, ResourceState::None);
                assert_eq!(new, ResourceState::Upgradeable);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn identity_is_the_key() {
        let a = Resource::builder("dummy", "krita").build();
        let b = Resource::builder("dummy", "krita").size(10).build();
        let c = Resource::builder("snap", "krita").build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
