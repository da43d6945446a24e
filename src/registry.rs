//! Registry of served types, and dynamic registration driven by
//! CustomResourceDefinition objects.

use crate::clock::ResourceVersionClock;
use crate::error::{Error, Result};
use crate::meta::{GroupResource, GroupVersionKind, ResourceScope};
use crate::store::{EventType, ResourceStore, SharedWatchHook, WatchEvent};
use crate::typed::ParseableType;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const CRD_GROUP: &str = "apiextensions.k8s.io";
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// One served GVK: where its objects live and how they merge.
#[derive(Clone)]
pub struct RegisteredType {
    pub scope: ResourceScope,
    pub resource: GroupResource,
    /// Merge-type descriptor; `None` degrades the GVK to
    /// strategic-merge only (apply refused).
    pub descriptor: Option<ParseableType>,
    pub store: Arc<ResourceStore>,
}

struct RegistryInner {
    types: HashMap<GroupVersionKind, RegisteredType>,
    stores: HashMap<GroupResource, Arc<ResourceStore>>,
    observers: Vec<SharedWatchHook>,
}

/// Maps GVKs to stores and descriptors. Guarded by its own mutex,
/// never held across a store operation; where both locks are taken
/// the store lock comes first (the CRD registrar runs as a store
/// observer).
pub struct TypeRegistry {
    clock: Arc<ResourceVersionClock>,
    inner: Mutex<RegistryInner>,
}

impl TypeRegistry {
    pub fn new(clock: Arc<ResourceVersionClock>) -> Self {
        TypeRegistry {
            clock,
            inner: Mutex::new(RegistryInner {
                types: HashMap::new(),
                stores: HashMap::new(),
                observers: Vec::new(),
            }),
        }
    }

    /// Registers (or overwrites) one GVK. All GVKs mapping to the
    /// same GroupResource share a single backing store.
    pub fn register(
        &self,
        gvk: GroupVersionKind,
        scope: ResourceScope,
        resource: GroupResource,
        descriptor: Option<ParseableType>,
    ) -> Arc<ResourceStore> {
        let (store, attach) = {
            let mut inner = self.inner.lock().unwrap();
            let (store, created) = match inner.stores.get(&resource) {
                Some(store) => (Arc::clone(store), false),
                None => {
                    let store = Arc::new(ResourceStore::new(
                        resource.clone(),
                        Arc::clone(&self.clock),
                    ));
                    inner.stores.insert(resource.clone(), Arc::clone(&store));
                    (store, true)
                }
            };
            inner.types.insert(
                gvk,
                RegisteredType {
                    scope,
                    resource,
                    descriptor,
                    store: Arc::clone(&store),
                },
            );
            let attach = if created {
                inner.observers.clone()
            } else {
                Vec::new()
            };
            (store, attach)
        };
        // Attached outside the registry lock: adding an observer takes
        // the store lock, and the store lock always comes first.
        for observer in attach {
            store.add_observer(Box::new(move |event| (*observer)(event)));
        }
        store
    }

    /// Attaches a hook to every store, current and future. Hooks run
    /// for each committed write, inside the owning store's critical
    /// section.
    pub fn add_observer(&self, observer: SharedWatchHook) {
        let stores: Vec<Arc<ResourceStore>> = {
            let mut inner = self.inner.lock().unwrap();
            inner.observers.push(Arc::clone(&observer));
            inner.stores.values().cloned().collect()
        };
        for store in stores {
            let observer = Arc::clone(&observer);
            store.add_observer(Box::new(move |event| (*observer)(event)));
        }
    }

    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<RegisteredType> {
        let inner = self.inner.lock().unwrap();
        inner.types.get(gvk).cloned()
    }

    pub fn served_gvks(&self) -> Vec<GroupVersionKind> {
        let inner = self.inner.lock().unwrap();
        inner.types.keys().cloned().collect()
    }

    /// Seeds the types every server starts with.
    pub fn seed_builtins(&self) {
        let core = [
            ("ConfigMap", "configmaps", ResourceScope::Namespaced),
            ("Secret", "secrets", ResourceScope::Namespaced),
            ("Pod", "pods", ResourceScope::Namespaced),
            ("Namespace", "namespaces", ResourceScope::Cluster),
        ];
        for (kind, resource, scope) in core {
            self.register(
                GroupVersionKind::new("", "v1", kind),
                scope,
                GroupResource::new("", resource),
                Some(ParseableType::builtin(kind)),
            );
        }
        self.register(
            GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND),
            ResourceScope::Cluster,
            GroupResource::new(CRD_GROUP, "customresourcedefinitions"),
            Some(ParseableType::builtin(CRD_KIND)),
        );
    }
}

/// Builds the hook that keeps the registry in sync with stored
/// CustomResourceDefinition objects. Attach it through
/// `TypeRegistry::add_observer`; events from non-CRD stores are
/// skipped by the group/kind check.
///
/// Malformed definitions are logged and skipped, leaving whatever was
/// registered before intact. Re-registration is last-write-wins; CRD
/// deletion does not unregister.
pub fn crd_registrar(registry: Arc<TypeRegistry>) -> SharedWatchHook {
    Arc::new(move |event: &WatchEvent| {
        if event.event_type == EventType::Deleted {
            return;
        }
        if !event.gvk.is_group_kind(CRD_GROUP, CRD_KIND) {
            return;
        }
        if let Err(err) = register_from_crd(&registry, &event.object) {
            tracing::warn!(
                name = crate::meta::name_of(&event.object),
                %err,
                "ignoring malformed CustomResourceDefinition"
            );
        }
    })
}

fn register_from_crd(registry: &TypeRegistry, obj: &Value) -> Result<()> {
    let spec = obj
        .get("spec")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::validation("spec missing".to_string()))?;
    let group = spec
        .get("group")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("spec.group missing".to_string()))?;
    let names = spec
        .get("names")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::validation("spec.names missing".to_string()))?;
    let kind = names
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("spec.names.kind missing".to_string()))?;
    let plural = names
        .get("plural")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("spec.names.plural missing".to_string()))?;
    let scope = spec
        .get("scope")
        .and_then(Value::as_str)
        .and_then(ResourceScope::parse)
        .ok_or_else(|| Error::validation("spec.scope missing or unknown".to_string()))?;
    let versions = spec
        .get("versions")
        .and_then(Value::as_array)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::validation("spec.versions missing or empty".to_string()))?;

    let mut version_names = Vec::with_capacity(versions.len());
    for version in versions {
        let name = version
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("spec.versions[].name missing".to_string()))?;
        version_names.push(name);
    }

    let resource = GroupResource::new(group, plural);
    for name in version_names {
        let gvk = GroupVersionKind::new(group, name, kind);
        tracing::debug!(%gvk, resource = %resource, "registering CRD-served type");
        registry.register(
            gvk,
            scope,
            resource.clone(),
            Some(ParseableType::deduced()),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ResourceVersionClock;
    use crate::meta::NamespacedName;
    use serde_json::json;

    fn crd(group: &str, kind: &str, plural: &str, versions: &[&str]) -> Value {
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": format!("{}.{}", plural, group)},
            "spec": {
                "group": group,
                "scope": "Namespaced",
                "names": {"kind": kind, "plural": plural},
                "versions": versions.iter().map(|v| json!({"name": v})).collect::<Vec<_>>(),
            },
        })
    }

    fn registry() -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::new(Arc::new(ResourceVersionClock::new())));
        registry.seed_builtins();
        registry
    }

    #[test]
    fn builtins_are_served() {
        let registry = registry();
        let cm = registry
            .lookup(&GroupVersionKind::new("", "v1", "ConfigMap"))
            .unwrap();
        assert_eq!(cm.scope, ResourceScope::Namespaced);
        assert!(cm.descriptor.is_some());
        assert!(registry
            .lookup(&GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND))
            .is_some());
    }

    #[test]
    fn storing_a_crd_registers_every_version() {
        let registry = registry();
        registry.add_observer(crd_registrar(Arc::clone(&registry)));
        let crd_store = registry
            .lookup(&GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND))
            .unwrap()
            .store;

        crd_store
            .create(
                &NamespacedName::cluster_scoped("widgets.example.com"),
                crd("example.com", "Widget", "widgets", &["v1alpha1", "v1"]),
            )
            .unwrap();

        let a = registry
            .lookup(&GroupVersionKind::new("example.com", "v1alpha1", "Widget"))
            .unwrap();
        let b = registry
            .lookup(&GroupVersionKind::new("example.com", "v1", "Widget"))
            .unwrap();
        // Both versions share one backing store.
        assert!(Arc::ptr_eq(&a.store, &b.store));
        assert_eq!(a.resource, GroupResource::new("example.com", "widgets"));
    }

    #[test]
    fn malformed_crd_leaves_registry_untouched() {
        let registry = registry();
        registry.add_observer(crd_registrar(Arc::clone(&registry)));
        let crd_store = registry
            .lookup(&GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND))
            .unwrap()
            .store;

        let served_before = registry.served_gvks().len();
        let mut broken = crd("example.com", "Widget", "widgets", &["v1"]);
        broken["spec"].as_object_mut().unwrap().remove("scope");
        crd_store
            .create(&NamespacedName::cluster_scoped("widgets.example.com"), broken)
            .unwrap();

        assert_eq!(registry.served_gvks().len(), served_before);
    }

    #[test]
    fn crd_update_overwrites_registration() {
        let registry = registry();
        registry.add_observer(crd_registrar(Arc::clone(&registry)));
        let crd_store = registry
            .lookup(&GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND))
            .unwrap()
            .store;

        let id = NamespacedName::cluster_scoped("widgets.example.com");
        crd_store
            .create(&id, crd("example.com", "Widget", "widgets", &["v1alpha1"]))
            .unwrap();
        crd_store
            .update(&id, crd("example.com", "Widget", "widgets", &["v1alpha1", "v1"]))
            .unwrap();

        assert!(registry
            .lookup(&GroupVersionKind::new("example.com", "v1", "Widget"))
            .is_some());
    }

    #[test]
    fn observers_reach_stores_created_by_crds() {
        let registry = registry();
        registry.add_observer(crd_registrar(Arc::clone(&registry)));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.add_observer(Arc::new(move |event: &WatchEvent| {
            sink.lock().unwrap().push(event.gvk.kind.clone());
        }));

        let crd_store = registry
            .lookup(&GroupVersionKind::new(CRD_GROUP, "v1", CRD_KIND))
            .unwrap()
            .store;
        crd_store
            .create(
                &NamespacedName::cluster_scoped("widgets.example.com"),
                crd("example.com", "Widget", "widgets", &["v1"]),
            )
            .unwrap();

        // The widget store did not exist when the hook was attached.
        let widget = registry
            .lookup(&GroupVersionKind::new("example.com", "v1", "Widget"))
            .unwrap();
        widget
            .store
            .create(
                &NamespacedName::new("default", "w"),
                json!({
                    "apiVersion": "example.com/v1",
                    "kind": "Widget",
                    "metadata": {"name": "w", "namespace": "default"},
                }),
            )
            .unwrap();

        let kinds = seen.lock().unwrap().clone();
        assert_eq!(
            kinds,
            vec!["CustomResourceDefinition".to_string(), "Widget".to_string()]
        );
    }
}
