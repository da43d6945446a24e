//! The ApiServer facade: one clock, one registry, one admission
//! chain, and the verbs an HTTP router would call.

use crate::admission::{AdmissionPipeline, MutatingWebhook, ResourceInfo};
use crate::apply::{ManagedFields, Updater};
use crate::clock::ResourceVersionClock;
use crate::error::{Error, Result};
use crate::meta::{self, GroupVersionKind, NamespacedName, ResourceScope};
use crate::patch::{strategic_merge, PatchOutcome, PatchRequest};
use crate::registry::{crd_registrar, RegisteredType, TypeRegistry};
use crate::store::{SharedWatchHook, WatchEvent, WatchOptions};
use crate::typed::ParseableType;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// An in-process API server data plane.
///
/// All state is in memory; every store shares one resource version
/// clock, so versions are comparable across resources.
pub struct ApiServer {
    clock: Arc<ResourceVersionClock>,
    registry: Arc<TypeRegistry>,
    admission: AdmissionPipeline,
}

impl ApiServer {
    /// A server with the built-in types seeded and CRD-driven
    /// registration wired up.
    pub fn new() -> Self {
        let clock = Arc::new(ResourceVersionClock::new());
        let registry = Arc::new(TypeRegistry::new(Arc::clone(&clock)));
        registry.seed_builtins();
        registry.add_observer(crd_registrar(Arc::clone(&registry)));

        ApiServer {
            clock,
            registry,
            admission: AdmissionPipeline::new(),
        }
    }

    pub fn clock(&self) -> &Arc<ResourceVersionClock> {
        &self.clock
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn register_webhook(&self, webhook: MutatingWebhook) -> Result<()> {
        self.admission.register(webhook)
    }

    /// Attaches a write hook that observes every committed write on
    /// every served resource, including kinds registered later through
    /// CRDs. Hooks run inside the owning store's critical section.
    pub fn add_observer(&self, observer: SharedWatchHook) {
        self.registry.add_observer(observer);
    }

    fn registered(&self, gvk: &GroupVersionKind) -> Result<RegisteredType> {
        self.registry
            .lookup(gvk)
            .ok_or_else(|| Error::validation(format!("kind not registered: {}", gvk)))
    }

    /// Creates the object. Admission webhooks run before any version
    /// is assigned; the admitted object is what gets stored.
    pub fn create(&self, gvk: &GroupVersionKind, mut obj: Value) -> Result<Value> {
        let reg = self.registered(gvk)?;
        normalize(&mut obj, gvk);
        let id = object_id(&reg, &obj)?;
        validate_against(&reg, &obj)?;

        let info = ResourceInfo::create(gvk.group.clone(), reg.resource.resource.clone());
        let admitted = self.admission.before_create(&info, obj)?;
        // The webhook may have rewritten anything, identity included.
        let id = object_id(&reg, &admitted).unwrap_or(id);
        validate_against(&reg, &admitted)?;

        reg.store.create(&id, admitted)
    }

    pub fn get(&self, gvk: &GroupVersionKind, id: &NamespacedName) -> Result<Value> {
        let reg = self.registered(gvk)?;
        reg.store
            .get(id)
            .ok_or_else(|| Error::not_found(&gvk.kind, &id.name))
    }

    /// Lists objects plus the version the snapshot is current at.
    pub fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> Result<(Vec<Value>, u64)> {
        let reg = self.registered(gvk)?;
        Ok(reg.store.list(namespace))
    }

    pub fn update(
        &self,
        gvk: &GroupVersionKind,
        id: &NamespacedName,
        mut obj: Value,
    ) -> Result<Value> {
        let reg = self.registered(gvk)?;
        normalize(&mut obj, gvk);
        set_identity(&mut obj, &reg, id);
        validate_against(&reg, &obj)?;
        reg.store.update(id, obj)
    }

    pub fn delete(&self, gvk: &GroupVersionKind, id: &NamespacedName) -> Result<Value> {
        let reg = self.registered(gvk)?;
        reg.store.delete(id)
    }

    /// Applies a patch. The patch is computed and committed in one
    /// critical section; a no-op consumes no version and emits no
    /// event.
    pub fn patch(
        &self,
        gvk: &GroupVersionKind,
        id: &NamespacedName,
        request: PatchRequest,
    ) -> Result<PatchOutcome> {
        let reg = self.registered(gvk)?;
        match request {
            PatchRequest::StrategicMerge(patch) => {
                let descriptor = reg
                    .descriptor
                    .clone()
                    .unwrap_or_else(ParseableType::deduced);
                let result = reg.store.mutate_with(id, |live| {
                    let next = strategic_merge(&descriptor, live, &patch)?;
                    if next == *live {
                        return Ok(None);
                    }
                    Ok(Some(next))
                })?;
                Ok(match result {
                    Some(next) => PatchOutcome::Changed(next),
                    None => PatchOutcome::Unchanged,
                })
            }
            PatchRequest::Apply {
                config,
                field_manager,
                force,
            } => self.apply(gvk, &reg, id, config, &field_manager, force),
        }
    }

    fn apply(
        &self,
        gvk: &GroupVersionKind,
        reg: &RegisteredType,
        id: &NamespacedName,
        mut config: Value,
        field_manager: &str,
        force: bool,
    ) -> Result<PatchOutcome> {
        let descriptor = reg.descriptor.clone().ok_or_else(|| {
            Error::validation(format!("{} is served without a merge schema, apply refused", gvk))
        })?;
        normalize(&mut config, gvk);
        set_identity(&mut config, reg, id);
        let config = meta::without_managed_fields(&config);
        let api_version = gvk.api_version();
        let updater = Updater::with_time(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        let result = reg.store.upsert_with(id, |prev| {
            let base = match prev {
                Some(prev) => meta::without_managed_fields(prev),
                None => json!({}),
            };
            let mut managers = match prev {
                Some(prev) => ManagedFields::from_object(prev)?,
                None => ManagedFields::new(),
            };

            let live = descriptor.from_value_unvalidated(base);
            let intent = descriptor.from_value(config.clone())?;

            match updater.apply(&live, &intent, &api_version, &mut managers, field_manager, force)? {
                Some(merged) => {
                    let mut next = merged.into_value();
                    if let Value::Array(entries) = managers.to_wire()? {
                        meta::set_managed_fields(&mut next, entries)?;
                    }
                    Ok(Some(next))
                }
                None => Ok(None),
            }
        })?;

        Ok(match result {
            Some(next) => PatchOutcome::Changed(next),
            None => PatchOutcome::Unchanged,
        })
    }

    /// Subscribes to a kind's store and blocks the calling thread, as
    /// `ResourceStore::watch` does.
    pub fn watch<F>(&self, gvk: &GroupVersionKind, opts: WatchOptions, callback: F) -> Result<()>
    where
        F: FnMut(&WatchEvent) -> Result<()> + Send + 'static,
    {
        let reg = self.registered(gvk)?;
        reg.store.watch(opts, callback)
    }
}

impl Default for ApiServer {
    fn default() -> Self {
        ApiServer::new()
    }
}

/// Stamps the request GVK onto the document; the stored form always
/// carries its wire coordinates.
fn normalize(obj: &mut Value, gvk: &GroupVersionKind) {
    if let Some(map) = obj.as_object_mut() {
        map.insert("apiVersion".to_string(), json!(gvk.api_version()));
        map.insert("kind".to_string(), json!(gvk.kind));
    }
}

fn set_identity(obj: &mut Value, reg: &RegisteredType, id: &NamespacedName) {
    let meta = obj
        .as_object_mut()
        .map(|o| o.entry("metadata").or_insert_with(|| json!({})));
    if let Some(Value::Object(meta)) = meta {
        meta.insert("name".to_string(), json!(id.name));
        match reg.scope {
            ResourceScope::Namespaced => {
                meta.insert("namespace".to_string(), json!(id.namespace));
            }
            ResourceScope::Cluster => {
                meta.remove("namespace");
            }
        }
    }
}

/// Derives the store key from the object's metadata, enforcing the
/// registered scope.
fn object_id(reg: &RegisteredType, obj: &Value) -> Result<NamespacedName> {
    let name = meta::name_of(obj);
    if name.is_empty() {
        return Err(Error::validation("metadata.name is required".to_string()));
    }
    let namespace = meta::namespace_of(obj);
    match reg.scope {
        ResourceScope::Namespaced if namespace.is_empty() => Err(Error::validation(format!(
            "{} is namespaced: metadata.namespace is required",
            reg.resource
        ))),
        ResourceScope::Cluster if !namespace.is_empty() => Err(Error::validation(format!(
            "{} is cluster scoped: metadata.namespace must be empty",
            reg.resource
        ))),
        _ => Ok(NamespacedName::new(namespace, name)),
    }
}

fn validate_against(reg: &RegisteredType, obj: &Value) -> Result<()> {
    if let Some(descriptor) = &reg.descriptor {
        descriptor.from_value(obj.clone())?;
    }
    Ok(())
}
