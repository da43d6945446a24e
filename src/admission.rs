//! Mutating admission webhooks: rule matching and the synchronous
//! HTTP round trip performed before an object is persisted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// What is being admitted: the request coordinates a webhook rule is
/// matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub group: String,
    /// Plural resource name.
    pub resource: String,
    /// Empty for the main resource.
    pub subresource: String,
    /// `CREATE`, `UPDATE`, ...
    pub operation: String,
}

impl ResourceInfo {
    pub fn create(group: impl Into<String>, resource: impl Into<String>) -> Self {
        ResourceInfo {
            group: group.into(),
            resource: resource.into(),
            subresource: String::new(),
            operation: "CREATE".to_string(),
        }
    }
}

/// One rule of a webhook configuration.
///
/// Resource tokens follow the admissionregistration conventions:
/// a bare name matches that top-level resource only, `name/*` matches
/// the resource and its subresources, `/sub` matches that subresource
/// on any resource, and `*` is a wildcard on either side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRule {
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    /// Listed so a configured value is detected, not served.
    #[serde(default)]
    pub scope: Option<String>,
}

impl WebhookRule {
    pub fn matches(&self, info: &ResourceInfo) -> bool {
        let op_ok = self
            .operations
            .iter()
            .any(|op| op == "*" || op.eq_ignore_ascii_case(&info.operation));
        let group_ok = self
            .api_groups
            .iter()
            .any(|g| g == "*" || *g == info.group);
        let resource_ok = self
            .resources
            .iter()
            .any(|token| resource_token_matches(token, info));
        op_ok && group_ok && resource_ok
    }
}

fn resource_token_matches(token: &str, info: &ResourceInfo) -> bool {
    match token.split_once('/') {
        // No slash: top-level resources only, never subresources. The
        // empty token behaves as a top-level wildcard.
        None => {
            info.subresource.is_empty()
                && (token.is_empty() || token == "*" || token == info.resource)
        }
        Some((resource, subresource)) => {
            let resource_ok =
                resource.is_empty() || resource == "*" || resource == info.resource;
            let subresource_ok = subresource == "*" || subresource == info.subresource;
            resource_ok && subresource_ok
        }
    }
}

/// A registered mutating webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutatingWebhook {
    pub name: String,
    /// Endpoint the AdmissionReview is POSTed to.
    pub url: String,
    /// PEM bundle used as the TLS trust root for this webhook.
    #[serde(default)]
    pub ca_bundle: Option<String>,
    #[serde(default)]
    pub rules: Vec<WebhookRule>,
    // Knobs this server does not implement. They are rejected at
    // registration rather than silently ignored.
    #[serde(default)]
    pub namespace_selector: Option<Value>,
    #[serde(default)]
    pub object_selector: Option<Value>,
    #[serde(default)]
    pub match_policy: Option<String>,
}

impl MutatingWebhook {
    fn validate(&self) -> Result<()> {
        let unsupported = |knob: &str| {
            Err(Error::UnsupportedConfiguration(format!(
                "webhook {:?} sets {}",
                self.name, knob
            )))
        };
        if self.namespace_selector.is_some() {
            return unsupported("namespaceSelector");
        }
        if self.object_selector.is_some() {
            return unsupported("objectSelector");
        }
        if self.match_policy.is_some() {
            return unsupported("matchPolicy");
        }
        if let Some(rule) = self.rules.iter().find(|rule| rule.scope.is_some()) {
            return Err(Error::UnsupportedConfiguration(format!(
                "webhook {:?} sets scope {:?} on a rule",
                self.name,
                rule.scope.as_deref().unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn matches(&self, info: &ResourceInfo) -> bool {
        self.rules.iter().any(|rule| rule.matches(info))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionReviewRequest<'a> {
    api_version: &'static str,
    kind: &'static str,
    request: AdmissionRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionRequest<'a> {
    uid: String,
    operation: &'a str,
    resource: ReviewResource<'a>,
    object: &'a Value,
}

#[derive(Serialize)]
struct ReviewResource<'a> {
    group: &'a str,
    resource: &'a str,
    subresource: &'a str,
}

#[derive(Deserialize)]
struct AdmissionReviewResponse {
    response: AdmissionResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionResponse {
    allowed: bool,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    patch: Option<json_patch::Patch>,
}

/// The ordered chain of webhooks consulted before a create is
/// persisted.
#[derive(Default)]
pub struct AdmissionPipeline {
    webhooks: Mutex<Vec<MutatingWebhook>>,
}

impl AdmissionPipeline {
    pub fn new() -> Self {
        AdmissionPipeline::default()
    }

    /// Registers a webhook after rejecting configuration this server
    /// cannot honor.
    pub fn register(&self, webhook: MutatingWebhook) -> Result<()> {
        webhook.validate()?;
        let mut webhooks = self.webhooks.lock().unwrap();
        webhooks.push(webhook);
        Ok(())
    }

    /// Runs every matching webhook over the incoming `object`, in
    /// registration order, threading mutations through.
    pub fn before_create(&self, info: &ResourceInfo, mut object: Value) -> Result<Value> {
        let webhooks = self.webhooks.lock().unwrap().clone();
        for webhook in &webhooks {
            if !webhook.matches(info) {
                continue;
            }
            tracing::debug!(webhook = %webhook.name, resource = %info.resource, "calling admission webhook");
            let response = call_webhook(webhook, info, &object)?;
            object = apply_review(&webhook.name, object, response)?;
        }
        Ok(object)
    }
}

fn call_webhook(
    webhook: &MutatingWebhook,
    info: &ResourceInfo,
    object: &Value,
) -> Result<AdmissionResponse> {
    let transport = |err: reqwest::Error| Error::Transport(err.to_string());

    let mut builder = reqwest::blocking::Client::builder();
    if let Some(pem) = &webhook.ca_bundle {
        let cert = reqwest::Certificate::from_pem(pem.as_bytes())
            .map_err(|err| Error::Transport(format!("bad caBundle: {}", err)))?;
        builder = builder.add_root_certificate(cert);
    }
    let client = builder.build().map_err(transport)?;

    let review = AdmissionReviewRequest {
        api_version: "admission.k8s.io/v1",
        kind: "AdmissionReview",
        request: AdmissionRequest {
            uid: uuid::Uuid::new_v4().to_string(),
            operation: &info.operation,
            resource: ReviewResource {
                group: &info.group,
                resource: &info.resource,
                subresource: &info.subresource,
            },
            object,
        },
    };

    let parsed: AdmissionReviewResponse = client
        .post(&webhook.url)
        .json(&review)
        .send()
        .map_err(transport)?
        .error_for_status()
        .map_err(transport)?
        .json()
        .map_err(transport)?;
    Ok(parsed.response)
}

/// Applies one webhook's verdict to the object: denial aborts, an
/// RFC 6902 patch mutates.
fn apply_review(webhook: &str, mut object: Value, response: AdmissionResponse) -> Result<Value> {
    if !response.allowed {
        let message = response
            .status
            .as_ref()
            .and_then(|status| status.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("denied")
            .to_string();
        return Err(Error::AdmissionDenied {
            webhook: webhook.to_string(),
            message,
        });
    }
    if let Some(patch) = response.patch {
        json_patch::patch(&mut object, &patch).map_err(|err| {
            Error::validation(format!("webhook {:?} returned a bad patch: {}", webhook, err))
        })?;
    }
    Ok(object)
}
