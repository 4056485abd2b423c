//! AdmissionReview v1 wire types.
//!
//! Only the fields the webhook reads or writes are modeled. The request object
//! is kept as raw JSON and decoded per use case, so one request type serves
//! pods and pod attach options alike.

use std::fmt;

use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};

use crate::injection::{InjectionError, PatchDocument};

/// `apiVersion` of AdmissionReview v1
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// `kind` of AdmissionReview
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// Kubernetes AdmissionReview request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
}

impl AdmissionReview {
    /// Wrap a request the way the API server does
    pub fn new(request: AdmissionRequest) -> Self {
        Self {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_KIND.to_string(),
            request: Some(request),
        }
    }
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    #[serde(default)]
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    /// Core v1 pods
    pub fn pods() -> Self {
        Self {
            group: String::new(),
            version: "v1".to_string(),
            resource: "pods".to_string(),
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}, Resource={}", self.version, self.resource)
        } else {
            write!(f, "{}/{}, Resource={}", self.group, self.version, self.resource)
        }
    }
}

/// Options of a `pods/attach` connect request.
///
/// `kind`/`apiVersion` are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAttachOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
}

/// AdmissionReview response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// The type of patch returned in an [`AdmissionResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

/// AdmissionResponse contains the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    /// RFC 6902 patch, base64 encoded on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub status: String,
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `status` value of a failed admission
pub const STATUS_FAILURE: &str = "Failure";

impl AdmissionResponse {
    /// Allow the request unchanged
    pub fn allow(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            patch: None,
            patch_type: None,
            status: None,
        }
    }

    /// Deny the request as a policy decision (403)
    pub fn deny(uid: &str, message: &str, reason: Option<&str>) -> Self {
        Self::failure(uid, 403, message, reason)
    }

    /// Deny the request with an explicit status code
    pub fn failure(uid: &str, code: u16, message: &str, reason: Option<&str>) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            patch: None,
            patch_type: None,
            status: Some(AdmissionStatus {
                status: STATUS_FAILURE.to_string(),
                code,
                message: message.to_string(),
                reason: reason.map(String::from),
            }),
        }
    }

    /// Attach a JSON patch. An empty document leaves the response unpatched.
    pub fn with_patch(mut self, patch: &PatchDocument) -> Result<Self, InjectionError> {
        if patch.is_empty() {
            return Ok(self);
        }
        self.patch = Some(ByteString(patch.to_json_bytes()?));
        self.patch_type = Some(PatchType::JsonPatch);
        Ok(self)
    }

    /// Decoded patch operations, if any
    pub fn patch_operations(&self) -> Option<Result<serde_json::Value, serde_json::Error>> {
        self.patch
            .as_ref()
            .map(|bytes| serde_json::from_slice(&bytes.0))
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }

    pub fn reason(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.reason.as_deref())
    }

    pub fn into_review(self) -> AdmissionReviewResponse {
        AdmissionReviewResponse {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_KIND.to_string(),
            response: self,
        }
    }
}
