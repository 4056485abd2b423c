//! Typed JSON Patch (RFC 6902) document.
//!
//! Every mutation the webhook returns is assembled here as a list of typed
//! `add` operations and serialized generically, so the wire bytes are always a
//! well-formed JSON array regardless of how many fragments were combined.

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation};
use serde::Serialize;

use super::error::Result;

/// Build a JSON pointer from unescaped reference tokens.
///
/// Tokens are escaped per RFC 6901, so annotation keys containing `/` or `~`
/// are safe to pass through.
pub fn pointer<'a>(tokens: impl IntoIterator<Item = &'a str>) -> PointerBuf {
    PointerBuf::from_tokens(tokens)
}

/// Ordered sequence of `add` operations.
///
/// Order is significant: `/-` appends are positional relative to the document
/// produced by the preceding operations.
#[derive(Debug, Clone, Default)]
pub struct PatchDocument {
    operations: Vec<AddOperation>,
}

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `add` operation, serializing `value` into its JSON form.
    pub fn add<T: Serialize>(&mut self, path: PointerBuf, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.operations.push(AddOperation { path, value });
        Ok(())
    }

    /// Append every operation of `other`, preserving its order.
    pub fn extend(&mut self, other: PatchDocument) {
        self.operations.extend(other.operations);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Paths of all operations, in order
    pub fn paths(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| op.path.to_string())
            .collect()
    }

    pub fn operations(&self) -> &[AddOperation] {
        &self.operations
    }

    /// Convert into the `json_patch` representation
    pub fn into_patch(self) -> Patch {
        Patch(
            self.operations
                .into_iter()
                .map(PatchOperation::Add)
                .collect(),
        )
    }

    /// Serialize to the RFC 6902 wire format
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let patch = self.clone().into_patch();
        Ok(serde_json::to_vec(&patch)?)
    }
}
