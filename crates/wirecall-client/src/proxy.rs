//! Method-table-driven proxy surface.
//!
//! User code declares the signatures it intends to call; at build time each
//! declaration is resolved to an index in a [`MethodTable`] of descriptors.
//! Invoking a slot packs the positional arguments and sends a notification
//! (void return shape) or a request (value/future return shapes). This
//! dispatch-table strategy replaces runtime code generation: a generated
//! facade is just a thin wrapper over `(table, invoke(index, args))`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use wirecall_protocol::{MethodSignature, RequestParams, ReturnShape, SignatureError};

use crate::client::RpcClient;
use crate::error::{ClientError, ClientResult};

/// An immutable, index-addressed collection of method descriptors — the
/// remote contract as the client knows it.
pub struct MethodTable {
    entries: Vec<MethodSignature>,
}

impl MethodTable {
    /// Validate and freeze a set of descriptors.
    pub fn new(entries: Vec<MethodSignature>) -> Result<Self, SignatureError> {
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }

    pub fn get(&self, index: usize) -> Option<&MethodSignature> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a declared signature to its table index by identity
    /// (name, arity, return shape).
    pub fn resolve(&self, declared: &MethodSignature) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.matches_declaration(declared))
    }
}

/// Maps declared call-site signatures onto a [`MethodTable`] at build time.
pub struct ProxyBinder {
    table: Arc<MethodTable>,
    declarations: Vec<MethodSignature>,
}

impl ProxyBinder {
    pub fn new(table: Arc<MethodTable>) -> Self {
        Self {
            table,
            declarations: Vec::new(),
        }
    }

    /// Declare a signature the caller intends to invoke. Slots are numbered
    /// in declaration order.
    pub fn declare(mut self, signature: MethodSignature) -> Self {
        self.declarations.push(signature);
        self
    }

    /// Resolve every declaration and bind the proxy to a client. Unresolved
    /// declarations stay in the table as dead slots that fail with
    /// [`ClientError::NotSupported`] when invoked.
    pub fn bind(self, client: Arc<RpcClient>) -> RpcProxy {
        let slots = self
            .declarations
            .iter()
            .map(|declared| {
                let resolved = self.table.resolve(declared);
                if resolved.is_none() {
                    debug!(method = %declared.name, "declared signature did not resolve");
                }
                (declared.name.clone(), resolved)
            })
            .collect();
        RpcProxy {
            client,
            table: self.table,
            slots,
        }
    }
}

/// The invoker behind a generated facade: call slots by declaration index.
pub struct RpcProxy {
    client: Arc<RpcClient>,
    table: Arc<MethodTable>,
    /// Declaration order → (declared name, resolved table index).
    slots: Vec<(String, Option<usize>)>,
}

impl RpcProxy {
    /// Invoke the slot declared at `declaration`, packing `args` positionally.
    ///
    /// Void-returning descriptors go out as notifications and resolve to
    /// `Value::Null` once flushed; the rest are requests awaited to their
    /// result.
    pub async fn invoke(&self, declaration: usize, args: Vec<Value>) -> ClientResult<Value> {
        let (name, resolved) = self
            .slots
            .get(declaration)
            .ok_or_else(|| ClientError::NotSupported(format!("declaration #{declaration}")))?;
        let Some(index) = resolved else {
            return Err(ClientError::NotSupported(name.clone()));
        };
        let Some(signature) = self.table.get(*index) else {
            return Err(ClientError::NotSupported(name.clone()));
        };

        let params = Some(RequestParams::Array(args));
        match signature.returns {
            ReturnShape::Void => {
                self.client.send_notification(&signature.name, params).await?;
                Ok(Value::Null)
            }
            ReturnShape::Value | ReturnShape::Future => {
                self.client.send_request(&signature.name, params).await
            }
        }
    }

    /// Number of declared slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether a declared slot resolved to a descriptor.
    pub fn is_supported(&self, declaration: usize) -> bool {
        matches!(self.slots.get(declaration), Some((_, Some(_))))
    }
}
