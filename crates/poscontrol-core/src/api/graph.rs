//! Cycle-safe JSON object graphs.
//!
//! `serde_json::Value` is a tree and cannot express a back-reference, but
//! the records this client handles can: a station lists its users and each
//! user lists its stations. `JsonNode` shares containers through `Rc`, so the
//! same object can appear under several parents, including its own
//! descendants.
//!
//! Cycles built with `JsonNode` keep themselves alive; clear a container to
//! break the cycle when the graph is no longer needed.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::GatewayError;

/// Placeholder written where a container would recurse into itself.
pub const CIRCULAR_SENTINEL: &str = "[Circular Reference]";

#[derive(Clone)]
pub enum JsonNode {
    /// Null, bool, number or string
    Scalar(Value),
    Array(Rc<RefCell<Vec<JsonNode>>>),
    Object(Rc<RefCell<Vec<(String, JsonNode)>>>),
}

impl JsonNode {
    pub fn array() -> Self {
        JsonNode::Array(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn object() -> Self {
        JsonNode::Object(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        JsonNode::Scalar(value.into())
    }

    /// Append to an array node. Ignored for other kinds.
    pub fn push(&self, node: JsonNode) {
        if let JsonNode::Array(items) = self {
            items.borrow_mut().push(node);
        }
    }

    /// Set a property on an object node, replacing an existing key. Ignored
    /// for other kinds.
    pub fn insert(&self, key: impl Into<String>, node: JsonNode) {
        if let JsonNode::Object(fields) = self {
            let key = key.into();
            let mut fields = fields.borrow_mut();
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = node,
                None => fields.push((key, node)),
            }
        }
    }

    /// Drop all children of a container, breaking any cycle through it.
    pub fn clear(&self) {
        match self {
            JsonNode::Array(items) => items.borrow_mut().clear(),
            JsonNode::Object(fields) => fields.borrow_mut().clear(),
            JsonNode::Scalar(_) => {}
        }
    }

    fn identity(&self) -> Option<usize> {
        match self {
            JsonNode::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            JsonNode::Object(fields) => Some(Rc::as_ptr(fields) as *const () as usize),
            JsonNode::Scalar(_) => None,
        }
    }

    /// Convert to a tree, replacing every container that is reached again
    /// while it is still being walked with [`CIRCULAR_SENTINEL`].
    ///
    /// A container shared by siblings is not circular and is copied under
    /// each parent.
    pub fn strip_circular(&self) -> Value {
        let mut path = HashSet::new();
        self.to_value(&mut path, &mut |_| Value::String(CIRCULAR_SENTINEL.to_string()))
            .unwrap_or(Value::Null)
    }

    /// Serialize strictly, failing if the graph contains a cycle.
    pub fn to_json_string(&self) -> Result<String, GatewayError> {
        let mut path = HashSet::new();
        let mut found_cycle = false;
        let value = self.to_value(&mut path, &mut |_| {
            found_cycle = true;
            Value::Null
        });
        match value {
            Some(value) if !found_cycle => {
                serde_json::to_string(&value).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
            }
            _ => Err(GatewayError::CircularReference),
        }
    }

    fn to_value(
        &self,
        path: &mut HashSet<usize>,
        on_cycle: &mut dyn FnMut(&JsonNode) -> Value,
    ) -> Option<Value> {
        let Some(id) = self.identity() else {
            if let JsonNode::Scalar(value) = self {
                return Some(value.clone());
            }
            return None;
        };
        if !path.insert(id) {
            return Some(on_cycle(self));
        }
        let value = match self {
            JsonNode::Array(items) => {
                let items = items.borrow();
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(item.to_value(path, on_cycle)?);
                }
                Value::Array(out)
            }
            JsonNode::Object(fields) => {
                let fields = fields.borrow();
                let mut out = Map::new();
                for (key, node) in fields.iter() {
                    out.insert(key.clone(), node.to_value(path, on_cycle)?);
                }
                Value::Object(out)
            }
            JsonNode::Scalar(value) => value.clone(),
        };
        path.remove(&id);
        Some(value)
    }
}

impl From<Value> for JsonNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => JsonNode::Array(Rc::new(RefCell::new(
                items.into_iter().map(JsonNode::from).collect(),
            ))),
            Value::Object(fields) => JsonNode::Object(Rc::new(RefCell::new(
                fields.into_iter().map(|(k, v)| (k, JsonNode::from(v))).collect(),
            ))),
            scalar => JsonNode::Scalar(scalar),
        }
    }
}

impl fmt::Debug for JsonNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonNode({})", self.strip_circular())
    }
}

/// Clean a decoded payload. Parsed JSON is always a tree, so this only
/// normalizes it through the same walk used for in-process graphs.
pub fn strip_circular(value: Value) -> Value {
    JsonNode::from(value).strip_circular()
}

/// Whether a cleaned value still carries a circular placeholder anywhere.
pub fn contains_sentinel(value: &Value) -> bool {
    match value {
        Value::String(s) => s == CIRCULAR_SENTINEL,
        Value::Array(items) => items.iter().any(contains_sentinel),
        Value::Object(fields) => fields.values().any(contains_sentinel),
        _ => false,
    }
}
