//! Format-agnostic tree value for manifest and config inspection.

use std::collections::BTreeMap;

use serde_json::Value;

/// Leaf value of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number, kept as its JSON text so that `1` and `1.0` stay distinct.
    Number(String),
    /// String.
    String(String),
}

/// Tagged tree value.
///
/// Call sites match on the variant instead of probing the shape of an
/// untyped value.
///
/// # Examples
///
/// ```
/// use distrolint_core::types::Node;
///
/// let a = Node::from(serde_json::json!({"Name": "Ubuntu", "Default": true}));
/// let b = Node::from(serde_json::json!({"Default": true, "Name": "Ubuntu"}));
/// assert!(a.structurally_equal(&b));
/// assert_eq!(a.get("Name").and_then(|n| n.as_str()), Some("Ubuntu"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A leaf value.
    Scalar(Scalar),
    /// An ordered list.
    Sequence(Vec<Node>),
    /// A key/value map.
    Mapping(BTreeMap<String, Node>),
}

impl Node {
    /// Compares two trees by structure and content.
    ///
    /// Mapping key order is irrelevant; sequence order is significant.
    #[must_use]
    pub fn structurally_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_equal(y))
            }
            (Self::Mapping(a), Self::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key).is_some_and(|other| value.structurally_equal(other))
                    })
            }
            (Self::Scalar(_) | Self::Sequence(_) | Self::Mapping(_), _) => false,
        }
    }

    /// Returns the child of a mapping node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(map) => map.get(key),
            Self::Scalar(_) | Self::Sequence(_) => None,
        }
    }

    /// Returns the string content of a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the value of a boolean scalar.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns the items of a sequence node.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries of a mapping node.
    #[must_use]
    pub const fn as_mapping(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(Scalar::Number(n.to_string())),
            Value::String(s) => Self::Scalar(Scalar::String(s)),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_order_irrelevant() {
        let a = Node::from(json!({"a": 1, "b": [1, 2]}));
        let b = Node::from(json!({"b": [1, 2], "a": 1}));
        assert!(a.structurally_equal(&b));
    }

    #[test]
    fn test_sequence_order_matters() {
        let a = Node::from(json!([1, 2]));
        let b = Node::from(json!([2, 1]));
        assert!(!a.structurally_equal(&b));
    }

    #[test]
    fn test_variant_mismatch() {
        let a = Node::from(json!("1"));
        let b = Node::from(json!(1));
        assert!(!a.structurally_equal(&b));

        let a = Node::from(json!([]));
        let b = Node::from(json!({}));
        assert!(!a.structurally_equal(&b));
    }

    #[test]
    fn test_extra_key_detected() {
        let a = Node::from(json!({"Name": "x"}));
        let b = Node::from(json!({"Name": "x", "Default": false}));
        assert!(!a.structurally_equal(&b));
        assert!(!b.structurally_equal(&a));
    }

    #[test]
    fn test_accessors() {
        let node = Node::from(json!({"Default": true, "Items": [1]}));
        assert_eq!(node.get("Default").and_then(Node::as_bool), Some(true));
        assert_eq!(node.get("Items").and_then(Node::as_sequence).map(<[Node]>::len), Some(1));
        assert!(node.get("Missing").is_none());
        assert!(node.as_str().is_none());
    }
}
