//! Order-preserving JSON trees that can be refreshed in place.
//!
//! A [`Record`] keeps object keys in the order the bridge sent them.
//! [`Record::merge`] folds a newer reply into an existing tree: keys missing
//! from the reply are pruned, nested records are merged recursively and
//! everything else is overwritten. Keys that survive keep their position,
//! new keys are appended.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// One value in a tree: a nested record or any other JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Value),
    Record(Record),
}

/// A JSON object with insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    entries: Vec<(String, Node)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, n)| n)
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Set `key`, keeping its position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = node,
            None => self.entries.push((key, node)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Fold `source` into this record.
    ///
    /// # Example
    ///
    /// ```
    /// use hue_lights_rs::merge::Record;
    ///
    /// let mut lights: Record = serde_json::from_str(
    ///     r#"{"1": {"name": "Desk", "state": {"on": true, "bri": 10}}, "2": {"name": "Hall"}}"#,
    /// ).unwrap();
    /// let reply: Record = serde_json::from_str(
    ///     r#"{"3": {"name": "Porch"}, "1": {"name": "Desk", "state": {"on": false}}}"#,
    /// ).unwrap();
    ///
    /// lights.merge(reply);
    /// assert_eq!(lights.keys().collect::<Vec<_>>(), ["1", "3"]);
    /// assert_eq!(
    ///     serde_json::to_string(&lights).unwrap(),
    ///     r#"{"1":{"name":"Desk","state":{"on":false}},"3":{"name":"Porch"}}"#
    /// );
    /// ```
    pub fn merge(&mut self, source: Record) {
        self.entries.retain(|(key, _)| source.contains_key(key));

        for (key, node) in source.entries {
            let Some(slot) = self.get_mut(&key) else {
                self.entries.push((key, node));
                continue;
            };
            match (slot, node) {
                (Node::Record(dest), Node::Record(src)) => dest.merge(src),
                (slot, node) => *slot = node,
            }
        }
    }

    /// Deserialize the record into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(self).map_err(Error::JsonDump)?;
        serde_json::from_value(value).map_err(Error::JsonLoad)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::Record(Record {
                entries: map.into_iter().map(|(k, v)| (k, Node::from(v))).collect(),
            }),
            other => Node::Scalar(other),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Scalar(value) => value,
            Node::Record(record) => Value::from(record),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(
            record
                .entries
                .into_iter()
                .map(|(k, n)| (k, Value::from(n)))
                .collect(),
        )
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(value) => value.serialize(serializer),
            Node::Record(record) => record.serialize(serializer),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Node, D::Error> {
        Node::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Node::Scalar(Value::Array(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Node, A::Error> {
        let mut record = Record::new();
        while let Some((key, node)) = map.next_entry::<String, Node>()? {
            record.insert(key, node);
        }
        Ok(Node::Record(record))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Node, D::Error> {
        d.deserialize_any(NodeVisitor)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Record, D::Error> {
        match Node::deserialize(d)? {
            Node::Record(record) => Ok(record),
            Node::Scalar(_) => Err(de::Error::custom("expected a JSON object")),
        }
    }
}
