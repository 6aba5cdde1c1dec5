//! Document envelope helpers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EnvelopeError, EnvelopeResult};

/// Name of the root element of every service document.
pub const ROOT_ELEMENT: &str = "fw4ex";

/// Key under which element attributes are stored.
pub const ATTRIBUTES_KEY: &str = "$";

/// An element whose only interesting content is its attribute bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element<A> {
    #[serde(rename = "$")]
    pub attrs: A,
}

/// A repeated child element.
///
/// Tree converters collapse a child that occurs once into a bare object and
/// keep repeated children as an array; both decode here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::Many(items) => items.len(),
            OneOrMany::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Borrow the children of the `fw4ex` root element.
pub fn root(document: &Value) -> EnvelopeResult<&Map<String, Value>> {
    document
        .get(ROOT_ELEMENT)
        .and_then(Value::as_object)
        .ok_or(EnvelopeError::MissingRoot(ROOT_ELEMENT))
}

/// Find which of `expected` appears under the root and return it with its
/// subtree. The first match in `expected` order wins.
pub fn select<'a>(
    document: &'a Value,
    expected: &[&'static str],
) -> EnvelopeResult<(&'static str, &'a Value)> {
    let children = root(document)?;

    for name in expected {
        if let Some(subtree) = children.get(*name) {
            return Ok((name, subtree));
        }
    }

    let found: Vec<&str> = children
        .keys()
        .map(String::as_str)
        .filter(|k| *k != ATTRIBUTES_KEY)
        .collect();
    Err(EnvelopeError::UnexpectedElement {
        expected: expected.join(", "),
        found: found.join(", "),
    })
}

/// Decode one subtree into its typed shape, naming the element on failure.
pub fn decode_element<T: DeserializeOwned>(element: &str, subtree: &Value) -> EnvelopeResult<T> {
    serde_json::from_value(subtree.clone()).map_err(|e| EnvelopeError::malformed(element, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_or_many_collapsed_child() {
        let one: OneOrMany<u32> = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(one.into_vec(), vec![7]);

        let many: OneOrMany<u32> = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(many.len(), 2);
        assert!(OneOrMany::<u32>::default().is_empty());
    }

    #[test]
    fn test_select_reports_found_children() {
        let doc = json!({"fw4ex": {"$": {"version": "1"}, "somethingElse": {}}});
        let err = select(&doc, &["jobStudentReport"]).unwrap_err();
        match err {
            EnvelopeError::UnexpectedElement { expected, found } => {
                assert_eq!(expected, "jobStudentReport");
                assert_eq!(found, "somethingElse");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_root() {
        let doc = json!({"html": {}});
        assert!(matches!(root(&doc), Err(EnvelopeError::MissingRoot("fw4ex"))));
    }
}
