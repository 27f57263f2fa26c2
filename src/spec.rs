//! Specification files
//!
//! A specification is a JSON document describing one group of test cases:
//!
//! ```json
//! {
//!   "title": "Action: padding_oracle",
//!   "description": "...",
//!   "testcases": { "t1": { "action": "add", "arguments": { "a": 1 } } },
//!   "expectedResults": { "t1": { "sum": 2 } },
//!   "requiredSidecars": ["oracle"]
//! }
//! ```
//!
//! `testcases` keeps declaration order, which matters for truncation.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::HarnessError;

/// A single test case: the action and its arguments.
///
/// Any other fields are kept so a staged copy forwards them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub action: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Test cases in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCases(Vec<(String, TestCase)>);

impl TestCases {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(id, _)| id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.0.iter().find(|(k, _)| k == id).map(|(_, case)| case)
    }

    /// Keep only the first `n` cases.
    pub fn truncate(&mut self, n: usize) {
        self.0.truncate(n);
    }
}

impl Serialize for TestCases {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, case) in &self.0 {
            map.serialize_entry(id, case)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TestCases {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TestCasesVisitor;

        impl<'de> Visitor<'de> for TestCasesVisitor {
            type Value = TestCases;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of test case ids to test cases")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut cases = TestCases(Vec::with_capacity(access.size_hint().unwrap_or(0)));
                while let Some((id, case)) = access.next_entry::<String, TestCase>()? {
                    if cases.get(&id).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate test case id '{}'",
                            id
                        )));
                    }
                    cases.0.push((id, case));
                }
                Ok(cases)
            }
        }

        deserializer.deserialize_map(TestCasesVisitor)
    }
}

/// An in-memory specification file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub testcases: TestCases,
    /// `null` marks an optional expectation: no reply required.
    pub expected_results: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub required_sidecars: BTreeSet<String>,
    /// Unknown top-level fields, forwarded untouched when staged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Specification {
    /// Read and parse a specification file.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::from(e).with_path(path))?;
        Self::from_json(&data).map_err(|e| e.with_path(path))
    }

    /// Parse a specification from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when every required sidecar is in `available`.
    pub fn is_supported_by(&self, available: &BTreeSet<String>) -> bool {
        self.required_sidecars.is_subset(available)
    }

    /// Required sidecars that are not in `available`.
    pub fn missing_sidecars<'a>(&'a self, available: &'a BTreeSet<String>) -> Vec<&'a str> {
        self.required_sidecars
            .difference(available)
            .map(|s| s.as_str())
            .collect()
    }
}
