//! Insertion-ordered maps with the tagged JSON representation
//! `{"_type":"map","map":[[key,value],...]}`.
//!
//! Native JSON objects do not guarantee key order across readers, and key
//! order in the output dictionaries is part of the contract with the
//! rendering stage. Maps whose order matters round-trip through this tagged
//! form; the consumer special-cases the `_type` marker when reviving.

use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMap<V>(pub IndexMap<String, V>);

impl<V> Default for TaggedMap<V> {
    fn default() -> Self {
        TaggedMap(IndexMap::new())
    }
}

impl<V> TaggedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V> std::ops::Deref for TaggedMap<V> {
    type Target = IndexMap<String, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<V> std::ops::DerefMut for TaggedMap<V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<V> FromIterator<(String, V)> for TaggedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        TaggedMap(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for TaggedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TaggedMap", 2)?;
        state.serialize_field("_type", "map")?;
        state.serialize_field("map", &Entries(&self.0))?;
        state.end()
    }
}

struct Entries<'a, V>(&'a IndexMap<String, V>);

impl<V: Serialize> Serialize for Entries<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for entry in self.0.iter() {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
struct TaggedMapRepr<V> {
    #[serde(rename = "_type")]
    type_tag: String,
    map: Vec<(String, V)>,
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for TaggedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TaggedMapRepr::<V>::deserialize(deserializer)?;
        if repr.type_tag != "map" {
            return Err(D::Error::custom(format!(
                "expected _type \"map\", found \"{}\"",
                repr.type_tag
            )));
        }
        Ok(repr.map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag_in_insertion_order() {
        let mut map: TaggedMap<Vec<String>> = TaggedMap::new();
        map.insert("zulu".to_string(), vec!["z".to_string()]);
        map.insert("alpha".to_string(), vec!["a".to_string()]);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"_type":"map","map":[["zulu",["z"]],["alpha",["a"]]]}"#);
    }

    #[test]
    fn round_trips_nested_maps() {
        let mut inner: TaggedMap<Vec<String>> = TaggedMap::new();
        inner.insert("verb".to_string(), vec!["past".to_string()]);
        let mut outer: TaggedMap<TaggedMap<Vec<String>>> = TaggedMap::new();
        outer.insert("ran".to_string(), inner);

        let json = serde_json::to_string(&outer).unwrap();
        let revived: TaggedMap<TaggedMap<Vec<String>>> = serde_json::from_str(&json).unwrap();
        assert_eq!(revived, outer);
    }

    #[test]
    fn rejects_wrong_type_tag() {
        let result: Result<TaggedMap<Vec<String>>, _> =
            serde_json::from_str(r#"{"_type":"set","map":[]}"#);
        assert!(result.is_err());
    }
}
