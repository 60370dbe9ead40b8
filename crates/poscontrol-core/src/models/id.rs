use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Largest magnitude below which every whole `f64` is an exact integer (2^53)
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

/// Server-assigned identifier.
///
/// The backend emits ids as JSON numbers for most entities and as strings
/// for a few, and the two forms show up interchangeably in references
/// (`assignedStationIds` holds numbers while `station.id` may be text).
/// Equality, ordering and hashing use the text alone, so `7` and `"7"` are
/// the same id. Serialization writes back the form that was received:
/// `"007"` stays a string.
#[derive(Debug, Clone)]
pub struct EntityId {
    text: String,
    numeric: bool,
}

impl EntityId {
    /// A textual id. Written back as a JSON string.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            text: id.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self {
            text: n.to_string(),
            numeric: true,
        }
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.text.parse::<i64>() {
                return serializer.serialize_i64(n);
            }
            if let Ok(n) = self.text.parse::<u64>() {
                return serializer.serialize_u64(n);
            }
        }
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl de::Visitor<'_> for IdVisitor {
            type Value = EntityId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric or string identifier")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
                Ok(EntityId::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
                Ok(EntityId {
                    text: v.to_string(),
                    numeric: true,
                })
            }

            // Some serializers write whole numbers as `5.0`
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntityId, E> {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_F64 {
                    Ok(EntityId::from(v as i64))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(v), &self))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
                if v.trim().is_empty() {
                    return Err(E::invalid_value(de::Unexpected::Str(v), &self));
                }
                Ok(EntityId::new(v))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_numbers_and_strings() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"[7, "42", "st-9"]"#).unwrap();
        assert_eq!(ids, vec![EntityId::from(7), EntityId::from("42"), EntityId::from("st-9")]);
    }

    #[test]
    fn test_serializes_in_received_form() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"[42, "42", "007", "+5", "st-9"]"#).unwrap();
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, r#"[42,"42","007","+5","st-9"]"#);
    }

    #[test]
    fn test_numeric_and_text_forms_are_equal() {
        assert_eq!(EntityId::from(7), EntityId::from("7"));
        assert_ne!(EntityId::from(7), EntityId::from("007"));
        let set: std::collections::HashSet<EntityId> = [EntityId::from(13)].into_iter().collect();
        assert!(set.contains(&EntityId::from("13")));
    }

    #[test]
    fn test_accepts_whole_floats() {
        let ids: Vec<EntityId> = serde_json::from_str("[5.0, 12.0]").unwrap();
        assert_eq!(ids, vec![EntityId::from(5), EntityId::from(12)]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), "5");
    }

    #[test]
    fn test_rejects_blank_and_fractional_ids() {
        assert!(serde_json::from_str::<EntityId>(r#""  ""#).is_err());
        assert!(serde_json::from_str::<EntityId>("1.5").is_err());
        assert!(serde_json::from_str::<EntityId>("1e300").is_err());
        assert!(serde_json::from_str::<EntityId>("null").is_err());
    }
}
