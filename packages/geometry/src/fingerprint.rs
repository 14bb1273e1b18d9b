//! Structural fingerprints of `GeoJSON` payloads.
//!
//! The payload is reduced to its types and geometries (feature properties,
//! ids, `bbox` and any foreign members are dropped), serialized with a fixed
//! key order, and hashed with a 32-bit rolling polynomial hash. Equal
//! geometry always yields an equal fingerprint. Collisions are possible;
//! this is for change detection only.

use std::fmt;

use serde_json::{Map, Value};

/// 32-bit digest of a payload's structural content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryFingerprint(i32);

impl GeometryFingerprint {
    /// Raw digest value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for GeometryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Fingerprints a `GeoJSON` payload.
///
/// Never fails: malformed payloads still reduce to something hashable.
#[must_use]
pub fn fingerprint(payload: &Value) -> GeometryFingerprint {
    let reduced = reduce_payload(payload);
    GeometryFingerprint(rolling_hash(&reduced.to_string()))
}

/// `h = h * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0_i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

fn reduce_payload(payload: &Value) -> Value {
    match payload.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = payload
                .get("features")
                .and_then(Value::as_array)
                .map(|features| features.iter().map(reduce_feature).collect())
                .unwrap_or_default();
            object([
                ("type", Value::from("FeatureCollection")),
                ("features", Value::Array(features)),
            ])
        }
        Some("Feature") => reduce_feature(payload),
        _ => reduce_geometry(payload),
    }
}

fn reduce_feature(feature: &Value) -> Value {
    object([
        ("type", field(feature, "type")),
        (
            "geometry",
            feature.get("geometry").map_or(Value::Null, reduce_geometry),
        ),
    ])
}

fn reduce_geometry(geometry: &Value) -> Value {
    if !geometry.is_object() {
        return Value::Null;
    }
    let mut reduced = object([
        ("type", field(geometry, "type")),
        ("coordinates", field(geometry, "coordinates")),
    ]);
    if let (Some(members), Value::Object(map)) = (
        geometry.get("geometries").and_then(Value::as_array),
        &mut reduced,
    ) {
        map.insert(
            "geometries".to_string(),
            Value::Array(members.iter().map(reduce_geometry).collect()),
        );
    }
    reduced
}

fn field(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}

/// Outcome of comparing a payload against the last recorded fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryChange {
    /// The payload differs from the last recorded one (or nothing was
    /// recorded yet).
    Changed(GeometryFingerprint),
    /// The payload is structurally identical to the last recorded one.
    Unchanged(GeometryFingerprint),
}

impl GeometryChange {
    /// The payload's fingerprint.
    #[must_use]
    pub const fn fingerprint(self) -> GeometryFingerprint {
        match self {
            Self::Changed(fp) | Self::Unchanged(fp) => fp,
        }
    }

    /// Whether the analysis needs to run again.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Remembers the fingerprint of the last successfully analysed payload.
#[derive(Debug, Default, Clone)]
pub struct ChangeDetector {
    last: Option<GeometryFingerprint>,
}

impl ChangeDetector {
    /// Creates a detector with nothing recorded.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Compares a payload with the recorded fingerprint without recording
    /// it.
    #[must_use]
    pub fn check(&self, payload: &Value) -> GeometryChange {
        let fp = fingerprint(payload);
        if self.last == Some(fp) {
            GeometryChange::Unchanged(fp)
        } else {
            GeometryChange::Changed(fp)
        }
    }

    /// Records a fingerprint as the latest analysed payload.
    pub const fn record(&mut self, fp: GeometryFingerprint) {
        self.last = Some(fp);
    }

    /// Compares and records in one step.
    pub fn observe(&mut self, payload: &Value) -> GeometryChange {
        let change = self.check(payload);
        self.record(change.fingerprint());
        change
    }

    /// Forgets the recorded fingerprint so the next payload always counts
    /// as changed.
    pub const fn reset(&mut self) {
        self.last = None;
    }

    /// The recorded fingerprint, if any.
    #[must_use]
    pub const fn last(&self) -> Option<GeometryFingerprint> {
        self.last
    }
}
