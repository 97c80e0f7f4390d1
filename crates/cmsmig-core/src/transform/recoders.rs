//! Recoders for values stored by retired community editors.

use serde_json::{json, Value};

use super::property::{PropertyTransform, TransformContext, TransformError};

/// Zoom level used when a stored location carries none.
pub const DEFAULT_MAP_ZOOM: u32 = 17;

/// Rewrites a `lat,lng,zoom` location into the map editor's JSON shape.
///
/// Anything that is not three comma-separated parts with numeric
/// coordinates is left as is.
#[derive(Debug, Clone, Default)]
pub struct MapLocationTransform;

impl PropertyTransform for MapLocationTransform {
    fn name(&self) -> &'static str {
        "map-location"
    }

    fn map(&self, _ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let parts: Vec<&str> = from
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let [lat, lng, zoom] = parts.as_slice() else {
            return Ok(Some(from.to_string()));
        };
        if lat.parse::<f64>().is_err() || lng.parse::<f64>().is_err() {
            return Ok(Some(from.to_string()));
        }
        let zoom = zoom.parse::<u32>().unwrap_or(DEFAULT_MAP_ZOOM);

        let location = json!({
            "address": {
                "coordinates": { "lat": lat, "lng": lng }
            },
            "mapconfig": {
                "zoom": zoom,
                "maptype": "roadmap",
                "centerCoordinates": { "lat": lat, "lng": lng }
            }
        });
        Ok(Some(serde_json::to_string(&location)?))
    }
}

/// Collapses a picked-items array of `{key, label}` objects to its keys.
///
/// One item becomes its bare key, several become `[k1,k2]`. Values that are
/// not such an array are left as is.
#[derive(Debug, Clone, Default)]
pub struct PickedKeysTransform;

impl PropertyTransform for PickedKeysTransform {
    fn name(&self) -> &'static str {
        "picked-keys"
    }

    fn map(&self, _ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(from) else {
            return Ok(Some(from.to_string()));
        };
        let keys: Option<Vec<String>> = items
            .iter()
            .map(|item| match item.get("key")? {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect();

        match keys.as_deref() {
            None | Some([]) => Ok(Some(from.to_string())),
            Some([key]) => Ok(Some(key.clone())),
            Some(keys) => Ok(Some(format!("[{}]", keys.join(",")))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryRepository;
    use crate::transform::ReferenceCache;

    fn map(transform: &dyn PropertyTransform, from: &str) -> String {
        let repo = InMemoryRepository::new();
        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&repo, &cache);
        transform.map(&ctx, from).unwrap().unwrap()
    }

    #[test]
    fn test_map_location() {
        let out: Value = serde_json::from_str(&map(&MapLocationTransform, "51.5072, -0.1276, 12")).unwrap();
        assert_eq!(
            out,
            json!({
                "address": {"coordinates": {"lat": "51.5072", "lng": "-0.1276"}},
                "mapconfig": {
                    "zoom": 12,
                    "maptype": "roadmap",
                    "centerCoordinates": {"lat": "51.5072", "lng": "-0.1276"}
                }
            })
        );

        let out: Value = serde_json::from_str(&map(&MapLocationTransform, "1,2,far")).unwrap();
        assert_eq!(out["mapconfig"]["zoom"], json!(DEFAULT_MAP_ZOOM));
    }

    #[test]
    fn test_map_location_leaves_other_values() {
        for from in ["", "51.5,-0.1", "north,south,3", r#"{"address":{}}"#] {
            assert_eq!(map(&MapLocationTransform, from), from);
        }
        let migrated = map(&MapLocationTransform, "1,2,3");
        assert_eq!(map(&MapLocationTransform, &migrated), migrated);
    }

    #[test]
    fn test_picked_keys() {
        assert_eq!(map(&PickedKeysTransform, r#"[{"key":"red","label":"Red"}]"#), "red");
        assert_eq!(
            map(&PickedKeysTransform, r#"[{"key":"1","label":"One"},{"key":2,"label":"Two"}]"#),
            "[1,2]"
        );
        for from in ["red", "[]", "[1,2]", r#"[{"label":"x"}]"#, "{not json"] {
            assert_eq!(map(&PickedKeysTransform, from), from);
        }
    }
}
