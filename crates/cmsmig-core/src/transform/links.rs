//! Recoders for structured link values stored as JSON objects.

use serde_json::{Map, Value};

use super::property::{PropertyTransform, TransformContext, TransformError};
use super::reference::{map_id_token, resolve_id_token};
use crate::content::BaseType;

/// Text of a scalar JSON value, the way it would be typed by a user.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_object(from: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(from) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Rewrites an internal related link from a document id to a reference.
///
/// The link's display name and icon are refreshed from the target node.
#[derive(Debug, Clone, Default)]
pub struct RelatedLinkTransform;

impl PropertyTransform for RelatedLinkTransform {
    fn name(&self) -> &'static str {
        "related-link"
    }

    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let Some(mut obj) = parse_object(from) else {
            return Ok(Some(from.to_string()));
        };

        let Some(link) = scalar_text(obj.get("link")) else {
            return Ok(Some(from.to_string()));
        };
        if link.trim().parse::<i64>().is_err() {
            return Ok(Some(from.to_string()));
        }

        let Some(node) = resolve_id_token(ctx, &link, BaseType::Document)? else {
            return Ok(Some(from.to_string()));
        };

        let icon = ctx
            .repository
            .schema_type(BaseType::Document, &node.schema_alias)?
            .and_then(|s| s.icon);
        let reference = node.reference.to_string();

        obj.insert("link".into(), Value::String(reference.clone()));
        obj.insert("internal".into(), Value::String(reference));
        obj.insert("internalName".into(), Value::String(node.name));
        obj.insert("internalIcon".into(), icon.map_or(Value::Null, Value::String));

        Ok(Some(serde_json::to_string(&obj)?))
    }
}

/// Rewrites a legacy multi URL picker entry into the current link shape.
///
/// `id`/`isMedia` become `udi`, `caption` becomes `name`.
#[derive(Debug, Clone, Default)]
pub struct MultiUrlLinkTransform;

impl PropertyTransform for MultiUrlLinkTransform {
    fn name(&self) -> &'static str {
        "multi-url-link"
    }

    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let Some(mut obj) = parse_object(from) else {
            return Ok(Some(from.to_string()));
        };

        let id = scalar_text(obj.get("id")).unwrap_or_default();
        if id.trim().parse::<i64>().map_or(false, |n| n > 0) {
            let is_media = scalar_text(obj.get("isMedia"))
                .map_or(false, |s| s.eq_ignore_ascii_case("true"));
            let base_type = if is_media {
                BaseType::Media
            } else {
                BaseType::Document
            };

            if let Some(udi) = map_id_token(ctx, &id, base_type, true)? {
                obj.insert("udi".into(), Value::String(udi));
                obj.remove("url");
            }
        }

        if let Some(caption) = scalar_text(obj.get("caption")).filter(|c| !c.trim().is_empty()) {
            obj.insert("name".into(), Value::String(caption));
        }

        for stale in ["caption", "id", "isMedia", "icon"] {
            obj.remove(stale);
        }

        Ok(Some(serde_json::to_string(&obj)?))
    }
}
