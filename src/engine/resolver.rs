//! Cross-resource reference resolution.
//!
//! Source bodies embed identifiers of other source resources. Before a body
//! can be sent to the destination, every declared connection is looked up in
//! the destination state and rewritten to the destination identifier.

use serde::Serialize;
use serde_json::Value;

use crate::body::{ensure_tag, for_each_parent_mut};
use crate::resources::{ConnectContext, ResourceType};

use super::diff::strip_excluded;

/// A reference that has no destination counterpart yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    /// Referenced type.
    pub target: &'static str,
    /// Connection path the value was found at.
    pub path: &'static str,
    /// The source identifier.
    pub value: String,
}

/// Rewrites every connection of `resource` found in `body` in place and
/// returns what could not be resolved. Connections to unregistered types are
/// left alone.
pub fn resolve_references(
    resource: &dyn ResourceType,
    body: &mut Value,
    ctx: &ConnectContext<'_>,
) -> Vec<UnresolvedReference> {
    let mut unresolved = Vec::new();

    for connection in resource.config().connections {
        if !ctx.registry.contains(connection.target) {
            continue;
        }
        for_each_parent_mut(body, connection.path, &mut |key, parent| {
            for value in resource.connect_id(key, parent, connection.target, ctx) {
                unresolved.push(UnresolvedReference {
                    target: connection.target,
                    path: connection.path,
                    value,
                });
            }
        });
    }

    unresolved
}

/// Builds the body sent to the destination from a source body: references
/// resolved, excluded attributes stripped and the sync tag added.
#[must_use]
pub fn prepare_body(
    resource: &dyn ResourceType,
    source_body: &Value,
    ctx: &ConnectContext<'_>,
    sync_tag: Option<&str>,
) -> (Value, Vec<UnresolvedReference>) {
    let config = resource.config();
    let mut body = source_body.clone();

    let unresolved = resolve_references(resource, &mut body, ctx);
    strip_excluded(&mut body, config.excluded_attributes);

    if let (Some(tag), Some(path)) = (sync_tag, config.tagging_path) {
        ensure_tag(&mut body, path, tag);
    }

    (body, unresolved)
}

/// Renders unresolved references for a log line.
#[must_use]
pub fn describe(unresolved: &[UnresolvedReference]) -> String {
    unresolved
        .iter()
        .map(|u| format!("{}:{} ({})", u.target, u.value, u.path))
        .collect::<Vec<_>>()
        .join(", ")
}
