//! Reference implementation of the render-time helpers rewritten code calls.
//!
//! Every function is pure: plain data in, plain data out. Property bags are
//! `serde_json` maps so the same shapes the JS runtime receives can be
//! exercised here.

pub mod component;

use crate::types::TRANSIENT_MARKER;
use crate::utils::sanitize_class_segment;
use serde_json::Value;

pub use component::{RenderedElement, StyledComponent};

pub type Props = serde_json::Map<String, Value>;

/// JS module rewritten code imports as the runtime module
pub const RUNTIME_SOURCE: &str = include_str!("runtime.js");
/// File name the CLI writes `RUNTIME_SOURCE` under
pub const RUNTIME_FILE_NAME: &str = "stylec-runtime.js";

/// Prop naming the requested render target
pub const AS_PROP: &str = "as";
/// Prop carrying caller-supplied classes
pub const CLASS_NAME_PROP: &str = "className";

/// Elements that can run script or embed external resources
pub const UNSAFE_TAGS: &[&str] = &[
    "script", "iframe", "frame", "frameset", "object", "embed", "applet", "base", "link", "meta",
    "style", "portal",
];

/// Base classes first, caller classes last so they win cascade ties
pub fn merge_class_names(base: &str, caller: Option<&str>) -> String {
    let base = base.trim();
    match caller.map(str::trim).filter(|caller| !caller.is_empty()) {
        Some(caller) if base.is_empty() => caller.to_string(),
        Some(caller) => format!("{} {}", base, caller),
        None => base.to_string(),
    }
}

/// Copy of `props` without transient (`$`-prefixed) keys
pub fn filter_transient_props(props: &Props) -> Props {
    props
        .iter()
        .filter(|(key, _)| !key.starts_with(TRANSIENT_MARKER))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn is_unsafe_tag(tag: &str) -> bool {
    UNSAFE_TAGS.iter().any(|unsafe_tag| unsafe_tag.eq_ignore_ascii_case(tag))
}

/// Requested render target, or `default` when it is not a string or names a
/// denylisted element. This guards against accidental misuse only.
pub fn validate_tag(requested: Option<&Value>, default: &str) -> String {
    match requested {
        Some(Value::String(tag)) if !tag.is_empty() && !is_unsafe_tag(tag) => tag.clone(),
        Some(Value::String(tag)) => {
            log::debug!("Render target '{}' rejected; using '{}'", tag, default);
            default.to_string()
        }
        _ => default.to_string(),
    }
}

/// Sanitized class segment for a variant prop value. Missing, null and
/// non-scalar values select nothing.
pub fn variant_value_segment(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(value) => value.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    let sanitized = sanitize_class_segment(&raw);
    (!sanitized.is_empty()).then_some(sanitized)
}

/// `base` followed by one `base--key-value` modifier per recognized key
/// present in `props`. Consumed keys are removed from `props`.
pub fn variant_class_names<S: AsRef<str>>(base: &str, keys: &[S], props: &mut Props) -> String {
    let mut classes = vec![base.to_string()];
    for key in keys {
        let key = key.as_ref();
        let Some(value) = props.remove(key) else {
            continue;
        };
        if let Some(segment) = variant_value_segment(&value) {
            classes.push(format!("{}--{}-{}", base, key, segment));
        }
    }
    classes.join(" ")
}
