//! Render model composing the runtime helpers the way the emitted
//! `__styled`, `__extend`, `__variants` and `__polymorphic` calls do

use super::{
    filter_transient_props, merge_class_names, validate_tag, variant_class_names, Props,
    AS_PROP, CLASS_NAME_PROP,
};
use serde::Serialize;
use serde_json::Value;

/// Tag and props handed to the rendering framework
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedElement {
    pub tag: String,
    pub props: Props,
}

impl RenderedElement {
    pub fn class_name(&self) -> Option<&str> {
        self.props.get(CLASS_NAME_PROP).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyledComponent {
    /// `__styled(tag, class, attrs?)`
    Element {
        tag: String,
        class_name: String,
        attrs: Props,
    },
    /// `__extend(Base, class)`
    Extension {
        base: Box<StyledComponent>,
        class_name: String,
    },
    /// `__variants(component, class, keys, defaults)`
    Variants {
        inner: Box<StyledComponent>,
        base_class: String,
        keys: Vec<String>,
        defaults: Props,
    },
    /// `__polymorphic(defaultTag, Component)`
    Polymorphic {
        default_tag: String,
        inner: Box<StyledComponent>,
    },
}

impl StyledComponent {
    pub fn element(tag: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            class_name: class_name.into(),
            attrs: Props::new(),
        }
    }

    pub fn extend(self, class_name: impl Into<String>) -> Self {
        Self::Extension {
            base: Box::new(self),
            class_name: class_name.into(),
        }
    }

    pub fn render(&self, props: Props) -> RenderedElement {
        match self {
            Self::Element {
                tag,
                class_name,
                attrs,
            } => {
                let mut merged = attrs.clone();
                merged.extend(props);
                let tag = validate_tag(merged.remove(AS_PROP).as_ref(), tag);
                let caller = merged.remove(CLASS_NAME_PROP);
                let classes = merge_class_names(class_name, caller.as_ref().and_then(Value::as_str));

                let mut props = filter_transient_props(&merged);
                if !classes.is_empty() {
                    props.insert(CLASS_NAME_PROP.to_string(), Value::String(classes));
                }
                RenderedElement { tag, props }
            }
            Self::Extension { base, class_name } => base.render(prepend_class(props, class_name)),
            Self::Variants {
                inner,
                base_class,
                keys,
                defaults,
            } => {
                let mut props = props;
                for (key, value) in defaults {
                    let unset = props.get(key).map_or(true, Value::is_null);
                    if unset {
                        props.insert(key.clone(), value.clone());
                    }
                }
                let classes = variant_class_names(base_class, keys, &mut props);
                inner.render(prepend_class(props, &classes))
            }
            Self::Polymorphic { default_tag, inner } => {
                let mut props = props;
                if !props.contains_key(AS_PROP) {
                    props.insert(AS_PROP.to_string(), Value::String(default_tag.clone()));
                }
                inner.render(props)
            }
        }
    }
}

/// Puts `own` ahead of whatever class the caller passed
fn prepend_class(mut props: Props, own: &str) -> Props {
    let caller = props.remove(CLASS_NAME_PROP);
    let merged = merge_class_names(own, caller.as_ref().and_then(Value::as_str));
    props.insert(CLASS_NAME_PROP.to_string(), Value::String(merged));
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_extension_cascade_order() {
        let button = StyledComponent::element("button", "ss-base").extend("ss-ext");

        let none = button.render(Props::new());
        assert_eq!(none.tag, "button");
        assert_eq!(none.class_name(), Some("ss-base ss-ext"));

        let empty = button.render(props(json!({ "className": "" })));
        assert_eq!(empty.class_name(), Some("ss-base ss-ext"));

        let caller = button.render(props(json!({ "className": "mine" })));
        assert_eq!(caller.class_name(), Some("ss-base ss-ext mine"));
    }

    #[test]
    fn test_element_filters_transient_and_applies_attrs() {
        let input = StyledComponent::Element {
            tag: "input".to_string(),
            class_name: "ss-in".to_string(),
            attrs: props(json!({ "type": "text", "autoComplete": "off" })),
        };
        let rendered = input.render(props(json!({ "type": "email", "$invalid": true })));

        assert_eq!(rendered.props.get("type"), Some(&json!("email")));
        assert_eq!(rendered.props.get("autoComplete"), Some(&json!("off")));
        assert!(!rendered.props.contains_key("$invalid"));
    }

    #[test]
    fn test_as_prop_is_validated() {
        let link = StyledComponent::element("a", "ss-link");
        assert_eq!(link.render(props(json!({ "as": "button" }))).tag, "button");
        let rejected = link.render(props(json!({ "as": "script" })));
        assert_eq!(rejected.tag, "a");
        assert!(!rejected.props.contains_key("as"));
    }

    #[test]
    fn test_variants_apply_defaults_and_consume_keys() {
        let badge = StyledComponent::Variants {
            inner: Box::new(StyledComponent::element("span", "")),
            base_class: "ss-v".to_string(),
            keys: vec!["size".to_string(), "tone".to_string()],
            defaults: props(json!({ "size": "sm" })),
        };

        let rendered = badge.render(props(json!({ "tone": "danger", "className": "x" })));
        assert_eq!(rendered.tag, "span");
        assert_eq!(rendered.class_name(), Some("ss-v ss-v--size-sm ss-v--tone-danger x"));
        assert!(!rendered.props.contains_key("size"));
        assert!(!rendered.props.contains_key("tone"));

        let overridden = badge.render(props(json!({ "size": "lg" })));
        assert_eq!(overridden.class_name(), Some("ss-v ss-v--size-lg"));
    }

    #[test]
    fn test_polymorphic_default_target() {
        let card = StyledComponent::Polymorphic {
            default_tag: "article".to_string(),
            inner: Box::new(StyledComponent::element("div", "ss-card")),
        };
        assert_eq!(card.render(Props::new()).tag, "article");
        assert_eq!(card.render(props(json!({ "as": "section" }))).tag, "section");
        assert_eq!(card.render(props(json!({ "as": "embed" }))).tag, "div");
    }
}
