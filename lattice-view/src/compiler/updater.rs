//! Render actions, one per content property a binding can drive.

use crate::dom::Node;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Updater {
    /// Form-control value; the value is stored as is.
    Value,
    /// Rich content, stringified.
    Html,
    /// Plain text content, stringified.
    Text,
}

impl Updater {
    pub fn apply(self, node: &dyn Node, value: &Value) {
        match self {
            Updater::Value => node.set_value(value.clone()),
            Updater::Html => node.set_inner_html(&value.to_string()),
            Updater::Text => node.set_text_content(&value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::Element;

    #[test]
    fn each_updater_sets_its_property() {
        let el = Element::new("div");

        Updater::Value.apply(el.as_ref(), &Value::from(3));
        assert_eq!(el.value(), Value::from(3));

        Updater::Html.apply(el.as_ref(), &Value::from("<i>x</i>"));
        assert_eq!(el.inner_html().as_deref(), Some("<i>x</i>"));

        Updater::Text.apply(el.as_ref(), &Value::Null);
        assert_eq!(el.text_content(), "");
        assert!(el.inner_html().is_none());
    }
}
