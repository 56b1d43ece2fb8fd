//! Run configurations and their serialized form.
//!
//! The exporter does not interpret run configurations. It hands a
//! [`ConfigElement`] to [`RunConfiguration::write_external`] and copies
//! whatever comes back into the `config` element of the document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A generic XML element tree: name, ordered attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<ConfigElement>,
}

impl ConfigElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Sets an attribute, replacing the value in place if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn add_child(&mut self, child: ConfigElement) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[ConfigElement] {
        &self.children
    }
}

/// The configuration a test run was started from.
pub trait RunConfiguration: Send + Sync {
    /// Display name, written as `testrun@name` and `config@name`.
    fn name(&self) -> &str;

    /// Identifier of the configuration type, written as `config@configId`.
    fn type_id(&self) -> &str;

    /// Serializes the configuration's own state into `element`.
    fn write_external(&self, element: &mut ConfigElement);
}

const DEFAULT_TYPE_ID: &str = "AndroidTestRunConfigurationType";

fn default_type_id() -> String {
    DEFAULT_TYPE_ID.to_string()
}

fn default_name() -> String {
    "testmatrix".to_string()
}

/// A run configuration described by a name, a type id and a flat list of
/// options, written as `<option name=".." value=".."/>` children.
///
/// This is also the `[run_configuration]` table of the config file:
///
/// ```toml
/// [run_configuration]
/// name = "app"
/// type_id = "AndroidTestRunConfigurationType"
///
/// [run_configuration.options]
/// PACKAGE_NAME = "com.example"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRunConfiguration {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_type_id")]
    pub type_id: String,

    #[serde(default)]
    pub options: IndexMap<String, String>,
}

impl StaticRunConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: default_type_id(),
            options: IndexMap::new(),
        }
    }

    pub fn with_type_id(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = type_id.into();
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

impl Default for StaticRunConfiguration {
    fn default() -> Self {
        Self::new(default_name())
    }
}

impl RunConfiguration for StaticRunConfiguration {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn write_external(&self, element: &mut ConfigElement) {
        for (name, value) in &self.options {
            element.add_child(
                ConfigElement::new("option")
                    .with_attribute("name", name)
                    .with_attribute("value", value),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut element = ConfigElement::new("config")
            .with_attribute("a", "1")
            .with_attribute("b", "2");
        element.set_attribute("a", "3");

        let attributes: Vec<_> = element.attributes().collect();
        assert_eq!(attributes, vec![("a", "3"), ("b", "2")]);
        assert_eq!(element.attribute("b"), Some("2"));
        assert_eq!(element.attribute("c"), None);
    }

    #[test]
    fn test_static_configuration_writes_options() {
        let config = StaticRunConfiguration::new("app").with_option("PACKAGE", "com.example");
        let mut element = ConfigElement::new("config");
        config.write_external(&mut element);

        assert_eq!(element.children().len(), 1);
        let option = &element.children()[0];
        assert_eq!(option.name(), "option");
        assert_eq!(option.attribute("name"), Some("PACKAGE"));
        assert_eq!(option.attribute("value"), Some("com.example"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: StaticRunConfiguration = toml::from_str(r#"name = "app""#).unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.type_id, "AndroidTestRunConfigurationType");
        assert!(config.options.is_empty());
    }
}
