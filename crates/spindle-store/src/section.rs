use serde::{Deserialize, Serialize};

use crate::object::SectionId;

/// A single typed value of a metadata property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A named, ordered list of values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub values: Vec<PropertyValue>,
}

/// Key/value metadata attached to container objects. Sections nest into a
/// tree of their own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub type_name: String,
    pub parent: Option<SectionId>,
    pub sections: Vec<SectionId>,
    pub properties: Vec<Property>,
}

impl Section {
    pub fn new(name: &str, type_name: &str, parent: Option<SectionId>) -> Self {
        Self {
            id: SectionId::new(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            parent,
            sections: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// First value of the named property.
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.property(name).and_then(|p| p.values.first())
    }

    /// Create or replace a property, keeping its position if it existed.
    pub fn set_property(&mut self, name: &str, values: Vec<PropertyValue>) {
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.values = values,
            None => self.properties.push(Property {
                name: name.to_string(),
                values,
            }),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.name == name)?;
        Some(self.properties.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_property_replaces_in_place() {
        let mut section = Section::new("s", "t", None);
        section.set_property("a", vec![PropertyValue::Int(1)]);
        section.set_property("b", vec![PropertyValue::Bool(true)]);
        section.set_property("a", vec![PropertyValue::Int(2), PropertyValue::Int(3)]);

        assert_eq!(section.properties.len(), 2);
        assert_eq!(section.properties[0].name, "a");
        assert_eq!(section.property("a").unwrap().values.len(), 2);
        assert_eq!(section.value("a").and_then(PropertyValue::as_int), Some(2));
    }

    #[test]
    fn remove_property() {
        let mut section = Section::new("s", "t", None);
        section.set_property("a", vec![PropertyValue::Text("x".into())]);
        assert!(section.remove_property("a").is_some());
        assert!(section.remove_property("a").is_none());
        assert!(section.value("a").is_none());
    }

    #[test]
    fn float_accessor_widens_ints() {
        assert_eq!(PropertyValue::Int(3).as_float(), Some(3.0));
        assert_eq!(PropertyValue::Text("3".into()).as_float(), None);
    }
}
