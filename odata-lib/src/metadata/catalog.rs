//! In-memory service catalog

use serde::Deserialize;
use serde::Serialize;

use super::EdmType;

/// Read-only description of a service: entity sets, types and operations.
///
/// Type references (`EntitySet::entity_type`, `base_type`, navigation
/// targets) may be bare or namespace-qualified; lookups compare the last
/// dot-separated segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Catalog {
    /// Schema namespace used to qualify type names.
    pub namespace: String,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub complex_types: Vec<ComplexType>,
    #[serde(default)]
    pub enum_types: Vec<EnumType>,
    #[serde(default)]
    pub functions: Vec<FunctionImport>,
}

/// A named collection of entities of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
}

/// An entity type with its declared members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityType {
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    /// Key property names in declaration order.
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    #[serde(default)]
    pub is_abstract: bool,
    /// Media-link entry.
    #[serde(default)]
    pub has_stream: bool,
}

/// A complex (key-less, structured) type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComplexType {
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// An enum type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumType {
    pub name: String,
    #[serde(default)]
    pub is_flags: bool,
    #[serde(default)]
    pub members: Vec<EnumMember>,
}

/// A named enum member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// A structural property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "Type")]
    pub edm_type: EdmType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Property {
    /// Creates a nullable property.
    pub fn new(name: impl Into<String>, edm_type: EdmType) -> Self {
        Self {
            name: name.into(),
            edm_type,
            nullable: true,
        }
    }
}

/// Cardinality of the target end of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    One,
    ZeroOrOne,
    Many,
}

/// An association from one entity type to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NavigationProperty {
    pub name: String,
    pub target_type: String,
    pub multiplicity: Multiplicity,
    #[serde(default)]
    pub partner: Option<String>,
}

impl NavigationProperty {
    /// Returns `true` if the association targets a collection.
    pub fn is_collection(&self) -> bool {
        self.multiplicity == Multiplicity::Many
    }
}

/// Whether an operation reads (function) or has side effects (action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Function,
    Action,
}

/// A service operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "Type")]
    pub edm_type: EdmType,
}

/// A function or action import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionImport {
    pub name: String,
    pub kind: FunctionKind,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<EdmType>,
    /// Entity set of returned entities, if any.
    #[serde(default)]
    pub entity_set: Option<String>,
}

pub(crate) fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

impl Catalog {
    /// Creates an empty catalog for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Qualifies a type name with the catalog namespace if it is bare.
    pub fn qualified_name(&self, type_name: &str) -> String {
        if type_name.contains('.') || self.namespace.is_empty() {
            type_name.to_string()
        } else {
            format!("{}.{}", self.namespace, type_name)
        }
    }

    /// Looks up an entity type by (possibly qualified) name.
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        let name = last_segment(name);
        self.entity_types.iter().find(|t| t.name == name)
    }

    /// Looks up a complex type by (possibly qualified) name.
    pub fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        let name = last_segment(name);
        self.complex_types.iter().find(|t| t.name == name)
    }

    /// Looks up an enum type by (possibly qualified) name.
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        let name = last_segment(name);
        self.enum_types.iter().find(|t| t.name == name)
    }

    /// Returns the type followed by its ancestors, most derived first.
    pub fn type_chain<'a>(&'a self, entity_type: &'a EntityType) -> Vec<&'a EntityType> {
        let mut chain = vec![entity_type];
        let mut current = entity_type;
        while let Some(base) = current.base_type.as_deref().and_then(|b| self.entity_type(b)) {
            if chain.iter().any(|t| t.name == base.name) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Returns `true` if `derived` is `base` or inherits from it.
    pub fn is_assignable(&self, derived: &EntityType, base: &EntityType) -> bool {
        self.type_chain(derived).iter().any(|t| t.name == base.name)
    }

    /// Returns every type deriving from `base`, directly or transitively.
    pub fn derived_types<'a>(&'a self, base: &EntityType) -> Vec<&'a EntityType> {
        self.entity_types
            .iter()
            .filter(|t| t.name != base.name && self.is_assignable(t, base))
            .collect()
    }

    /// Returns key properties in declaration order, inherited from the root type.
    pub fn key_properties<'a>(&'a self, entity_type: &'a EntityType) -> Vec<&'a Property> {
        let chain = self.type_chain(entity_type);
        let Some(owner) = chain.iter().rev().find(|t| !t.key.is_empty()) else {
            return Vec::new();
        };
        owner
            .key
            .iter()
            .filter_map(|name| self.property(entity_type, name))
            .collect()
    }

    /// Returns all structural properties, base type members first.
    pub fn properties<'a>(&'a self, entity_type: &'a EntityType) -> Vec<&'a Property> {
        self.type_chain(entity_type)
            .into_iter()
            .rev()
            .flat_map(|t| t.properties.iter())
            .collect()
    }

    /// Returns all navigation properties, base type members first.
    pub fn navigation_properties<'a>(
        &'a self,
        entity_type: &'a EntityType,
    ) -> Vec<&'a NavigationProperty> {
        self.type_chain(entity_type)
            .into_iter()
            .rev()
            .flat_map(|t| t.navigation_properties.iter())
            .collect()
    }

    /// Returns all properties of a complex type, base type members first.
    pub fn complex_properties<'a>(&'a self, complex: &'a ComplexType) -> Vec<&'a Property> {
        let mut chain = vec![complex];
        let mut current = complex;
        while let Some(base) = current.base_type.as_deref().and_then(|b| self.complex_type(b)) {
            if chain.iter().any(|t| t.name == base.name) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|t| t.properties.iter())
            .collect()
    }

    fn property<'a>(&'a self, entity_type: &'a EntityType, name: &str) -> Option<&'a Property> {
        self.type_chain(entity_type)
            .into_iter()
            .flat_map(|t| t.properties.iter())
            .find(|p| p.name == name)
    }

    /// Returns the entity set holding entities of `entity_type`, directly or
    /// through one of its ancestors.
    pub fn entity_set_for_type(&self, entity_type: &EntityType) -> Option<&EntitySet> {
        self.type_chain(entity_type).into_iter().find_map(|t| {
            self.entity_sets
                .iter()
                .find(|s| last_segment(&s.entity_type) == t.name)
        })
    }

    /// Looks up an entity set by exact name.
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.iter().find(|s| s.name == name)
    }

    /// Looks up a function or action import by exact name.
    pub fn function(&self, name: &str) -> Option<&FunctionImport> {
        self.functions.iter().find(|f| f.name == name)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::northwind;
    use super::*;

    #[test]
    fn test_key_properties_in_order() {
        let catalog = northwind();
        let detail = catalog.entity_type("Order_Detail").unwrap();
        let keys: Vec<_> = catalog
            .key_properties(detail)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(keys, vec!["OrderID", "ProductID"]);
    }

    #[test]
    fn test_inherited_members() {
        let catalog = northwind();
        let ship = catalog.entity_type("NorthwindModel.Ship").unwrap();
        let names: Vec<_> = catalog
            .properties(ship)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["TransportID", "TransportType", "ShipName"]);
        assert_eq!(catalog.key_properties(ship)[0].name, "TransportID");
        assert_eq!(catalog.entity_set_for_type(ship).unwrap().name, "Transports");
    }

    #[test]
    fn test_derived_types() {
        let catalog = northwind();
        let transport = catalog.entity_type("Transport").unwrap();
        let derived: Vec<_> = catalog
            .derived_types(transport)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(derived, vec!["Ship", "Truck"]);
    }

    #[test]
    fn test_qualified_name() {
        let catalog = northwind();
        assert_eq!(catalog.qualified_name("Ship"), "NorthwindModel.Ship");
        assert_eq!(catalog.qualified_name("Other.Ship"), "Other.Ship");
    }

    #[test]
    fn test_deserialize_catalog() {
        let json = r#"{
            "Namespace": "NS",
            "EntitySets": [{"Name": "Items", "EntityType": "NS.Item"}],
            "EntityTypes": [{
                "Name": "Item",
                "Key": ["Id"],
                "Properties": [{"Name": "Id", "Type": "Edm.Int64", "Nullable": false}]
            }]
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let item = catalog.entity_type("Item").unwrap();
        assert_eq!(catalog.key_properties(item)[0].edm_type, EdmType::Int64);
    }
}
