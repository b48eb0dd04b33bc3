//! Name-resolving view over a catalog

use super::Catalog;
use super::ComplexType;
use super::EdmType;
use super::EntitySet;
use super::EntityType;
use super::FunctionImport;
use super::NavigationProperty;
use super::Parameter;
use super::Property;
use crate::error::Error;
use crate::naming::NameMatcher;

/// An entity set together with the (possibly derived) type addressed in it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSet<'a> {
    pub set: &'a EntitySet,
    /// Declared element type of the set.
    pub base_type: &'a EntityType,
    /// Derived type narrowing, when the requested name matched one.
    pub derived_type: Option<&'a EntityType>,
}

impl<'a> ResolvedSet<'a> {
    /// Returns the most specific entity type addressed.
    pub fn entity_type(&self) -> &'a EntityType {
        self.derived_type.unwrap_or(self.base_type)
    }
}

/// A structured type whose members can be addressed by path.
#[derive(Debug, Clone, Copy)]
pub enum StructuredType<'a> {
    Entity(&'a EntityType),
    Complex(&'a ComplexType),
}

/// A resolved path segment.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Property(&'a Property),
    Navigation(&'a NavigationProperty),
}

impl Member<'_> {
    /// Returns the actual catalog name.
    pub fn name(&self) -> &str {
        match self {
            Member::Property(p) => &p.name,
            Member::Navigation(n) => &n.name,
        }
    }
}

/// Resolves requested names against a [`Catalog`] through a [`NameMatcher`].
///
/// Every failed lookup is reported as [`Error::UnresolvableObject`] naming
/// the requested identifier.
#[derive(Debug, Clone, Copy)]
pub struct CatalogView<'a> {
    catalog: &'a Catalog,
    matcher: &'a NameMatcher,
}

impl<'a> CatalogView<'a> {
    pub fn new(catalog: &'a Catalog, matcher: &'a NameMatcher) -> Self {
        Self { catalog, matcher }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Resolves a collection name.
    ///
    /// Entity set names are tried first. A name that only matches an entity
    /// type resolves to the set holding that type, narrowed to the type if it
    /// derives from the set's element type.
    pub fn entity_set(&self, requested: &str) -> Result<ResolvedSet<'a>, Error> {
        let sets = &self.catalog.entity_sets;
        if let Some(set) = self.matcher.find(sets, |s| s.name.as_str(), requested) {
            let base_type = self.set_type(set)?;
            return Ok(ResolvedSet {
                set,
                base_type,
                derived_type: None,
            });
        }

        let types = &self.catalog.entity_types;
        let entity_type = self
            .matcher
            .find(types, |t| t.name.as_str(), requested)
            .ok_or_else(|| Error::unresolvable("entity set", requested))?;
        let set = self
            .catalog
            .entity_set_for_type(entity_type)
            .ok_or_else(|| Error::unresolvable("entity set", requested))?;
        let base_type = self.set_type(set)?;
        let derived_type = (base_type.name != entity_type.name).then_some(entity_type);
        Ok(ResolvedSet {
            set,
            base_type,
            derived_type,
        })
    }

    fn set_type(&self, set: &EntitySet) -> Result<&'a EntityType, Error> {
        self.catalog
            .entity_type(&set.entity_type)
            .ok_or_else(|| Error::unresolvable("entity type", set.entity_type.clone()))
    }

    /// Resolves a type derived from `base` (or `base` itself).
    pub fn derived_type(&self, base: &'a EntityType, requested: &str) -> Result<&'a EntityType, Error> {
        let mut candidates = vec![base];
        candidates.extend(self.catalog.derived_types(base));
        self.matcher
            .find(&candidates, |t| t.name.as_str(), requested)
            .copied()
            .ok_or_else(|| Error::unresolvable("derived type", requested))
    }

    /// Resolves an entity type by name.
    pub fn entity_type(&self, requested: &str) -> Result<&'a EntityType, Error> {
        self.catalog
            .entity_type(requested)
            .or_else(|| {
                self.matcher
                    .find(&self.catalog.entity_types, |t| t.name.as_str(), requested)
            })
            .ok_or_else(|| Error::unresolvable("entity type", requested))
    }

    /// Resolves the target type of a navigation property.
    pub fn target_type(&self, navigation: &NavigationProperty) -> Result<&'a EntityType, Error> {
        self.catalog
            .entity_type(&navigation.target_type)
            .ok_or_else(|| Error::unresolvable("entity type", navigation.target_type.clone()))
    }

    /// Resolves a structural property of an entity type (inherited included).
    pub fn property(&self, entity_type: &'a EntityType, requested: &str) -> Result<&'a Property, Error> {
        let properties = self.catalog.properties(entity_type);
        self.matcher
            .find(&properties, |p| p.name.as_str(), requested)
            .copied()
            .ok_or_else(|| Error::unresolvable("property", requested))
    }

    /// Resolves a navigation property of an entity type (inherited included).
    pub fn navigation(
        &self,
        entity_type: &'a EntityType,
        requested: &str,
    ) -> Result<&'a NavigationProperty, Error> {
        let navigations = self.catalog.navigation_properties(entity_type);
        self.matcher
            .find(&navigations, |n| n.name.as_str(), requested)
            .copied()
            .ok_or_else(|| Error::unresolvable("association", requested))
    }

    /// Resolves a structural or navigation member of a structured type.
    ///
    /// Structural properties win over navigation properties when both match.
    pub fn member(&self, owner: StructuredType<'a>, requested: &str) -> Result<Member<'a>, Error> {
        match owner {
            StructuredType::Entity(entity_type) => {
                let properties = self.catalog.properties(entity_type);
                let navigations = self.catalog.navigation_properties(entity_type);
                let mut members: Vec<Member<'a>> =
                    properties.into_iter().map(Member::Property).collect();
                members.extend(navigations.into_iter().map(Member::Navigation));
                self.matcher
                    .find(&members, |m| m.name(), requested)
                    .copied()
                    .ok_or_else(|| Error::unresolvable("property", requested))
            }
            StructuredType::Complex(complex) => {
                let properties = self.catalog.complex_properties(complex);
                self.matcher
                    .find(&properties, |p| p.name.as_str(), requested)
                    .map(|p| Member::Property(*p))
                    .ok_or_else(|| Error::unresolvable("property", requested))
            }
        }
    }

    /// Returns the structured type reached through `member`, if any.
    pub fn member_type(&self, member: Member<'a>) -> Result<Option<StructuredType<'a>>, Error> {
        match member {
            Member::Navigation(navigation) => {
                Ok(Some(StructuredType::Entity(self.target_type(navigation)?)))
            }
            Member::Property(property) => match property.edm_type.element_type() {
                EdmType::Named(name) => Ok(self
                    .catalog
                    .complex_type(name)
                    .map(StructuredType::Complex)
                    .or_else(|| self.catalog.entity_type(name).map(StructuredType::Entity))),
                _ => Ok(None),
            },
        }
    }

    /// Resolves a function or action import.
    pub fn function(&self, requested: &str) -> Result<&'a FunctionImport, Error> {
        self.matcher
            .find(&self.catalog.functions, |f| f.name.as_str(), requested)
            .ok_or_else(|| Error::unresolvable("function", requested))
    }

    /// Resolves a parameter of a function or action import.
    pub fn parameter(&self, function: &'a FunctionImport, requested: &str) -> Result<&'a Parameter, Error> {
        self.matcher
            .find(&function.parameters, |p| p.name.as_str(), requested)
            .ok_or_else(|| Error::unresolvable("parameter", requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::catalog::fixtures::northwind;
    use crate::naming::NameMatch;
    use crate::naming::Pluralizer;
    use std::sync::Arc;

    fn matcher(strategy: NameMatch) -> NameMatcher {
        NameMatcher::new(strategy, Arc::new(Pluralizer::new()))
    }

    #[test]
    fn test_entity_set_best_match() {
        let catalog = northwind();
        let m = matcher(NameMatch::BestMatch);
        let view = CatalogView::new(&catalog, &m);

        assert_eq!(view.entity_set("Products").unwrap().set.name, "Products");
        assert_eq!(view.entity_set("product").unwrap().set.name, "Products");
        assert_eq!(view.entity_set("OrderDetails").unwrap().set.name, "Order_Details");
    }

    #[test]
    fn test_entity_set_strict_rejects_plural_variant() {
        let catalog = northwind();
        let m = matcher(NameMatch::Strict);
        let view = CatalogView::new(&catalog, &m);

        let err = view.entity_set("Categorys").unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvableObject { kind: "entity set", ref name } if name == "Categorys"
        ));
    }

    #[test]
    fn test_entity_set_by_derived_type() {
        let catalog = northwind();
        let m = matcher(NameMatch::BestMatch);
        let view = CatalogView::new(&catalog, &m);

        let resolved = view.entity_set("Ships").unwrap();
        assert_eq!(resolved.set.name, "Transports");
        assert_eq!(resolved.derived_type.unwrap().name, "Ship");
        assert_eq!(resolved.entity_type().name, "Ship");
    }

    #[test]
    fn test_member_through_complex_type() {
        let catalog = northwind();
        let m = matcher(NameMatch::BestMatch);
        let view = CatalogView::new(&catalog, &m);

        let employee = catalog.entity_type("Employee").unwrap();
        let address = view.member(StructuredType::Entity(employee), "address").unwrap();
        assert_eq!(address.name(), "Address");
        let Some(owner) = view.member_type(address).unwrap() else {
            panic!("expected complex type");
        };
        assert_eq!(view.member(owner, "city").unwrap().name(), "City");
    }

    #[test]
    fn test_navigation_unmatched_fails_loudly() {
        let catalog = northwind();
        let m = matcher(NameMatch::BestMatch);
        let view = CatalogView::new(&catalog, &m);

        let employee = catalog.entity_type("Employee").unwrap();
        assert_eq!(view.navigation(employee, "subordinate").unwrap().name, "Subordinates");
        assert!(view.navigation(employee, "Managers").is_err());
    }
}
