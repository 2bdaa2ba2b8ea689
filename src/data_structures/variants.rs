//! Variant name -> material substitutions, built once per document.

use std::collections::HashMap;

use crate::data_structures::document::{Document, PrimitiveRef};

/// Bind `material` to every runtime object of `primitive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub primitive: PrimitiveRef,
    pub material: usize,
}

/// What a switch request resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Restore every primitive's original material.
    Original,
    Variant(String),
}

impl Target {
    pub fn name(&self) -> Option<&str> {
        match self {
            Target::Original => None,
            Target::Variant(name) => Some(name),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VariantDirectory {
    names: Vec<String>,
    substitutions: HashMap<String, Vec<Substitution>>,
    /// Original binding of every primitive, in document order.
    originals: Vec<Substitution>,
    default_variant: Option<String>,
}

impl VariantDirectory {
    pub fn from_document(document: &Document) -> Self {
        let names = document.variants().to_vec();
        let mut substitutions: HashMap<String, Vec<Substitution>> = names
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let mut originals = Vec::new();

        for (primitive, definition) in document.primitives() {
            if let Some(material) = definition.material {
                originals.push(Substitution { primitive, material });
            }
            for mapping in &definition.mappings {
                for variant in &mapping.variants {
                    let Some(name) = names.get(*variant) else {
                        log::warn!(
                            "primitive {} maps material {} to unknown variant index {}, ignoring it",
                            primitive,
                            mapping.material,
                            variant
                        );
                        continue;
                    };
                    let list = substitutions.entry(name.clone()).or_default();
                    if list.iter().any(|s| s.primitive == primitive) {
                        log::warn!(
                            "primitive {} maps variant {:?} more than once, keeping the first mapping",
                            primitive,
                            name
                        );
                        continue;
                    }
                    list.push(Substitution {
                        primitive,
                        material: mapping.material,
                    });
                }
            }
        }

        Self {
            names,
            substitutions,
            originals,
            default_variant: document.default_variant().map(str::to_string),
        }
    }

    /// Variant names in document order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.substitutions.contains_key(name)
    }

    /// Substitutions explicitly listed for `name` (without the fallbacks to original bindings).
    pub fn mapped(&self, name: &str) -> Option<&[Substitution]> {
        self.substitutions.get(name).map(Vec::as_slice)
    }

    /// Classifies a switch request; `None` means there is nothing to switch to.
    pub fn target(&self, name: Option<&str>) -> Option<Target> {
        if self.is_empty() {
            return None;
        }
        match name {
            None => Some(Target::Original),
            Some(name) if self.default_variant.as_deref() == Some(name) => Some(Target::Original),
            Some(name) if self.contains(name) => Some(Target::Variant(name.to_string())),
            Some(_) => None,
        }
    }

    /// The full batch for `target`, one substitution per primitive, in document order.
    ///
    /// Primitives a variant doesn't mention fall back to their original material, which
    /// makes any sequence of switches ending on the same target end in the same bindings.
    pub fn resolve(&self, target: &Target) -> Vec<Substitution> {
        let mapped = match target {
            Target::Original => return self.originals.clone(),
            Target::Variant(name) => self.mapped(name).unwrap_or_default(),
        };
        self.originals
            .iter()
            .map(|original| {
                mapped
                    .iter()
                    .find(|s| s.primitive == original.primitive)
                    .copied()
                    .unwrap_or(*original)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::document::{
        MaterialDefinition, MeshDefinition, PrimitiveDefinition,
    };

    fn shoe() -> Document {
        let mut builder = Document::builder();
        for name in ["Yellow", "Red", "Blue"] {
            builder.material(MaterialDefinition::named(name));
        }
        let yellow_red = builder.variant("Yellow Red");
        let blue = builder.variant("Blue");
        builder.mesh(MeshDefinition {
            name: Some("shoe".into()),
            primitives: vec![
                PrimitiveDefinition::new(Some(0))
                    .with_mapping(2, vec![yellow_red])
                    .with_mapping(2, vec![blue]),
                PrimitiveDefinition::new(Some(1)).with_mapping(2, vec![blue, 7]),
            ],
        });
        builder.default_variant("Yellow");
        builder.build()
    }

    #[test]
    fn unmapped_primitives_fall_back_to_original_material() {
        let directory = VariantDirectory::from_document(&shoe());
        let batch = directory.resolve(&Target::Variant("Yellow Red".into()));
        assert_eq!(
            batch,
            vec![
                Substitution {
                    primitive: PrimitiveRef::new(0, 0),
                    material: 2
                },
                Substitution {
                    primitive: PrimitiveRef::new(0, 1),
                    material: 1
                },
            ]
        );
        assert_eq!(directory.mapped("Blue").map(<[_]>::len), Some(2));
    }

    #[test]
    fn classifies_switch_targets() {
        let directory = VariantDirectory::from_document(&shoe());
        assert_eq!(directory.target(None), Some(Target::Original));
        assert_eq!(directory.target(Some("Yellow")), Some(Target::Original));
        assert_eq!(
            directory.target(Some("Blue")),
            Some(Target::Variant("Blue".into()))
        );
        assert_eq!(directory.target(Some("Green")), None);
        assert_eq!(directory.names(), ["Yellow Red".to_string(), "Blue".to_string()]);
    }

    #[test]
    fn no_variants_means_no_targets() {
        let mut builder = Document::builder();
        builder.mesh(MeshDefinition {
            name: None,
            primitives: vec![PrimitiveDefinition::new(None)],
        });
        let directory = VariantDirectory::from_document(&builder.build());
        assert!(directory.is_empty());
        assert_eq!(directory.target(None), None);
        assert_eq!(directory.target(Some("anything")), None);
    }
}
