//! Bidirectional index between declarative elements and runtime objects.
//!
//! The table is built once from the loader's [`RuntimeGraph`]. Afterwards the only
//! permitted change is correlating an element that had no objects yet, which is
//! what happens when a dormant material gets instantiated on first use. There is
//! no removal: an element never goes back to being uncorrelated.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use crate::{
    data_structures::{document::Element, scene_graph::{ObjectId, RuntimeGraph}},
    error::{Error, Result},
};

/// Runtime objects correlated to one element. Shared, so facades and the table hand
/// out the very same set.
pub type ObjectSet = Arc<BTreeSet<ObjectId>>;

#[derive(Clone, Debug, Default)]
pub struct CorrelationTable {
    by_element: HashMap<Element, ObjectSet>,
    by_object: HashMap<ObjectId, BTreeSet<Element>>,
}

impl CorrelationTable {
    pub fn from_graph(graph: &RuntimeGraph) -> Self {
        let mut objects: HashMap<Element, BTreeSet<ObjectId>> = HashMap::new();
        let mut by_object: HashMap<ObjectId, BTreeSet<Element>> = HashMap::new();
        graph.visit(&mut |object, element| {
            objects.entry(element).or_default().insert(object);
            by_object.entry(object).or_default().insert(element);
        });
        let by_element = objects
            .into_iter()
            .map(|(element, set)| (element, Arc::new(set)))
            .collect();
        Self {
            by_element,
            by_object,
        }
    }

    /// Objects instantiated from `element`, `None` if there are none (yet).
    pub fn get(&self, element: &Element) -> Option<&ObjectSet> {
        self.by_element.get(element)
    }

    /// Elements `object` was instantiated from. More than one when the engine deduplicated.
    pub fn sources_of(&self, object: ObjectId) -> Option<&BTreeSet<Element>> {
        self.by_object.get(&object)
    }

    /// Correlates a previously uncorrelated element.
    pub fn insert(&mut self, element: Element, objects: BTreeSet<ObjectId>) -> Result<ObjectSet> {
        if objects.is_empty() {
            return Err(Error::EmptyCorrelation { element });
        }
        if self.by_element.contains_key(&element) {
            return Err(Error::AlreadyCorrelated { element });
        }
        for object in &objects {
            self.by_object.entry(*object).or_default().insert(element);
        }
        let objects = Arc::new(objects);
        self.by_element.insert(element, objects.clone());
        Ok(objects)
    }

    /// Number of correlated elements.
    pub fn len(&self) -> usize {
        self.by_element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_element.is_empty()
    }
}

impl From<&RuntimeGraph> for CorrelationTable {
    fn from(graph: &RuntimeGraph) -> Self {
        Self::from_graph(graph)
    }
}
