use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Shape;

/// Label of the landmark group that transforms are built from.
pub const SOURCE_GROUP: &str = "source";

/// Named landmark groups attached to an image or a reference frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkManager {
    groups: BTreeMap<String, Shape>,
}

impl LandmarkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager holding only the `"source"` group.
    pub fn with_source(shape: Shape) -> Self {
        let mut lms = Self::new();
        lms.insert(SOURCE_GROUP, shape);
        lms
    }

    /// Insert or replace a group, returning the previous one.
    pub fn insert(&mut self, label: impl Into<String>, shape: Shape) -> Option<Shape> {
        self.groups.insert(label.into(), shape)
    }

    pub fn get(&self, label: &str) -> Option<&Shape> {
        self.groups.get(label)
    }

    #[inline]
    pub fn source(&self) -> Option<&Shape> {
        self.get(SOURCE_GROUP)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
