pub mod traverser;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChartError, ChartResult};

pub use traverser::Traverser;

/// Node of an ordered tree, walked by [`Traverser`].
pub trait TreeNode {
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<&Self>;
}

/// Tree item with named fields and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub fields: IndexMap<String, Value>,
    pub children: Vec<DataItem>,
}

impl DataItem {
    #[must_use]
    pub fn new(fields: IndexMap<String, Value>) -> Self {
        Self {
            fields,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn with_child(mut self, child: DataItem) -> Self {
        self.children.push(child);
        self
    }
}

impl TreeNode for DataItem {
    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<&Self> {
        self.children.get(index)
    }
}

/// Forest of [`DataItem`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTree {
    roots: Vec<DataItem>,
}

impl DataTree {
    #[must_use]
    pub fn new(roots: Vec<DataItem>) -> Self {
        Self { roots }
    }

    /// Builds a tree from a JSON array of objects; `children_field` holds nested arrays.
    pub fn from_json(value: &Value, children_field: &str) -> ChartResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| ChartError::InvalidData("tree data must be an array".to_owned()))?;
        let roots = items
            .iter()
            .map(|item| parse_item(item, children_field))
            .collect::<ChartResult<Vec<_>>>()?;
        Ok(Self { roots })
    }

    #[must_use]
    pub fn roots(&self) -> &[DataItem] {
        &self.roots
    }

    #[must_use]
    pub fn traverser(&self) -> Traverser<'_, DataItem> {
        Traverser::new(&self.roots)
    }

    /// First item in depth-first order whose `field` equals `value`.
    #[must_use]
    pub fn find(&self, field: &str, value: &Value) -> Option<&DataItem> {
        let mut traverser = self.traverser();
        while traverser.advance() {
            let found = traverser
                .current()
                .filter(|item| item.get(field) == Some(value));
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

fn parse_item(value: &Value, children_field: &str) -> ChartResult<DataItem> {
    let object = value
        .as_object()
        .ok_or_else(|| ChartError::InvalidData("tree item must be an object".to_owned()))?;
    let mut item = DataItem::default();
    for (name, field) in object {
        if name == children_field {
            let children = field.as_array().ok_or_else(|| {
                ChartError::InvalidData(format!("`{children_field}` must be an array"))
            })?;
            item.children = children
                .iter()
                .map(|child| parse_item(child, children_field))
                .collect::<ChartResult<Vec<_>>>()?;
        } else {
            item.fields.insert(name.clone(), field.clone());
        }
    }
    Ok(item)
}
