//! Item tree data model for generated roadmaps.
//!
//! A roadmap is an owned tree rooted at a single Project item:
//! Project → Milestone → Epic → Story → Task. Children own their subtrees;
//! the parent link is a non-owning back-reference by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Errors raised when the tree violates a structural contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate item id '{0}' in roadmap")]
    DuplicateId(String),
    #[error("invalid {item_type} id '{id}': {reason}")]
    InvalidId {
        id: String,
        item_type: ItemType,
        reason: String,
    },
    #[error("unknown item type '{0}'")]
    UnknownItemType(String),
}

/// The level of an item in the roadmap hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(alias = "project", alias = "PROJECT")]
    Project,
    #[serde(alias = "milestone", alias = "MILESTONE")]
    Milestone,
    #[serde(alias = "epic", alias = "EPIC")]
    Epic,
    #[serde(alias = "story", alias = "STORY")]
    Story,
    #[serde(alias = "task", alias = "TASK")]
    Task,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        Self::Project,
        Self::Milestone,
        Self::Epic,
        Self::Story,
        Self::Task,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Milestone => "Milestone",
            Self::Epic => "Epic",
            Self::Story => "Story",
            Self::Task => "Task",
        }
    }

    /// Allowed number of dot-separated numeric segments in a hierarchical id.
    /// `None` means the type carries a free-form id.
    const fn id_segments(self) -> Option<RangeInclusive<usize>> {
        match self {
            Self::Project => None,
            Self::Milestone => Some(1..=1),
            Self::Epic => Some(1..=2),
            Self::Story => Some(2..=3),
            Self::Task => Some(2..=4),
        }
    }

    /// Check an id against the numbering rules for this item type.
    ///
    /// Hierarchical ids are dot-separated unsigned integers (`"1.2.3"`).
    pub fn validate_id(self, id: &str) -> Result<(), TreeError> {
        let invalid = |reason: String| TreeError::InvalidId {
            id: id.to_string(),
            item_type: self,
            reason,
        };

        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(invalid("id is empty".to_string()));
        }
        let Some(range) = self.id_segments() else {
            return Ok(());
        };

        let segments: Vec<&str> = trimmed.split('.').collect();
        if !range.contains(&segments.len()) {
            return Err(invalid(format!(
                "expected {}-{} dot-separated segments, found {}",
                range.start(),
                range.end(),
                segments.len()
            )));
        }
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(invalid(format!("segment '{}' is not a number", bad)));
        }
        Ok(())
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TreeError::UnknownItemType(s.to_string()))
    }
}

/// Generators emit `null` for empty fields; treat it like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A node in the roadmap hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub item_type: ItemType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Estimated effort, only meaningful for tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub acceptance_criteria: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub success_criteria: Vec<String>,
    /// Explicit cross-references to other item ids.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub dependency_ids: BTreeSet<String>,
    /// Ids the generator resolved to concrete items. These may point outside
    /// the current tree and must be checked against a lookup before use.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub resolved_dependencies: BTreeSet<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Item>,
    /// Back-reference to the owning item. Rebuilt by `Roadmap::relink_parents()`.
    #[serde(skip)]
    pub parent_id: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type,
            description: String::new(),
            status: None,
            priority: None,
            duration_hours: None,
            acceptance_criteria: Vec::new(),
            success_criteria: Vec::new(),
            dependency_ids: BTreeSet::new(),
            resolved_dependencies: BTreeSet::new(),
            children: Vec::new(),
            parent_id: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_acceptance_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptance_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependency_ids.insert(id.into());
        self
    }

    /// Append a child, setting its parent back-reference.
    pub fn add_child(&mut self, mut child: Item) {
        child.parent_id = Some(self.id.clone());
        self.children.push(child);
    }

    /// Direct children of the given type, in display order.
    pub fn children_of_type(&self, item_type: ItemType) -> impl Iterator<Item = &Item> {
        self.children
            .iter()
            .filter(move |c| c.item_type == item_type)
    }

    pub fn count_children_of_type(&self, item_type: ItemType) -> usize {
        self.children_of_type(item_type).count()
    }

    /// Remove all direct children of the given type, returning them.
    pub fn remove_children_of_type(&mut self, item_type: ItemType) -> Vec<Item> {
        let (removed, kept): (Vec<Item>, Vec<Item>) = std::mem::take(&mut self.children)
            .into_iter()
            .partition(|c| c.item_type == item_type);
        self.children = kept;
        removed
    }

    /// Acceptance criteria, falling back to success criteria when none are set.
    pub fn criteria(&self) -> &[String] {
        if self.acceptance_criteria.is_empty() {
            &self.success_criteria
        } else {
            &self.acceptance_criteria
        }
    }

    /// Union of explicit and resolved dependency ids.
    pub fn all_dependency_ids(&self) -> BTreeSet<&str> {
        self.dependency_ids
            .iter()
            .chain(self.resolved_dependencies.iter())
            .map(String::as_str)
            .collect()
    }
}

/// A generated roadmap: metadata plus the item tree rooted at the Project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub root: Item,
}

impl Roadmap {
    /// Create an empty roadmap with a Project root.
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: crate::schema::CURRENT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            root: Item::new(project_id, name, ItemType::Project),
        }
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Every item in the tree in pre-order (root first, children in display order).
    pub fn all_items(&self) -> Vec<&Item> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(item) = stack.pop() {
            out.push(item);
            stack.extend(item.children.iter().rev());
        }
        out
    }

    /// All items of a given type anywhere in the tree, in pre-order.
    pub fn items_of_type(&self, item_type: ItemType) -> Vec<&Item> {
        self.all_items()
            .into_iter()
            .filter(|i| i.item_type == item_type)
            .collect()
    }

    pub fn milestones(&self) -> Vec<&Item> {
        self.items_of_type(ItemType::Milestone)
    }

    pub fn epics(&self) -> Vec<&Item> {
        self.items_of_type(ItemType::Epic)
    }

    pub fn stories(&self) -> Vec<&Item> {
        self.items_of_type(ItemType::Story)
    }

    pub fn tasks(&self) -> Vec<&Item> {
        self.items_of_type(ItemType::Task)
    }

    /// Item counts per type.
    pub fn count_by_type(&self) -> BTreeMap<ItemType, usize> {
        let mut counts = BTreeMap::new();
        for item in self.all_items() {
            *counts.entry(item.item_type).or_insert(0) += 1;
        }
        counts
    }

    /// Build an `id -> child-index path` lookup over the whole tree.
    ///
    /// Fails if two items share an id; every item must be addressable by
    /// exactly one entry.
    pub fn item_index(&self) -> Result<HashMap<String, Vec<usize>>, TreeError> {
        let mut index = HashMap::new();
        let mut stack: Vec<(Vec<usize>, &Item)> = vec![(Vec::new(), &self.root)];
        while let Some((path, item)) = stack.pop() {
            for (i, child) in item.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
            if index.insert(item.id.clone(), path).is_some() {
                return Err(TreeError::DuplicateId(item.id.clone()));
            }
        }
        Ok(index)
    }

    /// Resolve a child-index path from the root.
    pub fn item_at(&self, path: &[usize]) -> Option<&Item> {
        let mut node = &self.root;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn item_at_mut(&mut self, path: &[usize]) -> Option<&mut Item> {
        let mut node = &mut self.root;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Find the path to the first item with the given id.
    pub fn path_of(&self, id: &str) -> Option<Vec<usize>> {
        let mut stack: Vec<(Vec<usize>, &Item)> = vec![(Vec::new(), &self.root)];
        while let Some((path, item)) = stack.pop() {
            if item.id == id {
                return Some(path);
            }
            for (i, child) in item.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
        }
        None
    }

    pub fn find(&self, id: &str) -> Option<&Item> {
        let path = self.path_of(id)?;
        self.item_at(&path)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Item> {
        let path = self.path_of(id)?;
        self.item_at_mut(&path)
    }

    /// Ancestors of the item at `path`, from the root down to its parent.
    pub fn ancestors_at(&self, path: &[usize]) -> Vec<&Item> {
        (0..path.len())
            .filter_map(|depth| self.item_at(&path[..depth]))
            .collect()
    }

    /// Rebuild every `parent_id` back-reference. Called after deserialization.
    pub fn relink_parents(&mut self) {
        self.root.parent_id = None;
        relink(&mut self.root);
    }

    /// Mark the roadmap as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn relink(item: &mut Item) {
    let id = item.id.clone();
    for child in &mut item.children {
        child.parent_id = Some(id.clone());
        relink(child);
    }
}
