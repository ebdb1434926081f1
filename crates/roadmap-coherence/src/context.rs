//! Cascading context: the upstream decisions an item inherits.
//!
//! Context for an item is its ancestor chain plus the items it transitively
//! depends on. Dependency graphs are not guaranteed to be acyclic, so the walk
//! is breadth-first, bounded by depth, and tracks visited ids.

use roadmap_core::item::{Item, Roadmap};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// One hop in a dependency chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyLink {
    /// The depended-on id
    pub id: String,
    /// Name of the depended-on item, `None` when the id does not resolve
    pub name: Option<String>,
    /// The item that declared the dependency
    pub via: String,
    /// Hops from the starting item (1 = direct dependency)
    pub depth: usize,
}

impl DependencyLink {
    pub fn is_resolved(&self) -> bool {
        self.name.is_some()
    }
}

/// Resolve an id through the lookup, falling back to a tree search when the
/// lookup entry is stale.
pub(crate) fn resolve<'r>(
    roadmap: &'r Roadmap,
    index: &HashMap<String, Vec<usize>>,
    id: &str,
) -> Option<(Vec<usize>, &'r Item)> {
    if let Some(path) = index.get(id)
        && let Some(item) = roadmap.item_at(path)
        && item.id == id
    {
        return Some((path.clone(), item));
    }
    let path = roadmap.path_of(id)?;
    let item = roadmap.item_at(&path)?;
    Some((path, item))
}

/// Breadth-first walk of dependency ids starting at `start_id`, up to `max_depth` hops.
///
/// Each id appears at most once. Unresolved ids are reported but not expanded.
pub fn dependency_chain(
    roadmap: &Roadmap,
    index: &HashMap<String, Vec<usize>>,
    start_id: &str,
    max_depth: usize,
) -> Vec<DependencyLink> {
    let mut links = Vec::new();
    let mut visited: HashSet<String> = HashSet::from([start_id.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start_id.to_string(), 0)]);

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some((_, item)) = resolve(roadmap, index, &id) else {
            continue;
        };
        for dep in item.all_dependency_ids() {
            if !visited.insert(dep.to_string()) {
                continue;
            }
            let target = resolve(roadmap, index, dep).map(|(_, t)| t);
            links.push(DependencyLink {
                id: dep.to_string(),
                name: target.map(|t| t.name.clone()),
                via: item.id.clone(),
                depth: depth + 1,
            });
            if target.is_some() {
                queue.push_back((dep.to_string(), depth + 1));
            }
        }
    }

    links
}

/// Render the ancestor chain and upstream dependencies of an item as prompt context.
///
/// Returns an empty string when the item is unknown.
pub fn cascading_context(
    roadmap: &Roadmap,
    index: &HashMap<String, Vec<usize>>,
    item_id: &str,
    max_depth: usize,
) -> String {
    let Some((path, _)) = resolve(roadmap, index, item_id) else {
        return String::new();
    };

    let mut out = String::new();
    for ancestor in roadmap.ancestors_at(&path) {
        out.push_str(&format!("{}: {}", ancestor.item_type, ancestor.name));
        let summary = ancestor.description.trim();
        if !summary.is_empty() {
            out.push_str(&format!(" ({})", summary));
        }
        out.push('\n');
    }

    let links = dependency_chain(roadmap, index, item_id, max_depth);
    if !links.is_empty() {
        out.push_str("Upstream dependencies:\n");
        for link in &links {
            match &link.name {
                Some(name) => out.push_str(&format!("- {} {}\n", link.id, name)),
                None => out.push_str(&format!("- {} (unresolved)\n", link.id)),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::item::ItemType;

    fn roadmap_with_cycle() -> Roadmap {
        let mut roadmap = Roadmap::new("p", "Platform");
        let mut epic = Item::new("1.1", "Accounts", ItemType::Epic)
            .with_description("User account lifecycle");
        epic.add_child(Item::new("1.1.1", "Sign up", ItemType::Story).with_dependency("1.1.2"));
        epic.add_child(Item::new("1.1.2", "Email verify", ItemType::Story).with_dependency("1.1.3"));
        epic.add_child(
            Item::new("1.1.3", "Mailer", ItemType::Story)
                .with_dependency("1.1.1")
                .with_dependency("9.9.9"),
        );
        let mut milestone = Item::new("1", "Beta", ItemType::Milestone);
        milestone.add_child(epic);
        roadmap.root.add_child(milestone);
        roadmap
    }

    #[test]
    fn test_chain_terminates_on_cycle() {
        let roadmap = roadmap_with_cycle();
        let index = roadmap.item_index().unwrap();
        let chain = dependency_chain(&roadmap, &index, "1.1.1", 10);
        let ids: Vec<&str> = chain.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1.2", "1.1.3", "9.9.9"]);
        assert_eq!(chain[2].depth, 3);
        assert!(!chain[2].is_resolved());
    }

    #[test]
    fn test_chain_respects_depth() {
        let roadmap = roadmap_with_cycle();
        let index = roadmap.item_index().unwrap();
        let chain = dependency_chain(&roadmap, &index, "1.1.1", 1);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].via, "1.1.1");
        assert!(dependency_chain(&roadmap, &index, "1.1.1", 0).is_empty());
    }

    #[test]
    fn test_cascading_context_lists_ancestors_and_dependencies() {
        let roadmap = roadmap_with_cycle();
        let index = roadmap.item_index().unwrap();
        let context = cascading_context(&roadmap, &index, "1.1.2", 3);
        assert!(context.contains("Project: Platform"));
        assert!(context.contains("Milestone: Beta"));
        assert!(context.contains("Epic: Accounts (User account lifecycle)"));
        assert!(context.contains("- 1.1.3 Mailer"));
        assert!(context.contains("- 9.9.9 (unresolved)"));
    }

    #[test]
    fn test_unknown_item_has_empty_context() {
        let roadmap = roadmap_with_cycle();
        let index = roadmap.item_index().unwrap();
        assert!(cascading_context(&roadmap, &index, "4.4", 3).is_empty());
    }
}
