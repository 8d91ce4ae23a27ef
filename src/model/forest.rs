/// Arena view of the group hierarchy
///
/// The listing encodes the hierarchy as flat `(id, parent_id)` edges. This
/// module rebuilds it as an arena of nodes indexed by group id, so traversal
/// never follows owned pointers and parent cycles cannot recurse forever.
use crate::model::Group;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct Node {
    group: Group,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A forest of groups reconstructed from `parent_group_id` edges
#[derive(Debug, Clone, Default)]
pub struct GroupForest {
    nodes: Vec<Node>,
    index: HashMap<i64, usize>,
    roots: Vec<usize>,
    orphans: Vec<i64>,
    cyclic: Vec<i64>,
}

impl GroupForest {
    /// Builds the forest from a flat group list
    ///
    /// Later duplicates of an id are ignored. Groups whose parent is not in
    /// the list are reported as orphans and treated as roots; groups on a
    /// parent cycle are reported and left out of every traversal.
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        let mut forest = Self::default();

        for group in groups {
            if forest.index.contains_key(&group.id) {
                continue;
            }
            forest.index.insert(group.id, forest.nodes.len());
            forest.nodes.push(Node {
                group,
                parent: None,
                children: Vec::new(),
            });
        }

        let edges: Vec<(i64, Option<i64>)> = forest
            .nodes
            .iter()
            .map(|n| (n.group.id, n.group.parent_group_id))
            .collect();
        let cyclic: HashSet<i64> = find_cycles(edges.iter().copied()).into_iter().collect();

        for idx in 0..forest.nodes.len() {
            let (id, parent_id) = edges[idx];
            if cyclic.contains(&id) {
                continue;
            }
            match parent_id {
                None => forest.roots.push(idx),
                Some(pid) => match forest.index.get(&pid).copied() {
                    Some(pidx) => {
                        forest.nodes[idx].parent = Some(pidx);
                        forest.nodes[pidx].children.push(idx);
                    }
                    None => {
                        forest.orphans.push(id);
                        forest.roots.push(idx);
                    }
                },
            }
        }

        forest.cyclic = edges
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| cyclic.contains(id))
            .collect();

        forest
    }

    /// Number of groups in the forest
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the forest holds no groups
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a group by id
    pub fn get(&self, id: i64) -> Option<&Group> {
        self.index.get(&id).map(|&idx| &self.nodes[idx].group)
    }

    /// Root groups in listing order
    pub fn roots(&self) -> impl Iterator<Item = &Group> {
        self.roots.iter().map(move |&idx| &self.nodes[idx].group)
    }

    /// Direct children of a group in listing order
    pub fn children(&self, id: i64) -> Vec<&Group> {
        self.index
            .get(&id)
            .map(|&idx| {
                self.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| &self.nodes[c].group)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parent of a group, if it is present in the forest
    pub fn parent(&self, id: i64) -> Option<&Group> {
        let idx = *self.index.get(&id)?;
        self.nodes[idx].parent.map(|p| &self.nodes[p].group)
    }

    /// Number of ancestors between a group and its root
    pub fn depth(&self, id: i64) -> Option<usize> {
        let mut idx = *self.index.get(&id)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[idx].parent {
            depth += 1;
            idx = parent;
        }
        Some(depth)
    }

    /// All reachable groups, parents before children
    pub fn depth_first(&self) -> Vec<&Group> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(idx) = stack.pop() {
            ordered.push(&self.nodes[idx].group);
            stack.extend(self.nodes[idx].children.iter().rev().copied());
        }

        ordered
    }

    /// Groups that carry a diagrams page, in depth-first order
    pub fn leaves(&self) -> Vec<&Group> {
        self.depth_first()
            .into_iter()
            .filter(|g| g.has_diagrams())
            .collect()
    }

    /// Groups whose parent is missing from the forest
    pub fn orphans(&self) -> &[i64] {
        &self.orphans
    }

    /// Groups that sit on a parent cycle
    pub fn cyclic(&self) -> &[i64] {
        &self.cyclic
    }
}

/// Finds every id that lies on a parent cycle
///
/// Edges pointing at ids outside the set terminate the walk.
pub fn find_cycles(edges: impl IntoIterator<Item = (i64, Option<i64>)>) -> Vec<i64> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let parents: HashMap<i64, Option<i64>> = edges.into_iter().collect();
    let mut marks: HashMap<i64, Mark> = HashMap::with_capacity(parents.len());
    let mut cyclic = Vec::new();

    let mut ids: Vec<i64> = parents.keys().copied().collect();
    ids.sort_unstable();

    for start in ids {
        let mut path = Vec::new();
        let mut current = Some(start);

        while let Some(id) = current {
            match marks.get(&id) {
                Some(Mark::Done) => break,
                Some(Mark::InProgress) => {
                    if let Some(pos) = path.iter().position(|&p| p == id) {
                        cyclic.extend_from_slice(&path[pos..]);
                    }
                    break;
                }
                None => {}
            }
            marks.insert(id, Mark::InProgress);
            path.push(id);
            current = parents
                .get(&id)
                .copied()
                .flatten()
                .filter(|p| parents.contains_key(p));
        }

        for id in path {
            marks.insert(id, Mark::Done);
        }
    }

    cyclic.sort_unstable();
    cyclic
}
