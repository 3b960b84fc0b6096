//! Include tree built from dot-separated association paths.
//!
//! Each node carries two independent flags: `include` materializes the
//! related resource into the output, `include_children` only descends so a
//! deeper segment can be materialized. `"a.b"` descends through `a` without
//! emitting it unless `"a"` was also requested on its own.

use std::collections::BTreeMap;

/// Requested inclusions for one level of the association graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeSpec {
    nodes: BTreeMap<String, IncludeNode>,
}

/// One association's inclusion flags plus the next path segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeNode {
    pub include: bool,
    pub include_children: bool,
    pub children: IncludeSpec,
}

impl IncludeSpec {
    /// Build a tree from canonical dotted paths such as `"comments.tags"`.
    pub fn parse<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut spec = Self::default();
        for path in paths {
            spec.insert_path(path.as_ref());
        }
        spec
    }

    fn insert_path(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        match path.split_once('.') {
            Some((head, rest)) => {
                let node = self.nodes.entry(head.to_string()).or_default();
                node.include_children = true;
                node.children.insert_path(rest);
            }
            None => {
                let node = self.nodes.entry(path.to_string()).or_default();
                node.include = true;
            }
        }
    }

    pub fn get(&self, association: &str) -> Option<&IncludeNode> {
        self.nodes.get(association)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
