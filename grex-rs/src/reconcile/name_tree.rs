use super::MAX_NAME_DEPTH;
use crate::detection::ParseLimits;
use crate::error::GrexError;
use std::collections::HashMap;

/// How a directory node refers to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// The node hangs off the root.
    Root,
    /// The parent is the node at this index.
    Index(usize),
    /// The parent is the node stored at this directory offset.
    Offset(u64),
}

/// One name segment of a flat directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameNode {
    pub name: String,
    pub parent: ParentRef,
    /// The node's own position in the directory, for offset back references.
    pub offset: Option<u64>,
}

impl NameNode {
    /// Creates a node called `name` below `parent`.
    pub fn new(name: impl Into<String>, parent: ParentRef) -> Self {
        Self {
            name: name.into(),
            parent,
            offset: None,
        }
    }

    /// Records where the node itself is stored, so children can refer to it by offset.
    pub fn at_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Assembles full paths from nodes that only know their parent.
///
/// Walks are iterative and stop after `max_depth` segments, so a directory whose
/// parent links form a cycle fails with a `ConstraintViolation` instead of looping.
#[derive(Debug)]
pub struct NameTree {
    nodes: Vec<NameNode>,
    by_offset: HashMap<u64, usize>,
    separator: char,
    max_depth: usize,
}

impl NameTree {
    /// Builds a tree over `nodes`, joining segments with `/` and allowing
    /// [`MAX_NAME_DEPTH`] segments per path.
    pub fn new(nodes: Vec<NameNode>) -> Self {
        let by_offset = nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.offset.map(|offset| (offset, index)))
            .collect();
        Self {
            nodes,
            by_offset,
            separator: '/',
            max_depth: MAX_NAME_DEPTH,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Applies the name depth a descriptor was given through its [`Probe`](crate::detection::Probe).
    pub fn with_limits(self, limits: ParseLimits) -> Self {
        self.with_max_depth(limits.max_name_depth)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NameNode] {
        &self.nodes
    }

    /// Returns the root-to-leaf path of the node at `index`.
    ///
    /// Empty segments, such as an unnamed root, are left out.
    pub fn path(&self, index: usize) -> Result<String, GrexError> {
        let mut segments: Vec<&str> = Vec::new();
        let mut current = index;
        let mut depth = 0usize;

        loop {
            let node = self.nodes.get(current).ok_or_else(|| {
                GrexError::constraint(format!("node {index} has a dangling parent {current}"))
            })?;
            depth += 1;
            if depth > self.max_depth {
                return Err(GrexError::constraint(format!(
                    "node {index} is nested deeper than {}",
                    self.max_depth
                )));
            }
            if !node.name.is_empty() {
                segments.push(&node.name);
            }

            current = match node.parent {
                ParentRef::Root => break,
                ParentRef::Index(parent) => parent,
                ParentRef::Offset(offset) => *self.by_offset.get(&offset).ok_or_else(|| {
                    GrexError::constraint(format!(
                        "node {index} has a dangling parent offset {offset:#x}"
                    ))
                })?,
            };
        }

        let mut path = String::new();
        for segment in segments.iter().rev() {
            if !path.is_empty() {
                path.push(self.separator);
            }
            path.push_str(segment);
        }
        Ok(path)
    }

    /// Returns the path of every node, failing on the first bad chain.
    pub fn paths(&self) -> Result<Vec<String>, GrexError> {
        (0..self.nodes.len()).map(|index| self.path(index)).collect()
    }
}
