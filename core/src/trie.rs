//! Arena-backed trie keyed by unit strings.
//!
//! Nodes live in a flat `Vec` and refer to each other by index, so the
//! structure has no pointer graph to manage and can be walked breadth-first
//! for serialization. Removed subtrees return their slots to a free list.
//!
//! Keys are walked in the order the caller supplies; the lexicon feeds its
//! units last-to-first.
//!
//! # Example
//! ```
//! use libchat_core::trie::Trie;
//!
//! let mut trie: Trie<u32> = Trie::new();
//! let node = trie.insert_path(["好", "你"]);
//! *trie.value_mut(node) = 7;
//!
//! assert_eq!(trie.walk(["好", "你"]).map(|n| *trie.value(n)), Some(7));
//! assert_eq!(trie.walk(["好", "他"]), None);
//! ```
use ahash::AHashMap;

/// Index of a node inside a [`Trie`].
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    parent: Option<NodeId>,
    key: String,
    children: AHashMap<String, NodeId>,
}

#[derive(Debug, Clone)]
pub struct Trie<T> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
}

impl<T: Default> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> Trie<T> {
    pub const ROOT: NodeId = 0;

    /// Create a trie holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                value: T::default(),
                parent: None,
                key: String::new(),
                children: AHashMap::new(),
            }],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, parent: NodeId, key: &str) -> NodeId {
        let node = Node {
            value: T::default(),
            parent: Some(parent),
            key: key.to_string(),
            children: AHashMap::new(),
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    pub fn child(&self, node: NodeId, key: &str) -> Option<NodeId> {
        self.nodes[node].children.get(key).copied()
    }

    /// Child of `node` under `key`, created with a default value if missing.
    pub fn child_or_insert(&mut self, node: NodeId, key: &str) -> NodeId {
        if let Some(id) = self.child(node, key) {
            return id;
        }
        let id = self.alloc(node, key);
        self.nodes[node].children.insert(key.to_string(), id);
        id
    }

    /// Follow `keys` from the root. `None` as soon as an edge is missing.
    pub fn walk<I, S>(&self, keys: I) -> Option<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node = Self::ROOT;
        for key in keys {
            node = self.child(node, key.as_ref())?;
        }
        Some(node)
    }

    /// Follow `keys` from the root, creating missing nodes.
    pub fn insert_path<I, S>(&mut self, keys: I) -> NodeId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node = Self::ROOT;
        for key in keys {
            node = self.child_or_insert(node, key.as_ref());
        }
        node
    }

    pub fn value(&self, node: NodeId) -> &T {
        &self.nodes[node].value
    }

    pub fn value_mut(&mut self, node: NodeId) -> &mut T {
        &mut self.nodes[node].value
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        !self.nodes[node].children.is_empty()
    }

    /// Children of `node` as `(key, id)`, sorted by key.
    pub fn children(&self, node: NodeId) -> Vec<(&str, NodeId)> {
        let mut out: Vec<(&str, NodeId)> = self.nodes[node]
            .children
            .iter()
            .map(|(k, &id)| (k.as_str(), id))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Detach `node` (and everything below it) from its parent. The root
    /// cannot be removed.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node].parent else {
            return false;
        };
        let key = std::mem::take(&mut self.nodes[node].key);
        self.nodes[parent].children.remove(&key);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let children = std::mem::take(&mut self.nodes[id].children);
            stack.extend(children.into_values());
            self.nodes[id].parent = None;
            self.nodes[id].value = T::default();
            self.free.push(id);
        }
        true
    }

    /// Remove `node` and then each ancestor that is left childless, as long
    /// as `dead` holds for it. Stops at the root.
    pub fn prune(&mut self, node: NodeId, dead: impl Fn(&T) -> bool) {
        let mut current = node;
        while current != Self::ROOT && !self.has_children(current) && dead(&self.nodes[current].value) {
            let parent = self.nodes[current].parent.unwrap_or(Self::ROOT);
            self.remove(current);
            current = parent;
        }
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}
