//! Typed job graphs.
//!
//! A [`JobGraph`] is a DAG of operation nodes keyed by node id. Each
//! input of a node is either a literal JSON value or a link to an output
//! slot of another node in the same graph. On the wire a link is the
//! two-element array `["<node-id>", <slot>]`, which is exactly what
//! ComfyUI expects inside a `/prompt` submission.
//!
//! Graphs are validated with [`JobGraph::validate`] before submission so
//! that dangling references and cycles fail fast on the client instead of
//! being rejected late by the engine.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node references
// ---------------------------------------------------------------------------

/// Index of one output of a node.
///
/// Templates use named constants (see [`crate::workflows::slots`]) rather
/// than bare integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSlot(pub u32);

impl OutputSlot {
    /// The first (and for most nodes, only) output.
    pub const FIRST: OutputSlot = OutputSlot(0);
}

/// A reference to `slot` of the node with id `node`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, OutputSlot)", into = "(String, OutputSlot)")]
pub struct NodeRef {
    pub node: String,
    pub slot: OutputSlot,
}

impl NodeRef {
    pub fn new(node: impl Into<String>, slot: OutputSlot) -> Self {
        Self {
            node: node.into(),
            slot,
        }
    }
}

impl From<(String, OutputSlot)> for NodeRef {
    fn from((node, slot): (String, OutputSlot)) -> Self {
        Self { node, slot }
    }
}

impl From<NodeRef> for (String, OutputSlot) {
    fn from(r: NodeRef) -> Self {
        (r.node, r.slot)
    }
}

// ---------------------------------------------------------------------------
// Inputs and nodes
// ---------------------------------------------------------------------------

/// A single named input of a node.
///
/// Deserialization tries [`InputValue::Link`] first, so any two-element
/// `[string, integer]` array is read as a link, matching the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeRef),
    Literal(serde_json::Value),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&NodeRef> {
        match self {
            InputValue::Link(r) => Some(r),
            InputValue::Literal(_) => None,
        }
    }
}

impl From<NodeRef> for InputValue {
    fn from(r: NodeRef) -> Self {
        InputValue::Link(r)
    }
}

impl From<serde_json::Value> for InputValue {
    fn from(v: serde_json::Value) -> Self {
        InputValue::Literal(v)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for InputValue {
                fn from(v: $ty) -> Self {
                    InputValue::Literal(serde_json::Value::from(v))
                }
            }
        )*
    };
}

literal_from!(&str, String, bool, i64, u64, u32, f64);

/// One operation node: the engine-side operation name plus its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Operation name, e.g. `CLIPTextEncode`.
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
}

impl NodeSpec {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Builder-style input setter.
    pub fn input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// All inputs that link to another node, as `(input name, reference)`.
    pub fn links(&self) -> impl Iterator<Item = (&str, &NodeRef)> {
        self.inputs
            .iter()
            .filter_map(|(name, value)| value.as_link().map(|r| (name.as_str(), r)))
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Structural problems detected by [`JobGraph::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("graph has no nodes")]
    Empty,

    #[error("node {node} has an empty operation name")]
    EmptyOperation { node: String },

    #[error("input {input} of node {node} references missing node {target}")]
    DanglingReference {
        node: String,
        input: String,
        target: String,
    },

    #[error("graph contains a cycle through node {node}")]
    Cycle { node: String },
}

/// A DAG of operation nodes submitted to the engine as one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGraph {
    nodes: BTreeMap<String, NodeSpec>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style node insertion. A node with the same id is replaced.
    pub fn with_node(mut self, id: impl Into<String>, spec: NodeSpec) -> Self {
        self.insert(id, spec);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, spec: NodeSpec) -> Option<NodeSpec> {
        self.nodes.insert(id.into(), spec)
    }

    pub fn get(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeSpec)> {
        self.nodes.iter().map(|(id, spec)| (id.as_str(), spec))
    }

    /// Check referential integrity and acyclicity.
    ///
    /// Checks run in a fixed order (empty graph, operation names, dangling
    /// references, cycles) and the first problem found is returned.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        for (id, spec) in &self.nodes {
            if spec.class_type.trim().is_empty() {
                return Err(GraphError::EmptyOperation { node: id.clone() });
            }
        }

        for (id, spec) in &self.nodes {
            for (input, link) in spec.links() {
                if !self.nodes.contains_key(&link.node) {
                    return Err(GraphError::DanglingReference {
                        node: id.clone(),
                        input: input.to_string(),
                        target: link.node.clone(),
                    });
                }
            }
        }

        match self.find_cycle() {
            Some(node) => Err(GraphError::Cycle { node }),
            None => Ok(()),
        }
    }

    /// Depth-first walk along links with an explicit stack. Returns the id
    /// of the first node reached while it is still on the stack.
    fn find_cycle(&self) -> Option<String> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());

        for root in self.nodes.keys() {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            marks.insert(root.as_str(), Mark::Visiting);
            let mut stack = vec![(root.as_str(), self.link_targets(root))];

            while let Some((id, targets)) = stack.last_mut() {
                let id = *id;
                match targets.next() {
                    Some(next) => match marks.get(next) {
                        Some(Mark::Done) => {}
                        Some(Mark::Visiting) => return Some(next.to_string()),
                        None => {
                            marks.insert(next, Mark::Visiting);
                            stack.push((next, self.link_targets(next)));
                        }
                    },
                    None => {
                        marks.insert(id, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    fn link_targets(&self, id: &str) -> std::vec::IntoIter<&str> {
        self.nodes
            .get(id)
            .map(|spec| spec.links().map(|(_, link)| link.node.as_str()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
    }
}
