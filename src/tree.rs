//! Divergence tree construction over numeric execution traces
//!
//! Traces are organized into a binary tree keyed by where they first diverge
//! from previously inserted traces. Each node carries one edge-segment;
//! concatenating segments along any root-to-leaf path reproduces the trace
//! originally inserted for that leaf, and the leaf carries the input label
//! that produced it. Nodes live in an arena and refer to each other by index,
//! with the parent link as a plain handle rather than an owning reference.

use crate::config::DetectorConfig;
use crate::detector::DivergenceDetector;
use crate::error::{Result, TreeError};
use serde::Serialize;
use tracing::{debug, trace};

/// Handle into the tree's node arena
pub type NodeId = usize;

/// Index-range view into one owned trace buffer
///
/// Splits reinterpret offsets instead of copying samples, so a segment never
/// owns data.
#[derive(Debug, Clone)]
struct Segment {
    buffer: usize,
    start: usize,
    end: usize,
}

/// One edge-segment of the tree
///
/// A node holds only the samples between its parent's branch point and its
/// own; it has either no children (leaf, carrying the input label for one
/// fully inserted trace) or exactly two.
#[derive(Debug, Clone)]
struct Node {
    segment: Segment,
    input: Option<String>,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Serializable summary of a tree's shape and detector state
#[derive(Debug, Clone, Serialize)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
    pub threshold: f32,
}

/// Binary divergence tree over inserted traces
///
/// The tree owns every node, every original trace buffer, and the stateful
/// divergence detector. All mutation goes through [`TraceTree::insert`];
/// callers serialize their own calls, there is no internal locking.
pub struct TraceTree {
    nodes: Vec<Node>,
    buffers: Vec<Vec<f32>>,
    root: Option<NodeId>,
    detector: DivergenceDetector,
}

impl Default for TraceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceTree {
    /// Create a tree with the default detector configuration
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            buffers: Vec::new(),
            root: None,
            detector: DivergenceDetector::from_validated(DetectorConfig::default()),
        }
    }

    /// Create a tree with a custom detector configuration
    ///
    /// The configuration is validated once, by the detector constructor, and
    /// is fixed for the life of the tree.
    pub fn with_config(config: DetectorConfig) -> Result<Self> {
        Ok(Self {
            nodes: Vec::new(),
            buffers: Vec::new(),
            root: None,
            detector: DivergenceDetector::new(config)?,
        })
    }

    /// Insert one trace with its optional input label
    ///
    /// The first trace becomes the root leaf. Every later trace descends from
    /// the root, comparing its unconsumed remainder against node segments with
    /// the shared detector, and either splits the node where it diverges or
    /// recurses into the child with the longer matching prefix.
    ///
    /// # Errors
    ///
    /// Rejects empty traces and non-finite samples up front. Returns
    /// [`TreeError::UnresolvedInsertion`] when no comparison yields a
    /// divergence (the trace matches the tree within tolerance); the tree
    /// structure is left untouched in every error case. Detector adaptation
    /// accumulated by the comparisons persists regardless of the outcome,
    /// per the detector's order-dependence contract.
    pub fn insert(&mut self, trace: &[f32], input: Option<&str>) -> Result<()> {
        validate_trace(trace)?;

        let Some(root) = self.root else {
            let segment = self.push_buffer_segment(trace, 0);
            let id = self.push_node(Node {
                segment,
                input: input.map(str::to_owned),
                parent: None,
                left: None,
                right: None,
            });
            self.root = Some(id);
            debug!(node = id, samples = trace.len(), "first trace becomes root");
            return Ok(());
        };

        let divergence = {
            let seg = &self.nodes[root].segment;
            let segment = &self.buffers[seg.buffer][seg.start..seg.end];
            self.detector.find_divergence(segment, trace)
        };
        self.insert_at(root, trace, 0, input, divergence)
    }

    /// Recursive descent: `divergence` is the detector's verdict for `trace`
    /// (past `offset`) against `node`'s own segment
    fn insert_at(
        &mut self,
        node: NodeId,
        trace: &[f32],
        offset: usize,
        input: Option<&str>,
        divergence: Option<usize>,
    ) -> Result<()> {
        if let Some(point) = divergence {
            self.split(node, trace, offset, point, input);
            return Ok(());
        }

        let (left, right) = match (self.nodes[node].left, self.nodes[node].right) {
            (Some(left), Some(right)) => (left, right),
            // Leaf with no divergence: the trace matches this path within
            // tolerance and there is nothing to attach it to.
            _ => return Err(TreeError::UnresolvedInsertion),
        };

        let consumed = offset + self.segment_len(node);
        if consumed >= trace.len() {
            return Err(TreeError::UnresolvedInsertion);
        }
        let rest = &trace[consumed..];

        let left_divergence = {
            let seg = &self.nodes[left].segment;
            let segment = &self.buffers[seg.buffer][seg.start..seg.end];
            self.detector.find_divergence(segment, rest)
        };
        let right_divergence = {
            let seg = &self.nodes[right].segment;
            let segment = &self.buffers[seg.buffer][seg.start..seg.end];
            self.detector.find_divergence(segment, rest)
        };
        trace!(
            node,
            ?left_divergence,
            ?right_divergence,
            "comparing children for descent"
        );

        // Longer match wins: descend into the child whose divergence index is
        // larger. Ties and an inconclusive left both fall through to the
        // right child.
        match (left_divergence, right_divergence) {
            (Some(l), Some(r)) if l > r => self.insert_at(left, trace, consumed, input, Some(l)),
            (Some(l), None) => self.insert_at(left, trace, consumed, input, Some(l)),
            (_, Some(r)) => self.insert_at(right, trace, consumed, input, Some(r)),
            (None, None) => Err(TreeError::UnresolvedInsertion),
        }
    }

    /// Split `node` at `point`: a new internal parent takes the shared prefix
    /// of the node's segment, the node keeps the rest, and the new trace's
    /// remainder becomes the right leaf
    fn split(&mut self, node: NodeId, trace: &[f32], offset: usize, point: usize, input: Option<&str>) {
        let leaf_segment = self.push_buffer_segment(trace, offset + point);
        let old_parent = self.nodes[node].parent;
        let seg = self.nodes[node].segment.clone();

        let parent_id = self.push_node(Node {
            segment: Segment {
                buffer: seg.buffer,
                start: seg.start,
                end: seg.start + point,
            },
            // Labels stay on leaves; a split-created internal node carries none.
            input: None,
            parent: old_parent,
            left: None,
            right: None,
        });
        let leaf_id = self.push_node(Node {
            segment: leaf_segment,
            input: input.map(str::to_owned),
            parent: Some(parent_id),
            left: None,
            right: None,
        });

        self.nodes[node].segment.start = seg.start + point;
        self.nodes[node].parent = Some(parent_id);
        self.nodes[parent_id].left = Some(node);
        self.nodes[parent_id].right = Some(leaf_id);

        match old_parent {
            None => {
                self.root = Some(parent_id);
                debug!(
                    new_root = parent_id,
                    split_at = point,
                    "root split into internal parent"
                );
            }
            Some(grandparent) => {
                if self.nodes[grandparent].left == Some(node) {
                    self.nodes[grandparent].left = Some(parent_id);
                } else {
                    self.nodes[grandparent].right = Some(parent_id);
                }
                debug!(
                    grandparent,
                    new_parent = parent_id,
                    split_at = point,
                    "updating parent links"
                );
            }
        }
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root node, if any trace has been inserted
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Segment of samples carried by one node (parent's branch point to this
    /// node's own)
    pub fn segment(&self, node: NodeId) -> &[f32] {
        let seg = &self.nodes[node].segment;
        &self.buffers[seg.buffer][seg.start..seg.end]
    }

    /// Input label attached to a node (`None` for internal nodes)
    pub fn input(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].input.as_deref()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn left(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].left
    }

    pub fn right(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].right
    }

    /// Leaf ids in pre-order
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut out);
        }
        out
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        match self.root {
            Some(root) => self.depth_below(root),
            None => 0,
        }
    }

    /// Concatenate segments from the root down to `node`
    ///
    /// For a leaf this reproduces the originally inserted trace, exactly:
    /// segments are views into the original buffers, so no tolerance is lost.
    pub fn reconstruct(&self, node: NodeId) -> Vec<f32> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent {
            path.push(parent);
            current = parent;
        }
        let mut out = Vec::new();
        for &id in path.iter().rev() {
            out.extend_from_slice(self.segment(id));
        }
        out
    }

    /// Detector's live threshold (static until its baseline fills)
    pub fn current_threshold(&self) -> f32 {
        self.detector.current_threshold()
    }

    /// Configuration the tree's detector runs with
    pub fn config(&self) -> &DetectorConfig {
        self.detector.config()
    }

    /// Shape and detector-state summary for reporting
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes: self.len(),
            leaves: self.leaf_count(),
            depth: self.depth(),
            threshold: self.current_threshold(),
        }
    }

    /// Render the tree as one line per node, pre-order, indented by depth
    pub fn format_tree(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.format_node(root, 0, &mut out);
        }
        out
    }

    /// Print the diagnostic dump to stderr; read-only
    pub fn display(&self) {
        eprint!("{}", self.format_tree());
    }

    fn format_node(&self, node: NodeId, level: usize, out: &mut String) {
        let input = match self.input(node) {
            Some(label) => format!("{label:?}"),
            None => "None".to_string(),
        };
        out.push_str(&format!(
            "{}Node(len={}, input={})\n",
            "  ".repeat(level),
            self.segment_len(node),
            input
        ));
        for child in [self.nodes[node].left, self.nodes[node].right].into_iter().flatten() {
            self.format_node(child, level + 1, out);
        }
    }

    fn collect_leaves(&self, node: NodeId, out: &mut Vec<NodeId>) {
        match (self.nodes[node].left, self.nodes[node].right) {
            (None, None) => out.push(node),
            (left, right) => {
                for child in [left, right].into_iter().flatten() {
                    self.collect_leaves(child, out);
                }
            }
        }
    }

    fn depth_below(&self, node: NodeId) -> usize {
        let below = [self.nodes[node].left, self.nodes[node].right]
            .into_iter()
            .flatten()
            .map(|child| self.depth_below(child))
            .max()
            .unwrap_or(0);
        1 + below
    }

    fn segment_len(&self, node: NodeId) -> usize {
        let seg = &self.nodes[node].segment;
        seg.end - seg.start
    }

    fn push_buffer_segment(&mut self, trace: &[f32], start: usize) -> Segment {
        self.buffers.push(trace.to_vec());
        Segment {
            buffer: self.buffers.len() - 1,
            start,
            end: trace.len(),
        }
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

fn validate_trace(trace: &[f32]) -> Result<()> {
    if trace.is_empty() {
        return Err(TreeError::EmptyTrace);
    }
    for (index, &value) in trace.iter().enumerate() {
        if !value.is_finite() {
            return Err(TreeError::NonFiniteSample { index, value });
        }
    }
    Ok(())
}
