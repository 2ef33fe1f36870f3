//! Arena-based word lattice used by the Unigram model.
//!
//! The Lattice owns every [`Node`] it creates; all cross-references — `begin_nodes`,
//! `end_nodes`, and a node's `prev` back-pointer — are indices into that arena rather than
//! pointers, so the whole structure can be cleared and rebuilt for a new sentence without any
//! lifetime gymnastics.

use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::rc::Rc;

use bstr::ByteSlice;

use crate::utf8;

/// Handle to a node owned by a [`Lattice`]. Valid only until the next `clear`/`set_sentence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A candidate segment of the sentence: some byte range, a vocabulary id (or `-1` for the BOS/EOS
/// sentinels), and the bookkeeping Viterbi/NBest need.
#[derive(Debug, Clone)]
pub struct Node {
    pub pos:             usize,
    pub length:          usize,
    pub id:               i64,
    pub score:           f32,
    pub backtrace_score: f32,
    pub prev:             Option<NodeId>,
    pub node_id:         usize,
    byte_start:          usize,
    byte_end:            usize,
}

/// The word lattice over one fixed sentence.
///
/// `begin_nodes[p]`/`end_nodes[p]` list, in insertion order, the nodes that start/end at
/// character position `p`. BOS lives only in `end_nodes[0]`; EOS lives only in
/// `begin_nodes[size()]`. A lattice is *complete* when every position `0..size()` has at least
/// one node beginning there — Viterbi, NBest, and PopulateMarginal all require this and panic
/// otherwise, mirroring the source library's fatal `IncompleteLattice` check.
pub struct Lattice {
    sentence:    Vec<u8>,
    boundaries:  Vec<usize>,
    nodes:       Vec<Node>,
    begin_nodes: Vec<Vec<NodeId>>,
    end_nodes:   Vec<Vec<NodeId>>,
    bos:         Option<NodeId>,
    eos:         Option<NodeId>,
}
impl Default for Lattice {
    fn default() -> Self {
        Self::new()
    }
}
impl Lattice {
    pub fn new() -> Self {
        Lattice {
            sentence:    Vec::new(),
            boundaries:  vec![0],
            nodes:       Vec::new(),
            begin_nodes: Vec::new(),
            end_nodes:   Vec::new(),
            bos:         None,
            eos:         None,
        }
    }

    /// Releases all nodes and sentence state. `size()`/`utf8_size()` become 0.
    pub fn clear(&mut self) {
        self.sentence.clear();
        self.boundaries = vec![0];
        self.nodes.clear();
        self.begin_nodes.clear();
        self.end_nodes.clear();
        self.bos = None;
        self.eos = None;
    }

    /// Resets the lattice to a fresh sentence, installing BOS/EOS sentinels.
    pub fn set_sentence(&mut self, sentence: impl Into<Vec<u8>>) {
        self.clear();
        self.sentence = sentence.into();
        self.boundaries = utf8::char_boundaries(&self.sentence);
        let n = self.size();
        self.begin_nodes = vec![Vec::new(); n + 1];
        self.end_nodes = vec![Vec::new(); n + 1];
        let bos = self.push_sentinel(0);
        let eos = self.push_sentinel(n);
        self.end_nodes[0].push(bos);
        self.begin_nodes[n].push(eos);
        self.bos = Some(bos);
        self.eos = Some(eos);
        log::trace!("set_sentence: {} characters, {} bytes", n, self.sentence.len());
    }

    fn push_sentinel(&mut self, pos: usize) -> NodeId {
        let byte = self.boundaries[pos];
        let node_id = self.nodes.len();
        self.nodes.push(Node {
            pos,
            length: 0,
            id: -1,
            score: 0.0,
            backtrace_score: 0.0,
            prev: None,
            node_id,
            byte_start: byte,
            byte_end: byte,
        });
        NodeId(node_id)
    }

    /// Number of characters in the current sentence.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Byte length of the current sentence.
    #[inline(always)]
    pub fn utf8_size(&self) -> usize {
        self.sentence.len()
    }

    #[inline(always)]
    pub fn sentence(&self) -> &[u8] {
        &self.sentence
    }

    /// Byte suffix of the sentence starting at character `pos`.
    pub fn surface(&self, pos: usize) -> &[u8] {
        &self.sentence[self.boundaries[pos]..]
    }

    /// Byte length of the character at `pos`.
    pub fn char_byte_len(&self, pos: usize) -> usize {
        self.boundaries[pos + 1] - self.boundaries[pos]
    }

    pub fn bos_node(&self) -> NodeId {
        self.bos.expect("set_sentence must be called before bos_node")
    }

    pub fn eos_node(&self) -> NodeId {
        self.eos.expect("set_sentence must be called before eos_node")
    }

    #[inline(always)]
    pub fn begin_nodes(&self, pos: usize) -> &[NodeId] {
        &self.begin_nodes[pos]
    }

    #[inline(always)]
    pub fn end_nodes(&self, pos: usize) -> &[NodeId] {
        &self.end_nodes[pos]
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline(always)]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Byte-range view of a node's piece into the sentence.
    pub fn piece(&self, id: NodeId) -> &[u8] {
        let node = &self.nodes[id.0];
        &self.sentence[node.byte_start..node.byte_end]
    }

    /// Creates a node spanning characters `[pos, pos + length)`. Preconditions: `pos + length <=
    /// size()`, `length >= 1`.
    pub fn insert(&mut self, pos: usize, length: usize) -> NodeId {
        let n = self.size();
        assert!(pos + length <= n, "insert [{pos}, {pos}+{length}) exceeds lattice size {n}");
        assert!(length >= 1, "insert length must be at least 1");
        let byte_start = self.boundaries[pos];
        let byte_end = self.boundaries[pos + length];
        let node_id = self.nodes.len();
        let id = NodeId(node_id);
        self.nodes.push(Node {
            pos,
            length,
            id: -1,
            score: 0.0,
            backtrace_score: 0.0,
            prev: None,
            node_id,
            byte_start,
            byte_end,
        });
        self.begin_nodes[pos].push(id);
        self.end_nodes[pos + length].push(id);
        id
    }

    fn assert_complete(&self) {
        for pos in 0..self.size() {
            assert!(!self.begin_nodes[pos].is_empty(), "incomplete lattice at position {pos}");
        }
    }

    /// Forward max-plus pass: for every node in increasing position order, sets
    /// `backtrace_score` to the best score of a path from BOS through that node (inclusive), and
    /// `prev` to the predecessor achieving it. Ties keep the first predecessor in insertion
    /// order.
    fn forward(&mut self) {
        for node in &mut self.nodes {
            node.backtrace_score = 0.0;
            node.prev = None;
        }
        let n = self.size();
        for pos in 0..=n {
            for &node_id in &self.begin_nodes[pos] {
                let node_score = self.nodes[node_id.0].score;
                let mut best_score = f32::NEG_INFINITY;
                let mut best_prev = None;
                for &prev_id in &self.end_nodes[pos] {
                    let candidate = self.nodes[prev_id.0].backtrace_score + node_score;
                    if candidate > best_score {
                        best_score = candidate;
                        best_prev = Some(prev_id);
                    }
                }
                let node = &mut self.nodes[node_id.0];
                node.backtrace_score = best_score;
                node.prev = best_prev;
            }
        }
    }

    /// Maximum-score path from BOS to EOS, excluding the sentinels themselves. Panics if the
    /// lattice is incomplete.
    pub fn viterbi(&mut self) -> Vec<NodeId> {
        self.assert_complete();
        self.forward();
        let bos = self.bos_node();
        let mut path = Vec::new();
        let mut cur = self.nodes[self.eos_node().0].prev;
        while let Some(node_id) = cur {
            if node_id == bos {
                break;
            }
            path.push(node_id);
            cur = self.nodes[node_id.0].prev;
        }
        path.reverse();
        path
    }

    /// Up to `k` distinct best paths in decreasing total-score order, via a lazy best-first
    /// search from EOS back to BOS. The per-node `backtrace_score` from a prior `forward()` pass
    /// is an exact admissible heuristic (it is the true best score from BOS to that node), so the
    /// search never needs to revisit a popped hypothesis. Ties broken by smaller `node_id`.
    pub fn nbest(&mut self, k: usize) -> Vec<Vec<NodeId>> {
        self.assert_complete();
        if k == 0 {
            return Vec::new();
        }
        self.forward();

        struct Frame {
            node: NodeId,
            next: Option<Rc<Frame>>,
        }
        struct Entry {
            fx:      f32,
            node_id: usize,
            gx:      f32,
            frame:   Rc<Frame>,
        }
        impl PartialEq for Entry {
            fn eq(&self, other: &Self) -> bool {
                self.fx == other.fx && self.node_id == other.node_id
            }
        }
        impl Eq for Entry {}
        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Entry {
            fn cmp(&self, other: &Self) -> Ordering {
                self.fx
                    .partial_cmp(&other.fx)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| other.node_id.cmp(&self.node_id))
            }
        }

        let bos = self.bos_node();
        let eos = self.eos_node();
        let mut heap = std::collections::BinaryHeap::new();
        heap.push(Entry {
            fx:      self.nodes[eos.0].backtrace_score,
            node_id: self.nodes[eos.0].node_id,
            gx:      0.0,
            frame:   Rc::new(Frame { node: eos, next: None }),
        });

        let mut results = Vec::new();
        while results.len() < k {
            let Some(entry) = heap.pop() else { break };
            let tail = entry.frame.node;
            if tail == bos {
                let mut path = Vec::new();
                let mut cur = entry.frame.next.clone();
                while let Some(frame) = cur {
                    if frame.node == eos {
                        break;
                    }
                    path.push(frame.node);
                    cur = frame.next.clone();
                }
                results.push(path);
                continue;
            }
            let tail_node = &self.nodes[tail.0];
            let tail_score = tail_node.score;
            let tail_pos = tail_node.pos;
            for &pred in &self.end_nodes[tail_pos] {
                let gx = entry.gx + tail_score;
                let fx = gx + self.nodes[pred.0].backtrace_score;
                heap.push(Entry {
                    fx,
                    node_id: self.nodes[pred.0].node_id,
                    gx,
                    frame: Rc::new(Frame { node: pred, next: Some(entry.frame.clone()) }),
                });
            }
        }
        results
    }

    /// Forward-backward over the `(+, log-sum-exp)` semiring. Adds `freq * marginal(v)` to
    /// `probs[v.id]` for every real node `v`, and returns `logZ`.
    ///
    /// `alpha(v)` and `beta(v)` exclude `v`'s own score (it is added once in the marginal
    /// formula): `alpha(v) = logsumexp` over predecessors `pr` of `alpha(pr) + pr.score`, and
    /// symmetrically for `beta`. `logZ = alpha(EOS) = beta(BOS)`.
    pub fn populate_marginal(&mut self, freq: f32, probs: &mut [f32]) -> f32 {
        self.assert_complete();
        let n = self.size();
        let bos = self.bos_node();
        let eos = self.eos_node();

        let mut alpha = vec![f32::NEG_INFINITY; self.nodes.len()];
        alpha[bos.0] = 0.0;
        for pos in 0..=n {
            for &node_id in &self.begin_nodes[pos] {
                let mut acc = f32::NEG_INFINITY;
                for &pred in &self.end_nodes[pos] {
                    acc = logsumexp(acc, alpha[pred.0] + self.nodes[pred.0].score);
                }
                alpha[node_id.0] = acc;
            }
        }

        let mut beta = vec![f32::NEG_INFINITY; self.nodes.len()];
        beta[eos.0] = 0.0;
        for pos in (0..=n).rev() {
            for &node_id in &self.end_nodes[pos] {
                let succ_pos = self.nodes[node_id.0].pos + self.nodes[node_id.0].length;
                let mut acc = f32::NEG_INFINITY;
                for &succ in &self.begin_nodes[succ_pos] {
                    acc = logsumexp(acc, beta[succ.0] + self.nodes[succ.0].score);
                }
                beta[node_id.0] = acc;
            }
        }

        let log_z = alpha[eos.0];
        for pos in 0..n {
            for &node_id in &self.begin_nodes[pos] {
                let node = &self.nodes[node_id.0];
                let marginal = (alpha[node_id.0] + node.score + beta[node_id.0] - log_z).exp();
                if let Some(slot) = probs.get_mut(node.id as usize) {
                    *slot += freq * marginal;
                }
            }
        }
        log_z
    }
}

impl Debug for Lattice {
    #[inline(never)]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Lattice")
            .field("sentence", &self.sentence.as_bstr())
            .field("size", &self.size())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

fn logsumexp(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}
