//! BPE segmentation model: a doubly-linked symbol list plus a priority queue of merge candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::utf8;
use crate::vocab::{PieceId, Vocabulary};

struct Symbol {
    byte_start: usize,
    byte_end:   usize,
    prev:       Option<usize>,
    next:       Option<usize>,
    freed:      bool,
}
impl Symbol {
    #[inline(always)]
    fn len(&self) -> usize {
        self.byte_end - self.byte_start
    }
}

/// A pending merge of two adjacent symbols. Ordering is by strictly greater score first, then by
/// strictly smaller left index (leftmost merges win ties). `size` is the byte length the merged
/// piece had when the candidate was created; it is revalidated against the live symbol list on
/// pop instead of eagerly fixing up or decrease-keying the heap.
struct Candidate {
    left:  usize,
    right: usize,
    score: f32,
    size:  usize,
}
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.left == other.left
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal).then_with(|| other.left.cmp(&self.left))
    }
}

/// Greedy priority-driven merge-based segmentation.
pub struct Bpe<'v> {
    vocabulary: &'v Vocabulary,
}
impl<'v> Bpe<'v> {
    pub fn new(vocabulary: &'v Vocabulary) -> Self {
        Bpe { vocabulary }
    }

    fn try_enqueue(&self, sentence: &[u8], symbols: &[Symbol], heap: &mut BinaryHeap<Candidate>, left: usize, right: usize) {
        let bytes = &sentence[symbols[left].byte_start..symbols[right].byte_end];
        let Ok(text) = std::str::from_utf8(bytes) else {
            return;
        };
        let Some(piece) = self.vocabulary.lookup(text) else {
            return;
        };
        heap.push(Candidate {
            left,
            right,
            score: piece.score,
            size: symbols[left].len() + symbols[right].len(),
        });
    }

    /// Greedily merges the highest-priority adjacent pair at a time until no further
    /// vocabulary-backed merge exists, then emits the surviving symbols left to right. Empty
    /// input returns an empty sequence.
    pub fn encode(&self, sentence: &str) -> Vec<(Vec<u8>, PieceId)> {
        if sentence.is_empty() {
            return Vec::new();
        }
        let bytes = sentence.as_bytes();
        let boundaries = utf8::char_boundaries(bytes);
        let n = boundaries.len() - 1;

        let mut symbols: Vec<Symbol> = (0..n)
            .map(|i| Symbol {
                byte_start: boundaries[i],
                byte_end: boundaries[i + 1],
                prev: if i == 0 { None } else { Some(i - 1) },
                next: if i + 1 < n { Some(i + 1) } else { None },
                freed: false,
            })
            .collect();

        let mut heap = BinaryHeap::new();
        for i in 0..n.saturating_sub(1) {
            self.try_enqueue(bytes, &symbols, &mut heap, i, i + 1);
        }

        while let Some(top) = heap.pop() {
            if symbols[top.left].freed || symbols[top.right].freed {
                continue;
            }
            if symbols[top.left].len() + symbols[top.right].len() != top.size {
                continue;
            }
            log::trace!("merging symbols {} and {} (score {})", top.left, top.right, top.score);
            symbols[top.left].byte_end = symbols[top.right].byte_end;
            symbols[top.right].freed = true;
            let right_next = symbols[top.right].next;
            symbols[top.left].next = right_next;
            if let Some(next) = right_next {
                symbols[next].prev = Some(top.left);
            }
            if let Some(prev) = symbols[top.left].prev {
                self.try_enqueue(bytes, &symbols, &mut heap, prev, top.left);
            }
            if let Some(next) = symbols[top.left].next {
                self.try_enqueue(bytes, &symbols, &mut heap, top.left, next);
            }
        }

        let mut result = Vec::new();
        let mut cur = Some(0usize);
        while let Some(i) = cur {
            let symbol = &symbols[i];
            let piece_bytes = &bytes[symbol.byte_start..symbol.byte_end];
            let id = std::str::from_utf8(piece_bytes)
                .ok()
                .and_then(|text| self.vocabulary.lookup(text))
                .map(|piece| piece.id)
                .unwrap_or(self.vocabulary.unk_id());
            result.push((piece_bytes.to_vec(), id));
            cur = symbol.next;
        }
        log::debug!("bpe encode: {} bytes -> {} pieces", sentence.len(), result.len());
        result
    }
}
