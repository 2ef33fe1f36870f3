//! Unigram segmentation model: populates a [`Lattice`] from a [`Vocabulary`] and runs Viterbi.

use hashbrown::HashMap;

use crate::lattice::Lattice;
use crate::vocab::{PieceId, Vocabulary};

/// Penalty subtracted from `min_score` for the synthetic unknown node inserted at any position
/// with no matching vocabulary piece, so unknowns are always strictly worse than any real piece.
const UNKNOWN_PENALTY: f32 = 10.0;

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    /// Set when a vocabulary piece ends exactly here.
    piece:    Option<(PieceId, f32)>,
}

/// Prefix trie over `Normal`-kind vocabulary pieces, keyed by character (not byte), so that
/// `PopulateNodes` can enumerate every piece that is a prefix of a suffix in time proportional to
/// the number of matches rather than the vocabulary size.
struct Trie {
    root: TrieNode,
}
impl Trie {
    fn build(vocabulary: &Vocabulary) -> Self {
        let mut root = TrieNode::default();
        for piece in vocabulary.pieces() {
            if piece.kind != crate::vocab::PieceKind::Normal {
                continue;
            }
            let mut node = &mut root;
            for ch in piece.piece.chars() {
                node = node.children.entry(ch).or_default();
            }
            node.piece = Some((piece.id, piece.score));
        }
        Trie { root }
    }

    /// All (character length, id, score) matches for vocabulary pieces that are a prefix of
    /// `chars`.
    fn prefix_matches(&self, chars: &[char]) -> Vec<(usize, PieceId, f32)> {
        let mut matches = Vec::new();
        let mut node = &self.root;
        for (i, &ch) in chars.iter().enumerate() {
            let Some(next) = node.children.get(&ch) else {
                break;
            };
            node = next;
            if let Some((id, score)) = node.piece {
                matches.push((i + 1, id, score));
            }
        }
        matches
    }
}

/// Probabilistic segmentation model over a word lattice.
pub struct Unigram<'v> {
    vocabulary: &'v Vocabulary,
    trie:       Trie,
}
impl<'v> Unigram<'v> {
    pub fn new(vocabulary: &'v Vocabulary) -> Self {
        Unigram { vocabulary, trie: Trie::build(vocabulary) }
    }

    /// Inserts one node per vocabulary-prefix match at every character position. Any position
    /// with no `Normal`-piece match gets a single-character unknown node, so the lattice is
    /// always complete.
    pub fn populate_nodes(&self, lattice: &mut Lattice) {
        let n = lattice.size();
        // Decoded per lattice character position, so this stays aligned with the lattice's own
        // lenient UTF-8 bookkeeping even over malformed input (a malformed byte decodes to the
        // replacement character, which no vocabulary piece can match).
        let chars: Vec<char> = (0..n)
            .map(|pos| {
                let len = lattice.char_byte_len(pos);
                let bytes = &lattice.surface(pos)[..len];
                std::str::from_utf8(bytes).ok().and_then(|s| s.chars().next()).unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect();
        for pos in 0..n {
            let suffix = &chars[pos..];
            let matches = self.trie.prefix_matches(suffix);
            if matches.is_empty() {
                let node_id = lattice.insert(pos, 1);
                let node = lattice.node_mut(node_id);
                node.id = self.vocabulary.unk_id() as i64;
                node.score = self.vocabulary.min_score() - UNKNOWN_PENALTY;
            } else {
                for (len, id, score) in matches {
                    let node_id = lattice.insert(pos, len);
                    let node = lattice.node_mut(node_id);
                    node.id = id as i64;
                    node.score = score;
                }
            }
        }
    }

    /// Segments `sentence` with Viterbi over a freshly populated lattice. Empty input returns an
    /// empty sequence without touching the lattice.
    pub fn encode(&self, sentence: &str) -> Vec<(Vec<u8>, PieceId)> {
        if sentence.is_empty() {
            return Vec::new();
        }
        let mut lattice = Lattice::new();
        lattice.set_sentence(sentence.as_bytes());
        self.populate_nodes(&mut lattice);
        let path = lattice.viterbi();
        log::debug!("unigram encode: {} bytes -> {} pieces", sentence.len(), path.len());
        path.into_iter()
            .map(|id| {
                let node = lattice.node(id);
                (lattice.piece(id).to_vec(), node.id as PieceId)
            })
            .collect()
    }
}
