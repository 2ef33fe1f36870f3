use std::fmt::{Debug, Display};

use hashbrown::HashMap;

use thiserror::Error;

/// Numeric identifier of a piece. Dense, assigned in vocabulary insertion order.
pub type PieceId = u32;
/// Log-domain score of a piece.
pub type PieceScore = f32;

/// Kind of a vocabulary piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceKind {
    /// Ordinary subword piece, scored and eligible for segmentation.
    Normal,
    /// The single fallback piece for characters absent from the vocabulary.
    Unknown,
    /// Structural token (e.g. `<s>`, `</s>`) never produced by segmentation over input text.
    Control,
    /// Piece supplied by the caller rather than learned (pre-extracted before segmentation).
    UserDefined,
}

/// A single vocabulary entry: a subword string with its score, kind, and dense ID.
#[derive(Clone, PartialEq)]
pub struct Piece {
    pub id:    PieceId,
    pub piece: String,
    pub score: PieceScore,
    pub kind:  PieceKind,
}
impl Piece {
    pub fn new(id: PieceId, piece: impl Into<String>, score: PieceScore, kind: PieceKind) -> Self {
        Piece {
            id,
            piece: piece.into(),
            score,
            kind,
        }
    }
}
impl Display for Piece {
    #[inline(never)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Piece").field(&self.id).field(&self.piece).finish()
    }
}
impl Debug for Piece {
    #[inline(never)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Piece")
            .field("id", &self.id)
            .field("piece", &self.piece)
            .field("score", &self.score)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Error produced while constructing a [`Vocabulary`].
#[derive(Debug, Clone, Error)]
pub enum VocabularyError {
    #[error("vocabulary has no piece of kind Unknown")]
    MissingUnknownPiece,
    #[error("piece {0:?} appears more than once in the vocabulary")]
    DuplicatePiece(String),
}

/// Immutable mapping from piece string to ID, score, and kind.
///
/// Construction validates that exactly one piece has kind [`PieceKind::Unknown`] and that no
/// piece string is duplicated. `min_score` is the minimum score over all `Normal` pieces,
/// computed once and memoized.
pub struct Vocabulary {
    pieces:    Vec<Piece>,
    by_string: HashMap<String, PieceId>,
    unk_id:    PieceId,
    min_score: PieceScore,
}
impl Vocabulary {
    /// Builds a vocabulary from pieces in insertion order. IDs are assigned densely starting at
    /// 0 regardless of any `id` field already present on the input pieces.
    pub fn new(pieces: Vec<Piece>) -> Result<Self, VocabularyError> {
        let mut by_string = HashMap::with_capacity(pieces.len());
        let mut unk_id = None;
        let mut min_score = f32::INFINITY;
        let mut ordered = Vec::with_capacity(pieces.len());
        for (index, mut piece) in pieces.into_iter().enumerate() {
            let id = index as PieceId;
            piece.id = id;
            if by_string.insert(piece.piece.clone(), id).is_some() {
                return Err(VocabularyError::DuplicatePiece(piece.piece));
            }
            match piece.kind {
                PieceKind::Unknown => {
                    unk_id = Some(id);
                }
                PieceKind::Normal => {
                    min_score = min_score.min(piece.score);
                }
                PieceKind::Control | PieceKind::UserDefined => {}
            }
            ordered.push(piece);
        }
        let unk_id = unk_id.ok_or(VocabularyError::MissingUnknownPiece)?;
        Ok(Vocabulary {
            pieces: ordered,
            by_string,
            unk_id,
            min_score: if min_score.is_finite() { min_score } else { 0.0 },
        })
    }

    /// Number of pieces in the vocabulary.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// ID of the single `Unknown`-kind piece.
    #[inline(always)]
    pub fn unk_id(&self) -> PieceId {
        self.unk_id
    }

    /// Minimum score over `Normal`-kind pieces, or 0.0 if none exist.
    #[inline(always)]
    pub fn min_score(&self) -> PieceScore {
        self.min_score
    }

    /// Looks up a piece's ID. Returns `unk_id` for an absent or empty string.
    pub fn piece_to_id(&self, piece: &str) -> PieceId {
        if piece.is_empty() {
            return self.unk_id;
        }
        self.by_string.get(piece).copied().unwrap_or(self.unk_id)
    }

    /// Looks up the piece string for an ID, if in range.
    pub fn id_to_piece(&self, id: PieceId) -> Option<&str> {
        self.pieces.get(id as usize).map(|p| p.piece.as_str())
    }

    /// Full piece record for an ID, if in range.
    #[inline(always)]
    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id as usize)
    }

    /// Looks up a piece by its exact string, distinguishing "present" from "absent" (unlike
    /// [`Vocabulary::piece_to_id`], which folds absence into `unk_id`).
    pub fn lookup(&self, piece: &str) -> Option<&Piece> {
        self.by_string.get(piece).and_then(|&id| self.pieces.get(id as usize))
    }

    /// Score of a piece ID. Returns 0.0 if out of range.
    pub fn score(&self, id: PieceId) -> PieceScore {
        self.pieces.get(id as usize).map(|p| p.score).unwrap_or(0.0)
    }

    #[inline(always)]
    pub fn is_unknown(&self, id: PieceId) -> bool {
        id == self.unk_id
    }

    pub fn is_control(&self, id: PieceId) -> bool {
        self.pieces.get(id as usize).map(|p| p.kind == PieceKind::Control).unwrap_or(false)
    }

    /// All pieces, in insertion/ID order.
    #[inline(always)]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }
}
impl Debug for Vocabulary {
    #[inline(never)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("len", &self.pieces.len())
            .field("unk_id", &self.unk_id)
            .field("min_score", &self.min_score)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_pieces() -> Vec<Piece> {
        vec![
            Piece::new(0, "<s>", 0.0, PieceKind::Control),
            Piece::new(0, "</s>", 0.0, PieceKind::Control),
            Piece::new(0, "<unk>", 0.0, PieceKind::Unknown),
        ]
    }

    #[test]
    fn assigns_dense_ids_in_insertion_order() {
        let mut pieces = base_pieces();
        pieces.push(Piece::new(0, "ab", -0.1, PieceKind::Normal));
        let vocab = Vocabulary::new(pieces).unwrap();
        assert_eq!(vocab.piece_to_id("<s>"), 0);
        assert_eq!(vocab.piece_to_id("</s>"), 1);
        assert_eq!(vocab.piece_to_id("<unk>"), 2);
        assert_eq!(vocab.piece_to_id("ab"), 3);
    }

    #[test]
    fn missing_unknown_piece_is_rejected() {
        let pieces = vec![Piece::new(0, "<s>", 0.0, PieceKind::Control)];
        assert!(matches!(Vocabulary::new(pieces), Err(VocabularyError::MissingUnknownPiece)));
    }

    #[test]
    fn duplicate_piece_is_rejected() {
        let mut pieces = base_pieces();
        pieces.push(Piece::new(0, "ab", -0.1, PieceKind::Normal));
        pieces.push(Piece::new(0, "ab", -0.2, PieceKind::Normal));
        assert!(matches!(Vocabulary::new(pieces), Err(VocabularyError::DuplicatePiece(p)) if p == "ab"));
    }

    #[test]
    fn absent_or_empty_lookup_yields_unk() {
        let vocab = Vocabulary::new(base_pieces()).unwrap();
        assert_eq!(vocab.piece_to_id(""), vocab.unk_id());
        assert_eq!(vocab.piece_to_id("nope"), vocab.unk_id());
    }

    #[test]
    fn min_score_ignores_non_normal_pieces() {
        let mut pieces = base_pieces();
        pieces.push(Piece::new(0, "ab", -0.1, PieceKind::Normal));
        pieces.push(Piece::new(0, "cd", -0.9, PieceKind::Normal));
        let vocab = Vocabulary::new(pieces).unwrap();
        assert_eq!(vocab.min_score(), -0.9);
    }
}
