//! **Subword segmentation core.**
//!
//! Given a trained [`Vocabulary`] of subword pieces and an input string, produces a segmentation
//! of that string into pieces from the vocabulary, with unseen characters falling back to an
//! unknown piece. Two independent segmentation models are provided:
//!
//! - [`Bpe`] — greedy best-first merging over an initially character-level symbol list, driven
//!   by per-piece priority scores.
//! - [`Unigram`] — probabilistic segmentation over a word [`Lattice`] with Viterbi best-path
//!   search, backed by [`lattice`] primitives also usable directly for N-best enumeration and
//!   forward-backward posterior marginals.
//!
//! Training vocabularies, normalizing input, and loading model files are out of scope here: this
//! crate consumes an already-trained [`Vocabulary`] and an already-normalized string.
//!
//! # Examples
//!
//! ```
//! use lattice_piece::{Bpe, Piece, PieceKind, Vocabulary};
//!
//! let vocab = Vocabulary::new(vec![
//!     Piece::new(0, "<unk>", 0.0, PieceKind::Unknown),
//!     Piece::new(0, "ab", -0.1, PieceKind::Normal),
//!     Piece::new(0, "a", -0.4, PieceKind::Normal),
//!     Piece::new(0, "b", -0.5, PieceKind::Normal),
//! ])?;
//! let bpe = Bpe::new(&vocab);
//! let tokens = bpe.encode("ab");
//! assert_eq!(tokens.len(), 1);
//! # Ok::<(), lattice_piece::VocabularyError>(())
//! ```

mod bpe;
mod lattice;
mod unigram;
mod utf8;
mod vocab;

pub use bpe::Bpe;
pub use lattice::{Lattice, Node, NodeId};
pub use unigram::Unigram;
pub use vocab::{Piece, PieceId, PieceKind, PieceScore, Vocabulary, VocabularyError};
