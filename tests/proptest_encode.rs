use lattice_piece::{Bpe, Piece, PieceKind, Unigram, Vocabulary};
use proptest::prelude::*;

fn byte_level_vocabulary() -> Vocabulary {
    let mut pieces = vec![
        Piece::new(0, "<unk>", 0.0, PieceKind::Unknown),
        Piece::new(0, "<s>", 0.0, PieceKind::Control),
        Piece::new(0, "</s>", 0.0, PieceKind::Control),
    ];
    for byte in 0u8..=127 {
        pieces.push(Piece::new(0, (byte as char).to_string(), -1.0, PieceKind::Normal));
    }
    pieces.push(Piece::new(0, "th", -0.1, PieceKind::Normal));
    pieces.push(Piece::new(0, "he", -0.1, PieceKind::Normal));
    pieces.push(Piece::new(0, "in", -0.1, PieceKind::Normal));
    pieces.push(Piece::new(0, "the", -0.05, PieceKind::Normal));
    Vocabulary::new(pieces).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn bpe_encode_never_panics_and_preserves_bytes(text in ".{0,64}") {
        let vocab = byte_level_vocabulary();
        let bpe = Bpe::new(&vocab);
        let result = bpe.encode(&text);
        let joined: Vec<u8> = result.into_iter().flat_map(|(bytes, _)| bytes).collect();
        prop_assert_eq!(joined, text.as_bytes());
    }

    #[test]
    fn unigram_encode_never_panics_and_preserves_bytes(text in ".{0,64}") {
        let vocab = byte_level_vocabulary();
        let model = Unigram::new(&vocab);
        let result = model.encode(&text);
        let joined: Vec<u8> = result.into_iter().flat_map(|(bytes, _)| bytes).collect();
        prop_assert_eq!(joined, text.as_bytes());
    }

    #[test]
    fn bpe_every_emitted_id_is_in_vocabulary_range(text in ".{0,64}") {
        let vocab = byte_level_vocabulary();
        let bpe = Bpe::new(&vocab);
        for (_, id) in bpe.encode(&text) {
            prop_assert!((id as usize) < vocab.len());
        }
    }

    #[test]
    fn unigram_every_emitted_id_is_in_vocabulary_range(text in ".{0,64}") {
        let vocab = byte_level_vocabulary();
        let model = Unigram::new(&vocab);
        for (_, id) in model.encode(&text) {
            prop_assert!((id as usize) < vocab.len());
        }
    }
}
