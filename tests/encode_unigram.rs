use lattice_piece::{Lattice, Piece, PieceKind, Unigram, Vocabulary};

mod util;
use util::*;

fn vocab_with(pieces: &[(&str, f32)]) -> Vocabulary {
    let mut entries = vec![
        Piece::new(0, "<unk>", 0.0, PieceKind::Unknown),
        Piece::new(0, "<s>", 0.0, PieceKind::Control),
        Piece::new(0, "</s>", 0.0, PieceKind::Control),
    ];
    for &(piece, score) in pieces {
        entries.push(Piece::new(0, piece, score, PieceKind::Normal));
    }
    Vocabulary::new(entries).unwrap()
}

#[test]
fn round_trips_surface_bytes_over_the_whole_input() {
    init_env();
    let vocab = vocab_with(&[("ab", -0.1), ("a", -0.4), ("b", -0.5), ("c", -0.6)]);
    let model = Unigram::new(&vocab);
    let text = "abcabc";
    let joined: Vec<u8> = model.encode(text).into_iter().flat_map(|(bytes, _)| bytes).collect();
    assert_eq!(joined, text.as_bytes());
}

#[test]
fn viterbi_path_matches_a_direct_lattice_query() {
    let vocab = vocab_with(&[("ab", 2.0), ("a", 0.0), ("b", 0.0), ("c", 0.0)]);
    let model = Unigram::new(&vocab);

    let mut lattice = Lattice::new();
    lattice.set_sentence("abc");
    model.populate_nodes(&mut lattice);
    let path = lattice.viterbi();
    let via_lattice: Vec<&[u8]> = path.iter().map(|&id| lattice.piece(id)).collect();

    let via_encode = model.encode("abc");
    let via_encode_bytes: Vec<&[u8]> = via_encode.iter().map(|(bytes, _)| bytes.as_slice()).collect();

    assert_eq!(via_lattice, via_encode_bytes);
    assert_eq!(via_encode_bytes, vec![b"ab".as_slice(), b"c".as_slice()]);
}

#[test]
fn nbest_first_result_agrees_with_viterbi() {
    let vocab = vocab_with(&[("ab", 2.0), ("bc", 5.0), ("abc", 10.0), ("a", 0.0), ("b", 0.0), ("c", 0.0)]);
    let model = Unigram::new(&vocab);

    let mut lattice = Lattice::new();
    lattice.set_sentence("abc");
    model.populate_nodes(&mut lattice);
    let best = lattice.viterbi();

    let mut lattice = Lattice::new();
    lattice.set_sentence("abc");
    model.populate_nodes(&mut lattice);
    let nbests = lattice.nbest(5);

    assert_eq!(nbests[0], best);
}

#[test]
fn marginals_over_all_positions_sum_to_one_per_position() {
    // Every vocabulary piece is distinct, so each node's id is unique and probs[id] is exactly
    // that node's own marginal rather than a sum shared with another node at a different position.
    // Every BOS-EOS path partitions the sentence into segments, so for any fixed character
    // position the nodes whose span *covers* that position (not merely those that *begin* there)
    // sum to exactly 1.0: each path contributes its marginal to precisely the one segment covering
    // that position.
    let vocab = vocab_with(&[("ab", 2.0), ("bc", 5.0), ("a", 0.0), ("b", 0.0), ("c", 0.0)]);
    let model = Unigram::new(&vocab);

    let mut lattice = Lattice::new();
    lattice.set_sentence("abc");
    model.populate_nodes(&mut lattice);
    let mut probs = vec![0.0f32; vocab.len()];
    lattice.populate_marginal(1.0, &mut probs);

    let all_nodes: Vec<_> = (0..lattice.size()).flat_map(|pos| lattice.begin_nodes(pos).to_vec()).collect();
    for covered in 0..lattice.size() {
        let position_sum: f32 = all_nodes
            .iter()
            .map(|&id| lattice.node(id))
            .filter(|node| node.pos <= covered && covered < node.pos + node.length)
            .map(|node| probs[node.id as usize])
            .sum();
        assert!((position_sum - 1.0).abs() < 1e-3, "position {covered} marginal sum was {position_sum}");
    }
}
