//! Huffman coding of the vocabulary for hierarchical softmax.

/// Position of a word in the Huffman tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    /// Branch taken at each internal node from the root down to the leaf.
    pub code: Vec<u8>,
    /// Internal nodes visited from the root down, numbered `0..n-1` where
    /// the root is `n - 2`. Each indexes a row of the softmax weights.
    pub path: Vec<u32>,
}

/// Create binary Huffman tree using the word counts.
/// Frequent words will have short unique binary codes.
///
/// `counts` must be sorted in descending order. With fewer than two words
/// there are no internal nodes and every code is empty.
#[allow(clippy::needless_range_loop)]
pub fn create_binary_tree(counts: &[u64]) -> Vec<HuffmanCode> {
    let vocab_size = counts.len();
    if vocab_size < 2 {
        return vec![HuffmanCode::default(); vocab_size];
    }
    debug_assert!(counts.windows(2).all(|w| w[0] >= w[1]));

    let mut count = vec![0u64; vocab_size * 2 + 1];
    let mut binary = vec![0u8; vocab_size * 2 + 1]; // which child a node is of its parent (0 or 1)
    let mut parent_node = vec![0usize; vocab_size * 2 + 1];

    count[..vocab_size].copy_from_slice(counts);
    for a in vocab_size..(vocab_size * 2) {
        count[a] = u64::MAX / 2;
    }

    // Leaves are consumed from the end (least frequent) towards the front,
    // new nodes from `vocab_size` upwards; both queues stay sorted.
    let mut pos1 = vocab_size;
    let mut pos2 = vocab_size;
    for a in 0..(vocab_size - 1) {
        // First, find two smallest nodes 'min1, min2'
        let min1i;
        if pos1 > 0 && count[pos1 - 1] < count[pos2] {
            pos1 -= 1;
            min1i = pos1;
        } else {
            min1i = pos2;
            pos2 += 1;
        }

        let min2i;
        if pos1 > 0 && count[pos1 - 1] < count[pos2] {
            pos1 -= 1;
            min2i = pos1;
        } else {
            min2i = pos2;
            pos2 += 1;
        }

        count[vocab_size + a] = count[min1i] + count[min2i];
        parent_node[min1i] = vocab_size + a;
        parent_node[min2i] = vocab_size + a;
        binary[min2i] = 1;
    }

    let root = vocab_size * 2 - 2;
    (0..vocab_size)
        .map(|a| {
            let mut code = vec![];
            let mut path = vec![];
            let mut b = a;
            while b != root {
                code.push(binary[b]);
                b = parent_node[b];
                path.push((b - vocab_size) as u32);
            }
            code.reverse();
            path.reverse();
            HuffmanCode { code, path }
        })
        .collect()
}
