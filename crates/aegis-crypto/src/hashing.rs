/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Prefix for leaf hashes, so a leaf can never pose as an inner node.
const LEAF_PREFIX: u8 = 0x00;
/// Prefix for inner-node hashes.
const NODE_PREFIX: u8 = 0x01;

fn hash_leaf(leaf: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[LEAF_PREFIX]);
    hasher.update(leaf);
    *hasher.finalize().as_bytes()
}

fn hash_node(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// Compute the Merkle root of a list of hashes.
///
/// Leaves and inner nodes are hashed under distinct prefixes. An odd node
/// at the end of a level is promoted unchanged, never paired with itself,
/// so `[a, b, c]` and `[a, b, c, c]` have different roots.
/// Returns the zero hash for an empty input.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<Hash> = hashes.iter().map(hash_leaf).collect();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));
        for chunk in current_level.chunks(2) {
            let node = match chunk {
                [left, right] => hash_node(left, right),
                _ => chunk[0],
            };
            next_level.push(node);
        }
        current_level = next_level;
    }

    current_level[0]
}
