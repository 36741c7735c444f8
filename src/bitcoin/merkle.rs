use crate::bitcoin::{Hash, MerkleRoot, TxHash};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Calculate the merkle root from an ordered list of transaction hashes.
///
/// The tree is built bottom-up: levels with odd length duplicate their last node, and a
/// parent is the double SHA256 of the concatenated children. A single transaction is its
/// own root. An empty list has no defined root.
pub fn merkle_root(tx_hashes: &[TxHash]) -> Result<MerkleRoot> {
    if tx_hashes.is_empty() {
        return Err(Error::BadArgument(
            "cannot calculate the merkle root of an empty transaction list".to_string(),
        ));
    }
    if tx_hashes.len() == 1 {
        return Ok(tx_hashes[0]);
    }

    let mut level: Vec<Hash> = tx_hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            let left = &level[i];
            // the last node of an odd level pairs with itself
            let right = level.get(i + 1).unwrap_or(left);
            next.push(hash_merkle_branches(left, right));
            i += 2;
        }
        level = next;
    }
    Ok(level[0])
}

/// Hash two merkle siblings into their parent node.
fn hash_merkle_branches(left: &Hash, right: &Hash) -> Hash {
    let mut data = BytesMut::with_capacity(64);
    data.put_slice(&left.raw);
    data.put_slice(&right.raw);
    Hash::sha256d(&data)
}

/// Build the merkle branch proving that the transaction at `index` is part of the tree.
///
/// The proof is the list of sibling hashes from the leaf level up to (but excluding)
/// the root.
pub fn merkle_proof(tx_hashes: &[TxHash], index: usize) -> Result<Vec<Hash>> {
    if tx_hashes.is_empty() {
        return Err(Error::BadArgument(
            "cannot build a merkle proof for an empty transaction list".to_string(),
        ));
    }
    if index >= tx_hashes.len() {
        return Err(Error::BadArgument(format!(
            "transaction index {} out of bounds for {} transactions",
            index,
            tx_hashes.len()
        )));
    }

    let mut proof = Vec::new();
    let mut level: Vec<Hash> = tx_hashes.to_vec();
    let mut pos = index;
    while level.len() > 1 {
        let sibling = if pos % 2 == 0 {
            // right sibling, or ourselves when the level is odd
            *level.get(pos + 1).unwrap_or(&level[pos])
        } else {
            level[pos - 1]
        };
        proof.push(sibling);

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            let left = &level[i];
            let right = level.get(i + 1).unwrap_or(left);
            next.push(hash_merkle_branches(left, right));
            i += 2;
        }
        level = next;
        pos /= 2;
    }
    Ok(proof)
}

/// Verify a merkle branch against an expected root.
pub fn verify_merkle_proof(
    tx_hash: &TxHash,
    index: usize,
    proof: &[Hash],
    root: &MerkleRoot,
) -> bool {
    let mut node = *tx_hash;
    let mut pos = index;
    for sibling in proof {
        node = if pos % 2 == 0 {
            hash_merkle_branches(&node, sibling)
        } else {
            hash_merkle_branches(sibling, &node)
        };
        pos /= 2;
    }
    node == *root
}
