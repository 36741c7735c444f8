use crate::bitcoin::hash::Hash;
use crate::bitcoin::Encodable;
use crate::Result;
use bytes::{Buf, BufMut};
use hex::{FromHex, ToHex};

/// The BlockHash is used to identify block headers and enforce proof of work.
pub type BlockHash = Hash;
/// The MerkleRoot is the root of the merkle tree of this block's transaction hashes.
pub type MerkleRoot = Hash;

/// BlockHeaders are linked together to form a blockchain.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct BlockHeader {
    /// Block version.
    pub version: u32,
    /// Hash of the previous block header.
    pub prev_hash: BlockHash,
    /// Root of the merkle tree of this block's transaction hashes.
    pub merkle_root: MerkleRoot,
    /// Timestamp when this block was created as recorded by the miner.
    pub timestamp: u32,
    /// Target difficulty in compact form.
    pub bits: u32,
    /// Nonce used to mine the block.
    pub nonce: u32,
}

impl BlockHeader {
    /// Size of the BlockHeader in bytes
    pub const SIZE: usize = 80;
    pub const HEX_SIZE: usize = BlockHeader::SIZE * 2;

    /// Calculates the hash for this block header.
    pub fn hash(&self) -> BlockHash {
        // the header always encodes into 80 bytes
        let v = self.to_binary_buf().expect("header encoding is infallible");
        Hash::sha256d(&v)
    }
}

impl Encodable for BlockHeader {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        Ok(BlockHeader {
            version: buffer.try_get_u32_le()?,
            prev_hash: Hash::from_binary(buffer)?,
            merkle_root: Hash::from_binary(buffer)?,
            timestamp: buffer.try_get_u32_le()?,
            bits: buffer.try_get_u32_le()?,
            nonce: buffer.try_get_u32_le()?,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        buffer.put_u32_le(self.version);
        self.prev_hash.to_binary(buffer)?;
        self.merkle_root.to_binary(buffer)?;
        buffer.put_u32_le(self.timestamp);
        buffer.put_u32_le(self.bits);
        buffer.put_u32_le(self.nonce);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        BlockHeader::SIZE as u64
    }
}

impl FromHex for BlockHeader {
    type Error = crate::Error;

    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self> {
        let bytes = Vec::<u8>::from_hex(hex)?;
        BlockHeader::from_binary_buf(bytes.as_slice())
    }
}

impl ToHex for BlockHeader {
    fn encode_hex<T: FromIterator<char>>(&self) -> T {
        let bytes = self.to_binary_buf().expect("header encoding is infallible");
        bytes.encode_hex()
    }

    fn encode_hex_upper<T: FromIterator<char>>(&self) -> T {
        let bytes = self.to_binary_buf().expect("header encoding is infallible");
        bytes.encode_hex_upper()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::FromHex;

    // BSV mainnet block 824962
    fn block_header_824962() -> (Vec<u8>, BlockHash) {
        (
            Vec::from_hex("00405324d8facaf19ce3efc5f6b3fbdc1cb1f5369a56c3de3e50280300000000000000002742bdb5930e5bf24be6e7521ceeecf6d3199871e2a6438f54cb5fd95d3f5139a38d90653c5808186eac9b4c").unwrap(),
            Hash::from_hex("000000000000000001749126813c455cabd41bb80fdfc1833ffe09deacb91967").unwrap()
        )
    }

    /// Read a block header from a byte array and check its fields.
    #[test]
    fn block_header_read() {
        let (bin, expected_hash) = block_header_824962();
        let header = BlockHeader::from_binary_buf(bin.as_slice()).unwrap();
        assert_eq!(header.version, 609435648);
        assert_eq!(header.hash(), expected_hash);
        assert_eq!(header.nonce, 1285270638);
        assert_eq!(header.bits, 0x1808583c);
        assert_eq!(
            header.merkle_root,
            Hash::from_hex("39513f5dd95fcb548f43a6e2719819d3f6ecee1c52e7e64bf25b0e93b5bd4227")
                .unwrap()
        );
        assert_eq!(header.timestamp, 1703972259);
        assert_eq!(
            header.prev_hash,
            Hash::from_hex("00000000000000000328503edec3569a36f5b11cdcfbb3f6c5efe39cf1cafad8")
                .unwrap()
        );
    }

    /// Round trip: parse(bytes) == header iff serialize(header) == bytes.
    #[test]
    fn block_header_round_trip() {
        let (bin, _) = block_header_824962();
        let header = BlockHeader::from_binary_buf(bin.as_slice()).unwrap();
        assert_eq!(header.to_binary_buf().unwrap(), bin);
        assert_eq!(header.encode_hex::<String>(), hex::encode(&bin));
    }

    #[test]
    fn block_header_truncated() {
        let (bin, _) = block_header_824962();
        assert!(BlockHeader::from_binary_buf(&bin[..79]).is_err());
    }
}
