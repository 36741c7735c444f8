//! Block chain engine and script interpreter for Bitcoin SV.
//!
//! This library implements the consensus-critical core of a node-side stack: linking block
//! headers into a chain, detecting forks and performing reorganizations against a pluggable
//! block store, and evaluating the Bitcoin script language including P2SH and signature
//! checking. Networking, wallets, and persistent store implementations live elsewhere and
//! talk to this crate through the traits in [chain].

/// Bitcoin primitives: hashes, block headers, transactions, scripts, proof of work.
pub mod bitcoin;

/// The block chain engine: block store interface, orphan handling, reorganization.
pub mod chain;

mod result;
pub use result::{Error, Result};

// re-export the secp256k1 crate
pub extern crate secp256k1;
