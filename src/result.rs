use bytes::TryGetError;
use hex::FromHexError;
use std::io;

/// Standard Result used in the library
pub type Result<T> = std::result::Result<T, Error>;

/// Standard error type used in the library
#[derive(Debug)]
pub enum Error {
    /// An argument provided is invalid
    BadArgument(String),
    /// The data provided is invalid
    BadData(String),
    /// The data provided is too small to perform the operation.
    DataTooSmall,
    /// The data provided is too large to perform the operation.
    DataTooLarge,

    // Chain engine errors
    /// A candidate block header failed its self-check (malformed, bad proof of work).
    HeaderInvalid(String),
    /// A candidate block failed a context-dependent rule (checkpoints, timestamps, version tally).
    RulesViolated(String),
    /// Chain structure could not be verified (forked block without common ancestry, etc).
    Verification(String),
    /// The block store failed; fatal to the current operation.
    StoreError(String),
    /// State needed to connect the block has been pruned from the store.
    Pruned(String),
    /// The store does not support the requested operation.
    Unsupported(&'static str),

    // Script engine errors
    /// Script is too large
    ScriptTooLarge,
    /// Script has too many operations
    ScriptTooManyOps,
    /// Script pushed a data item larger than permitted
    ScriptPushTooLarge,
    /// Script stack overflow
    ScriptStackOverflow,
    /// Script unbalanced conditional
    ScriptUnbalancedConditional,
    /// Script verify failed
    ScriptVerifyFailed,
    /// Script OP_RETURN encountered
    ScriptOpReturn,
    /// Script invalid stack operation
    ScriptInvalidStackOperation,
    /// Script number too large
    ScriptNumberTooLarge,
    /// Script disabled opcode
    ScriptDisabledOpcode,
    /// Script reserved opcode
    ScriptReservedOpcode,
    /// Script locktime requirement not satisfied
    ScriptLockTimeUnsatisfied,
    /// Script requires transaction context
    ScriptRequiresContext,
    /// A P2SH scriptSig contained non-push operations
    ScriptSigNotPushOnly,

    /// Internal error
    Internal(String),
    /// Hex string could not be decoded
    FromHexError(FromHexError),
    /// secp256k1 library error
    Secp256k1Error(secp256k1::Error),
    /// Standard library IO error
    IOError(io::Error),
    /// Error from TryGet
    TryGet(TryGetError),
}

impl Error {
    /// True for failures that mean a candidate block did not verify, as opposed to
    /// infrastructure failures. The chain engine uses this to decide whether the
    /// store abort hook should run.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Error::HeaderInvalid(_) | Error::RulesViolated(_) | Error::Verification(_)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadArgument(s) => write!(f, "Bad argument: {}", s),
            Error::BadData(s) => write!(f, "Bad data: {}", s),
            Error::DataTooSmall => f.write_str("data too small"),
            Error::DataTooLarge => f.write_str("data too large"),
            Error::HeaderInvalid(s) => write!(f, "invalid block header: {}", s),
            Error::RulesViolated(s) => write!(f, "block violates chain rules: {}", s),
            Error::Verification(s) => write!(f, "chain verification failed: {}", s),
            Error::StoreError(s) => write!(f, "block store error: {}", s),
            Error::Pruned(s) => write!(f, "required state has been pruned: {}", s),
            Error::Unsupported(s) => write!(f, "unsupported operation: {}", s),
            Error::ScriptTooLarge => f.write_str("script too large"),
            Error::ScriptTooManyOps => f.write_str("script has too many operations"),
            Error::ScriptPushTooLarge => f.write_str("script push larger than 520 bytes"),
            Error::ScriptStackOverflow => f.write_str("script stack overflow"),
            Error::ScriptUnbalancedConditional => f.write_str("script unbalanced conditional"),
            Error::ScriptVerifyFailed => f.write_str("script verify failed"),
            Error::ScriptOpReturn => f.write_str("script OP_RETURN encountered"),
            Error::ScriptInvalidStackOperation => f.write_str("script invalid stack operation"),
            Error::ScriptNumberTooLarge => f.write_str("script number too large"),
            Error::ScriptDisabledOpcode => f.write_str("script disabled opcode"),
            Error::ScriptReservedOpcode => f.write_str("script reserved opcode"),
            Error::ScriptLockTimeUnsatisfied => f.write_str("script locktime not satisfied"),
            Error::ScriptRequiresContext => f.write_str("script requires transaction context"),
            Error::ScriptSigNotPushOnly => {
                f.write_str("scriptSig for P2SH output must only push data")
            }
            Error::Internal(s) => write!(f, "Internal error: {}", s),
            Error::FromHexError(e) => write!(f, "Hex decoding error: {}", e),
            Error::Secp256k1Error(e) => write!(f, "secp256k1 error: {:?}", e),
            Error::IOError(e) => write!(f, "IO error: {}", e),
            Error::TryGet(e) => write!(f, "TryGet error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<FromHexError> for Error {
    fn from(e: FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IOError(e)
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Error::Secp256k1Error(e)
    }
}

impl From<TryGetError> for Error {
    fn from(e: TryGetError) -> Self {
        Error::TryGet(e)
    }
}
