mod base;
mod builder;
mod interpreter;
mod num;
pub mod op;
mod signature;

pub use base::{encode_push_data, remove_all_instances_of, write_push_data, Script, ScriptChunk};
pub use builder::ScriptBuilder;
pub use interpreter::{
    correctly_spends, execute_script, Stack, TransactionContext, VerifyFlags, MAX_PUBKEYS_PER_MULTISIG,
    MAX_PUSH_SIZE, MAX_SCRIPT_OPS, MAX_SCRIPT_SIZE, MAX_STACK_SIZE,
};
pub use num::{cast_to_bool, decode_script_num, encode_script_num};
pub use signature::{
    sign_input, signature_hash, verify_signature, SigHashType, SIGHASH_ALL, SIGHASH_ANYONECANPAY,
    SIGHASH_NONE, SIGHASH_SINGLE,
};
