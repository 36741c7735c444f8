use crate::bitcoin::script::base::{encode_push_data, remove_all_instances_of, Script, ScriptChunk};
use crate::bitcoin::script::num::{cast_to_bool, decode_script_num, encode_script_num};
use crate::bitcoin::script::op::*;
use crate::bitcoin::script::signature::verify_signature;
use crate::bitcoin::{Hash, Hash160, Tx};
use crate::{Error, Result};
use bytes::Bytes;
use ring::digest::{digest, SHA256};
use ripemd::{Digest as RipemdDigest, Ripemd160};
use sha1::{Digest as Sha1Digest, Sha1};
use std::collections::VecDeque;

/// Maximum script size in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of counted operations in a script.
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum combined size of the main and alt stacks.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum size of a single pushed data item.
pub const MAX_PUSH_SIZE: usize = 520;

/// Maximum operand size for the arithmetic opcodes.
pub const MAX_NUM_SIZE: usize = 4;

/// Maximum pubkeys accepted by OP_CHECKMULTISIG.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

// locktime opcodes accept 5 byte numbers
const MAX_LOCKTIME_NUM_SIZE: usize = 5;
// below this value a locktime is a block height, at or above it a unix timestamp
const LOCKTIME_THRESHOLD: i64 = 500_000_000;
const SEQUENCE_FINAL: u32 = 0xffffffff;
const SEQUENCE_LOCKTIME_DISABLE_FLAG: i64 = 1 << 31;
const SEQUENCE_LOCKTIME_TYPE_FLAG: i64 = 1 << 22;
const SEQUENCE_LOCKTIME_MASK: i64 = 0x0000ffff;

/// The script stack: a sequence of byte strings, top at the back.
pub type Stack = VecDeque<Bytes>;

/// Which optional validation rules to apply during script verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifyFlags {
    /// Enforce pay-to-script-hash evaluation of outputs matching the P2SH template.
    pub p2sh: bool,
    /// Upgrade OP_NOP2 to OP_CHECKLOCKTIMEVERIFY (BIP65).
    pub cltv: bool,
    /// Upgrade OP_NOP3 to OP_CHECKSEQUENCEVERIFY (BIP112).
    pub csv: bool,
}

impl VerifyFlags {
    /// No optional rules; the original script semantics.
    pub const NONE: VerifyFlags = VerifyFlags {
        p2sh: false,
        cltv: false,
        csv: false,
    };

    /// P2SH only.
    pub const P2SH: VerifyFlags = VerifyFlags {
        p2sh: true,
        cltv: false,
        csv: false,
    };

    /// Everything this interpreter knows about.
    pub const STANDARD: VerifyFlags = VerifyFlags {
        p2sh: true,
        cltv: true,
        csv: true,
    };
}

/// The transaction whose input is being verified, needed by the signature and locktime
/// opcodes.
pub struct TransactionContext<'a> {
    pub tx: &'a Tx,
    pub input_index: usize,
}

/// Verifies that `script_sig` correctly spends the output locked by `script_pubkey`.
///
/// Both scripts execute on one stack: the scriptSig first, then the scriptPubKey. The
/// result must be a non-empty stack with a true top element. When P2SH enforcement is on
/// and the scriptPubKey matches the P2SH template, the scriptSig must be push-only and
/// its top push is executed as the redeem script against the remaining pushes.
///
/// Any violation returns an error; success returns `()`.
pub fn correctly_spends(
    tx: &Tx,
    input_index: usize,
    script_sig: &Script,
    script_pubkey: &Script,
    flags: VerifyFlags,
) -> Result<()> {
    if script_sig.len() > MAX_SCRIPT_SIZE || script_pubkey.len() > MAX_SCRIPT_SIZE {
        return Err(Error::ScriptTooLarge);
    }

    let ctx = TransactionContext { tx, input_index };
    let mut stack: Stack = VecDeque::new();

    execute_script(Some(&ctx), script_sig, &mut stack, flags)?;
    let mut p2sh_stack: Stack = if flags.p2sh {
        stack.clone()
    } else {
        VecDeque::new()
    };
    execute_script(Some(&ctx), script_pubkey, &mut stack, flags)?;

    let top = stack.pop_back().ok_or(Error::ScriptInvalidStackOperation)?;
    if !cast_to_bool(&top) {
        return Err(Error::ScriptVerifyFailed);
    }

    if flags.p2sh && script_pubkey.is_pay_to_script_hash() {
        if !script_sig.is_push_only() {
            return Err(Error::ScriptSigNotPushOnly);
        }
        let redeem_bytes = p2sh_stack
            .pop_back()
            .ok_or(Error::ScriptInvalidStackOperation)?;
        let redeem_script = Script::new(redeem_bytes)?;

        execute_script(Some(&ctx), &redeem_script, &mut p2sh_stack, flags)?;

        let top = p2sh_stack
            .pop_back()
            .ok_or(Error::ScriptInvalidStackOperation)?;
        if !cast_to_bool(&top) {
            return Err(Error::ScriptVerifyFailed);
        }
    }

    Ok(())
}

/// Execute a script against a stack.
///
/// The stack is left as the program produced it; callers judge success from its
/// contents. `ctx` may be `None` for scripts that use no signature or locktime opcodes.
pub fn execute_script(
    ctx: Option<&TransactionContext>,
    script: &Script,
    stack: &mut Stack,
    flags: VerifyFlags,
) -> Result<()> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(Error::ScriptTooLarge);
    }

    let mut alt_stack: Stack = VecDeque::new();
    let mut if_stack: Vec<bool> = Vec::new();
    let mut op_count = 0usize;
    let mut last_code_sep = 0usize;

    for chunk in script.chunks() {
        let should_execute = !if_stack.contains(&false);

        match chunk {
            ScriptChunk::Push { data, .. } => {
                if data.len() > MAX_PUSH_SIZE {
                    return Err(Error::ScriptPushTooLarge);
                }
                if should_execute {
                    stack.push_back(data.clone());
                }
            }
            ScriptChunk::Op { opcode, start } => {
                let opcode = *opcode;
                if opcode > OP_16 {
                    op_count += 1;
                    if op_count > MAX_SCRIPT_OPS {
                        return Err(Error::ScriptTooManyOps);
                    }
                }

                // these fail the script wherever they appear, executed or not
                if opcode == OP_VERIF || opcode == OP_VERNOTIF {
                    return Err(Error::ScriptReservedOpcode);
                }
                if is_disabled(opcode) {
                    return Err(Error::ScriptDisabledOpcode);
                }

                match opcode {
                    OP_IF | OP_NOTIF => {
                        let condition = if should_execute {
                            let top = stack
                                .pop_back()
                                .ok_or(Error::ScriptInvalidStackOperation)?;
                            let value = cast_to_bool(&top);
                            if opcode == OP_IF {
                                value
                            } else {
                                !value
                            }
                        } else {
                            // keep the nesting depth correct inside dead branches
                            false
                        };
                        if_stack.push(condition);
                        continue;
                    }
                    OP_ELSE => {
                        let last = if_stack
                            .last_mut()
                            .ok_or(Error::ScriptUnbalancedConditional)?;
                        *last = !*last;
                        continue;
                    }
                    OP_ENDIF => {
                        if_stack
                            .pop()
                            .ok_or(Error::ScriptUnbalancedConditional)?;
                        continue;
                    }
                    _ => {}
                }

                if !should_execute {
                    continue;
                }

                execute_op(
                    ctx,
                    script,
                    opcode,
                    *start,
                    stack,
                    &mut alt_stack,
                    &mut op_count,
                    &mut last_code_sep,
                    flags,
                )?;
            }
        }

        if stack.len() + alt_stack.len() > MAX_STACK_SIZE {
            return Err(Error::ScriptStackOverflow);
        }
    }

    if !if_stack.is_empty() {
        return Err(Error::ScriptUnbalancedConditional);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn execute_op(
    ctx: Option<&TransactionContext>,
    script: &Script,
    opcode: u8,
    chunk_start: usize,
    stack: &mut Stack,
    alt_stack: &mut Stack,
    op_count: &mut usize,
    last_code_sep: &mut usize,
    flags: VerifyFlags,
) -> Result<()> {
    match opcode {
        // constants
        OP_1NEGATE => stack.push_back(encode_script_num(-1)),
        OP_1..=OP_16 => stack.push_back(encode_script_num(decode_op_n(opcode)?)),

        // flow control
        OP_NOP => {}
        OP_VERIFY => {
            let top = pop(stack)?;
            if !cast_to_bool(&top) {
                return Err(Error::ScriptVerifyFailed);
            }
        }
        OP_RETURN => return Err(Error::ScriptOpReturn),

        // stack
        OP_TOALTSTACK => {
            let item = pop(stack)?;
            alt_stack.push_back(item);
        }
        OP_FROMALTSTACK => {
            let item = alt_stack
                .pop_back()
                .ok_or(Error::ScriptInvalidStackOperation)?;
            stack.push_back(item);
        }
        OP_2DROP => {
            require_depth(stack, 2)?;
            stack.pop_back();
            stack.pop_back();
        }
        OP_2DUP => {
            require_depth(stack, 2)?;
            let a = stack[stack.len() - 2].clone();
            let b = stack[stack.len() - 1].clone();
            stack.push_back(a);
            stack.push_back(b);
        }
        OP_3DUP => {
            require_depth(stack, 3)?;
            let a = stack[stack.len() - 3].clone();
            let b = stack[stack.len() - 2].clone();
            let c = stack[stack.len() - 1].clone();
            stack.push_back(a);
            stack.push_back(b);
            stack.push_back(c);
        }
        OP_2OVER => {
            require_depth(stack, 4)?;
            let a = stack[stack.len() - 4].clone();
            let b = stack[stack.len() - 3].clone();
            stack.push_back(a);
            stack.push_back(b);
        }
        OP_2ROT => {
            require_depth(stack, 6)?;
            let idx = stack.len() - 6;
            let a = stack.remove(idx).expect("depth checked");
            let b = stack.remove(idx).expect("depth checked");
            stack.push_back(a);
            stack.push_back(b);
        }
        OP_2SWAP => {
            require_depth(stack, 4)?;
            let len = stack.len();
            stack.swap(len - 4, len - 2);
            stack.swap(len - 3, len - 1);
        }
        OP_IFDUP => {
            require_depth(stack, 1)?;
            let top = stack[stack.len() - 1].clone();
            if cast_to_bool(&top) {
                stack.push_back(top);
            }
        }
        OP_DEPTH => {
            let depth = stack.len() as i64;
            stack.push_back(encode_script_num(depth));
        }
        OP_DROP => {
            pop(stack)?;
        }
        OP_DUP => {
            require_depth(stack, 1)?;
            let top = stack[stack.len() - 1].clone();
            stack.push_back(top);
        }
        OP_NIP => {
            require_depth(stack, 2)?;
            let idx = stack.len() - 2;
            stack.remove(idx);
        }
        OP_OVER => {
            require_depth(stack, 2)?;
            let item = stack[stack.len() - 2].clone();
            stack.push_back(item);
        }
        OP_PICK | OP_ROLL => {
            let n = pop_num(stack, MAX_NUM_SIZE)?;
            if n < 0 || n as usize >= stack.len() {
                return Err(Error::ScriptInvalidStackOperation);
            }
            let idx = stack.len() - 1 - n as usize;
            let item = if opcode == OP_ROLL {
                stack.remove(idx).expect("index checked")
            } else {
                stack[idx].clone()
            };
            stack.push_back(item);
        }
        OP_ROT => {
            require_depth(stack, 3)?;
            let c = pop(stack)?;
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push_back(b);
            stack.push_back(c);
            stack.push_back(a);
        }
        OP_SWAP => {
            require_depth(stack, 2)?;
            let len = stack.len();
            stack.swap(len - 2, len - 1);
        }
        OP_TUCK => {
            require_depth(stack, 2)?;
            let top = stack[stack.len() - 1].clone();
            let idx = stack.len() - 2;
            stack.insert(idx, top);
        }

        // splice
        OP_SIZE => {
            require_depth(stack, 1)?;
            let size = stack[stack.len() - 1].len() as i64;
            stack.push_back(encode_script_num(size));
        }

        // bitwise logic
        OP_EQUAL => {
            require_depth(stack, 2)?;
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push_back(bool_bytes(a == b));
        }
        OP_EQUALVERIFY => {
            require_depth(stack, 2)?;
            let b = pop(stack)?;
            let a = pop(stack)?;
            if a != b {
                return Err(Error::ScriptVerifyFailed);
            }
        }

        // numeric, one operand
        OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
            let n = pop_num(stack, MAX_NUM_SIZE)?;
            let result = match opcode {
                OP_1ADD => n + 1,
                OP_1SUB => n - 1,
                OP_NEGATE => -n,
                OP_ABS => n.abs(),
                OP_NOT => (n == 0) as i64,
                OP_0NOTEQUAL => (n != 0) as i64,
                _ => unreachable!(),
            };
            stack.push_back(encode_script_num(result));
        }

        // numeric, two operands
        OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMNOTEQUAL
        | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL
        | OP_MIN | OP_MAX => {
            let b = pop_num(stack, MAX_NUM_SIZE)?;
            let a = pop_num(stack, MAX_NUM_SIZE)?;
            let result = match opcode {
                OP_ADD => a + b,
                OP_SUB => a - b,
                OP_BOOLAND => (a != 0 && b != 0) as i64,
                OP_BOOLOR => (a != 0 || b != 0) as i64,
                OP_NUMEQUAL => (a == b) as i64,
                OP_NUMNOTEQUAL => (a != b) as i64,
                OP_LESSTHAN => (a < b) as i64,
                OP_GREATERTHAN => (a > b) as i64,
                OP_LESSTHANOREQUAL => (a <= b) as i64,
                OP_GREATERTHANOREQUAL => (a >= b) as i64,
                OP_MIN => a.min(b),
                OP_MAX => a.max(b),
                _ => unreachable!(),
            };
            stack.push_back(encode_script_num(result));
        }
        OP_NUMEQUALVERIFY => {
            let b = pop_num(stack, MAX_NUM_SIZE)?;
            let a = pop_num(stack, MAX_NUM_SIZE)?;
            if a != b {
                return Err(Error::ScriptVerifyFailed);
            }
        }
        OP_WITHIN => {
            let max = pop_num(stack, MAX_NUM_SIZE)?;
            let min = pop_num(stack, MAX_NUM_SIZE)?;
            let x = pop_num(stack, MAX_NUM_SIZE)?;
            stack.push_back(encode_script_num((min <= x && x < max) as i64));
        }

        // crypto
        OP_RIPEMD160 => {
            let data = pop(stack)?;
            let mut hasher = Ripemd160::new();
            RipemdDigest::update(&mut hasher, &data);
            stack.push_back(Bytes::copy_from_slice(&hasher.finalize()));
        }
        OP_SHA1 => {
            let data = pop(stack)?;
            let mut hasher = Sha1::new();
            Sha1Digest::update(&mut hasher, &data);
            stack.push_back(Bytes::copy_from_slice(&hasher.finalize()));
        }
        OP_SHA256 => {
            let data = pop(stack)?;
            stack.push_back(Bytes::copy_from_slice(digest(&SHA256, &data).as_ref()));
        }
        OP_HASH160 => {
            let data = pop(stack)?;
            stack.push_back(Bytes::copy_from_slice(&Hash160::generate(&data).hash));
        }
        OP_HASH256 => {
            let data = pop(stack)?;
            stack.push_back(Bytes::copy_from_slice(&Hash::sha256d(&data).raw));
        }

        OP_CODESEPARATOR => {
            *last_code_sep = chunk_start + 1;
        }

        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            execute_checksig(ctx, script, opcode, stack, *last_code_sep)?;
        }
        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            execute_multisig(ctx, script, opcode, stack, op_count, *last_code_sep)?;
        }

        // upgradable no-ops
        OP_CHECKLOCKTIMEVERIFY if flags.cltv => execute_check_lock_time(ctx, stack)?,
        OP_CHECKSEQUENCEVERIFY if flags.csv => execute_check_sequence(ctx, stack)?,
        OP_NOP1..=OP_NOP10 => {}

        // everything else is reserved
        _ => return Err(Error::ScriptReservedOpcode),
    }
    Ok(())
}

fn execute_checksig(
    ctx: Option<&TransactionContext>,
    script: &Script,
    opcode: u8,
    stack: &mut Stack,
    last_code_sep: usize,
) -> Result<()> {
    let ctx = ctx.ok_or(Error::ScriptRequiresContext)?;
    require_depth(stack, 2)?;
    let pubkey = pop(stack)?;
    let sig = pop(stack)?;

    // the signed subscript starts at the last code separator and never contains the
    // signature push itself
    let subscript = &script.raw()[last_code_sep..];
    let subscript = remove_all_instances_of(subscript, &encode_push_data(&sig));

    // any failure to parse or verify just means the signature is not valid
    let valid = verify_signature(&sig, &pubkey, ctx.tx, ctx.input_index, &subscript)
        .unwrap_or(false);

    if opcode == OP_CHECKSIG {
        stack.push_back(bool_bytes(valid));
    } else if !valid {
        return Err(Error::ScriptVerifyFailed);
    }
    Ok(())
}

fn execute_multisig(
    ctx: Option<&TransactionContext>,
    script: &Script,
    opcode: u8,
    stack: &mut Stack,
    op_count: &mut usize,
    last_code_sep: usize,
) -> Result<()> {
    let ctx = ctx.ok_or(Error::ScriptRequiresContext)?;
    require_depth(stack, 2)?;

    let pubkey_count = pop_num(stack, MAX_NUM_SIZE)?;
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&pubkey_count) {
        return Err(Error::ScriptInvalidStackOperation);
    }
    *op_count += pubkey_count as usize;
    if *op_count > MAX_SCRIPT_OPS {
        return Err(Error::ScriptTooManyOps);
    }
    require_depth(stack, pubkey_count as usize + 1)?;

    let mut pubkeys: VecDeque<Bytes> = VecDeque::with_capacity(pubkey_count as usize);
    for _ in 0..pubkey_count {
        pubkeys.push_back(pop(stack)?);
    }

    let sig_count = pop_num(stack, MAX_NUM_SIZE)?;
    if !(0..=pubkey_count).contains(&sig_count) {
        return Err(Error::ScriptInvalidStackOperation);
    }
    require_depth(stack, sig_count as usize + 1)?;

    let mut sigs: VecDeque<Bytes> = VecDeque::with_capacity(sig_count as usize);
    for _ in 0..sig_count {
        sigs.push_back(pop(stack)?);
    }

    let mut subscript = script.raw()[last_code_sep..].to_vec();
    for sig in &sigs {
        subscript = remove_all_instances_of(&subscript, &encode_push_data(sig));
    }

    // Signatures must appear in the same order as their keys: each key is tried against
    // the current signature and discarded either way, so the match fails once fewer keys
    // remain than signatures.
    let mut valid = true;
    while let Some(sig) = sigs.front().cloned() {
        let matched = match pubkeys.pop_front() {
            Some(pubkey) => {
                verify_signature(&sig, &pubkey, ctx.tx, ctx.input_index, &subscript)
                    .unwrap_or(false)
            }
            None => false,
        };
        if matched {
            sigs.pop_front();
        }
        if sigs.len() > pubkeys.len() {
            valid = false;
            break;
        }
    }

    // the reference client pops one item more than it uses; consensus now requires the
    // same off-by-one
    stack.pop_back();

    if opcode == OP_CHECKMULTISIG {
        stack.push_back(bool_bytes(valid));
    } else if !valid {
        return Err(Error::ScriptVerifyFailed);
    }
    Ok(())
}

/// OP_CHECKLOCKTIMEVERIFY (BIP65). Inspects the top of the stack without popping it.
fn execute_check_lock_time(ctx: Option<&TransactionContext>, stack: &mut Stack) -> Result<()> {
    let ctx = ctx.ok_or(Error::ScriptRequiresContext)?;
    require_depth(stack, 1)?;
    let lock_time = decode_script_num(&stack[stack.len() - 1], MAX_LOCKTIME_NUM_SIZE)?;
    if lock_time < 0 {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }

    let tx_lock_time = ctx.tx.lock_time as i64;
    // both must be block heights or both timestamps
    if (lock_time < LOCKTIME_THRESHOLD) != (tx_lock_time < LOCKTIME_THRESHOLD) {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    if lock_time > tx_lock_time {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }

    // a final input would make the transaction's lock time inoperative
    let input = ctx
        .tx
        .inputs
        .get(ctx.input_index)
        .ok_or_else(|| Error::BadArgument("input index out of range".to_string()))?;
    if input.sequence == SEQUENCE_FINAL {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    Ok(())
}

/// OP_CHECKSEQUENCEVERIFY (BIP112). Inspects the top of the stack without popping it.
fn execute_check_sequence(ctx: Option<&TransactionContext>, stack: &mut Stack) -> Result<()> {
    let ctx = ctx.ok_or(Error::ScriptRequiresContext)?;
    require_depth(stack, 1)?;
    let sequence = decode_script_num(&stack[stack.len() - 1], MAX_LOCKTIME_NUM_SIZE)?;
    if sequence < 0 {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    // with the disable flag set the operand makes no demands
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Ok(());
    }

    if ctx.tx.version < 2 {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    let input = ctx
        .tx
        .inputs
        .get(ctx.input_index)
        .ok_or_else(|| Error::BadArgument("input index out of range".to_string()))?;
    let tx_sequence = input.sequence as i64;
    if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }

    let mask = SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK;
    let masked_operand = sequence & mask;
    let masked_sequence = tx_sequence & mask;
    // both must measure in blocks or both in time units
    if (masked_operand & SEQUENCE_LOCKTIME_TYPE_FLAG) != (masked_sequence & SEQUENCE_LOCKTIME_TYPE_FLAG)
    {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    if masked_operand > masked_sequence {
        return Err(Error::ScriptLockTimeUnsatisfied);
    }
    Ok(())
}

fn pop(stack: &mut Stack) -> Result<Bytes> {
    stack.pop_back().ok_or(Error::ScriptInvalidStackOperation)
}

fn pop_num(stack: &mut Stack, max_size: usize) -> Result<i64> {
    let bytes = pop(stack)?;
    decode_script_num(&bytes, max_size)
}

fn require_depth(stack: &Stack, depth: usize) -> Result<()> {
    if stack.len() < depth {
        Err(Error::ScriptInvalidStackOperation)
    } else {
        Ok(())
    }
}

// comparison and signature opcodes push literal one/zero bytes, unlike the numeric
// opcodes which push minimally encoded numbers
fn bool_bytes(value: bool) -> Bytes {
    if value {
        Bytes::from_static(&[1])
    } else {
        Bytes::from_static(&[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::script::builder::ScriptBuilder;
    use crate::bitcoin::{Outpoint, TxHash, TxInput, TxOutput};

    fn run(script: &Script) -> Result<Stack> {
        let mut stack = VecDeque::new();
        execute_script(None, script, &mut stack, VerifyFlags::NONE)?;
        Ok(stack)
    }

    fn run_top_num(script: &Script) -> i64 {
        let mut stack = run(script).unwrap();
        decode_script_num(&stack.pop_back().unwrap(), 4).unwrap()
    }

    fn context_tx() -> Tx {
        Tx {
            version: 1,
            inputs: vec![TxInput {
                outpoint: Outpoint {
                    tx_hash: TxHash::ZERO,
                    index: 0,
                },
                script: Bytes::new(),
                sequence: 0xffffffff,
            }],
            outputs: vec![TxOutput {
                value: 1,
                script: Bytes::new(),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn constants_push_expected_values() {
        let script = ScriptBuilder::new().op(OP_1NEGATE).build().unwrap();
        assert_eq!(run_top_num(&script), -1);
        for n in 1..=16i64 {
            let script = ScriptBuilder::new().op(encode_op_n(n).unwrap()).build().unwrap();
            assert_eq!(run_top_num(&script), n);
        }
    }

    #[test]
    fn arithmetic() {
        let script = ScriptBuilder::new()
            .op(OP_2)
            .op(OP_3)
            .op(OP_ADD)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 5);

        let script = ScriptBuilder::new()
            .int(10)
            .int(3)
            .op(OP_SUB)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 7);

        let script = ScriptBuilder::new().int(-5).op(OP_ABS).build().unwrap();
        assert_eq!(run_top_num(&script), 5);

        let script = ScriptBuilder::new()
            .int(2)
            .int(1)
            .int(3)
            .op(OP_WITHIN)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 1);
    }

    #[test]
    fn flow_control() {
        let script = ScriptBuilder::new()
            .op(OP_1)
            .op(OP_IF)
            .op(OP_10)
            .op(OP_ELSE)
            .op(OP_15)
            .op(OP_ENDIF)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 10);

        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .op(OP_10)
            .op(OP_ELSE)
            .op(OP_15)
            .op(OP_ENDIF)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 15);

        // nested suppression: the inner IF in a dead branch must not consume the stack
        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .op(OP_1)
            .op(OP_IF)
            .op(OP_10)
            .op(OP_ENDIF)
            .op(OP_ELSE)
            .op(OP_7)
            .op(OP_ENDIF)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 7);
    }

    #[test]
    fn unbalanced_conditionals() {
        let script = ScriptBuilder::new().op(OP_1).op(OP_IF).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptUnbalancedConditional)));

        let script = ScriptBuilder::new().op(OP_ENDIF).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptUnbalancedConditional)));

        let script = ScriptBuilder::new().op(OP_ELSE).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptUnbalancedConditional)));
    }

    #[test]
    fn disabled_opcode_fails_even_in_dead_branch() {
        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .op(OP_CAT)
            .op(OP_ENDIF)
            .op(OP_1)
            .build()
            .unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptDisabledOpcode)));
    }

    #[test]
    fn verif_fails_even_in_dead_branch() {
        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .op(OP_VERIF)
            .op(OP_ENDIF)
            .op(OP_1)
            .build()
            .unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptReservedOpcode)));
    }

    #[test]
    fn reserved_opcode_ok_when_skipped() {
        // OP_RESERVED only fails when executed
        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .op(OP_RESERVED)
            .op(OP_ENDIF)
            .op(OP_1)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 1);

        let script = ScriptBuilder::new().op(OP_RESERVED).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptReservedOpcode)));
    }

    #[test]
    fn verify_and_return() {
        let script = ScriptBuilder::new().op(OP_1).op(OP_VERIFY).build().unwrap();
        assert!(run(&script).unwrap().is_empty());

        let script = ScriptBuilder::new().op(OP_0).op(OP_VERIFY).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptVerifyFailed)));

        let script = ScriptBuilder::new().op(OP_RETURN).build().unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptOpReturn)));
    }

    #[test]
    fn stack_manipulation() {
        let script = ScriptBuilder::new()
            .int(1)
            .int(2)
            .int(3)
            .op(OP_ROT)
            .build()
            .unwrap();
        let stack = run(&script).unwrap();
        let nums: Vec<i64> = stack
            .iter()
            .map(|b| decode_script_num(b, 4).unwrap())
            .collect();
        assert_eq!(nums, vec![2, 3, 1]);

        let script = ScriptBuilder::new()
            .int(1)
            .int(2)
            .op(OP_TUCK)
            .build()
            .unwrap();
        let stack = run(&script).unwrap();
        let nums: Vec<i64> = stack
            .iter()
            .map(|b| decode_script_num(b, 4).unwrap())
            .collect();
        assert_eq!(nums, vec![2, 1, 2]);

        let script = ScriptBuilder::new()
            .int(10)
            .int(20)
            .int(30)
            .int(2)
            .op(OP_PICK)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 10);

        let script = ScriptBuilder::new()
            .int(10)
            .int(20)
            .int(30)
            .int(2)
            .op(OP_ROLL)
            .build()
            .unwrap();
        let stack = run(&script).unwrap();
        let nums: Vec<i64> = stack
            .iter()
            .map(|b| decode_script_num(b, 4).unwrap())
            .collect();
        assert_eq!(nums, vec![20, 30, 10]);
    }

    #[test]
    fn alt_stack() {
        let script = ScriptBuilder::new()
            .int(42)
            .op(OP_TOALTSTACK)
            .op(OP_1)
            .op(OP_DROP)
            .op(OP_FROMALTSTACK)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 42);
    }

    #[test]
    fn equal_pushes_literal_bytes() {
        let script = ScriptBuilder::new()
            .op(OP_1)
            .op(OP_1)
            .op(OP_EQUAL)
            .build()
            .unwrap();
        let mut stack = run(&script).unwrap();
        assert_eq!(stack.pop_back().unwrap(), Bytes::from_static(&[1]));

        let script = ScriptBuilder::new()
            .op(OP_1)
            .op(OP_2)
            .op(OP_EQUAL)
            .build()
            .unwrap();
        let mut stack = run(&script).unwrap();
        // false from EQUAL is a literal zero byte, not the empty string
        assert_eq!(stack.pop_back().unwrap(), Bytes::from_static(&[0]));
    }

    #[test]
    fn op_count_limit() {
        // OP_N pushes are not counted; counted ops above 201 fail
        let mut builder = ScriptBuilder::new().op(OP_1);
        for _ in 0..MAX_SCRIPT_OPS {
            builder = builder.op(OP_DUP);
        }
        assert!(run(&builder.build().unwrap()).is_ok());

        let mut builder = ScriptBuilder::new().op(OP_1);
        for _ in 0..=MAX_SCRIPT_OPS {
            builder = builder.op(OP_DUP);
        }
        assert!(matches!(
            run(&builder.build().unwrap()),
            Err(Error::ScriptTooManyOps)
        ));
    }

    #[test]
    fn stack_size_limit() {
        let mut builder = ScriptBuilder::new();
        for _ in 0..=MAX_STACK_SIZE {
            builder = builder.op(OP_1);
        }
        assert!(matches!(
            run(&builder.build().unwrap()),
            Err(Error::ScriptStackOverflow)
        ));
    }

    #[test]
    fn oversize_push_fails_even_in_dead_branch() {
        let big = vec![0u8; MAX_PUSH_SIZE + 1];
        let script = ScriptBuilder::new()
            .op(OP_0)
            .op(OP_IF)
            .data(&big)
            .op(OP_ENDIF)
            .op(OP_1)
            .build()
            .unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptPushTooLarge)));

        let ok = vec![0u8; MAX_PUSH_SIZE];
        let script = ScriptBuilder::new().data(&ok).build().unwrap();
        assert!(run(&script).is_ok());
    }

    #[test]
    fn oversize_script_rejected() {
        let raw = vec![OP_NOP; MAX_SCRIPT_SIZE + 1];
        let script = Script::new(Bytes::from(raw)).unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(None, &script, &mut stack, VerifyFlags::NONE),
            Err(Error::ScriptTooLarge)
        ));
    }

    #[test]
    fn checksig_without_context_fails() {
        let script = ScriptBuilder::new()
            .op(OP_1)
            .op(OP_1)
            .op(OP_CHECKSIG)
            .build()
            .unwrap();
        assert!(matches!(run(&script), Err(Error::ScriptRequiresContext)));
    }

    #[test]
    fn nops_do_nothing_without_flags() {
        let script = ScriptBuilder::new()
            .op(OP_NOP1)
            .op(OP_NOP2)
            .op(OP_NOP3)
            .op(OP_NOP10)
            .op(OP_1)
            .build()
            .unwrap();
        assert_eq!(run_top_num(&script), 1);
    }

    #[test]
    fn cltv_basics() {
        let mut tx = context_tx();
        tx.lock_time = 100;
        tx.inputs[0].sequence = 0xfffffffe;
        let ctx = TransactionContext {
            tx: &tx,
            input_index: 0,
        };
        let flags = VerifyFlags {
            cltv: true,
            ..VerifyFlags::NONE
        };

        // operand 50 <= lock_time 100: passes and leaves the operand on the stack
        let script = ScriptBuilder::new()
            .int(50)
            .op(OP_CHECKLOCKTIMEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        execute_script(Some(&ctx), &script, &mut stack, flags).unwrap();
        assert_eq!(stack.len(), 1);

        // operand above the tx lock time fails
        let script = ScriptBuilder::new()
            .int(150)
            .op(OP_CHECKLOCKTIMEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(Some(&ctx), &script, &mut stack, flags),
            Err(Error::ScriptLockTimeUnsatisfied)
        ));

        // mismatched locktime kinds fail: operand is a timestamp, tx uses a height
        let script = ScriptBuilder::new()
            .int(LOCKTIME_THRESHOLD)
            .op(OP_CHECKLOCKTIMEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(Some(&ctx), &script, &mut stack, flags),
            Err(Error::ScriptLockTimeUnsatisfied)
        ));

        // a final sequence disables the lock time entirely
        let mut final_tx = tx.clone();
        final_tx.inputs[0].sequence = SEQUENCE_FINAL;
        let ctx = TransactionContext {
            tx: &final_tx,
            input_index: 0,
        };
        let script = ScriptBuilder::new()
            .int(50)
            .op(OP_CHECKLOCKTIMEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(Some(&ctx), &script, &mut stack, flags),
            Err(Error::ScriptLockTimeUnsatisfied)
        ));
    }

    #[test]
    fn csv_basics() {
        let mut tx = context_tx();
        tx.version = 2;
        tx.inputs[0].sequence = 10;
        let ctx = TransactionContext {
            tx: &tx,
            input_index: 0,
        };
        let flags = VerifyFlags {
            csv: true,
            ..VerifyFlags::NONE
        };

        let script = ScriptBuilder::new()
            .int(5)
            .op(OP_CHECKSEQUENCEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        execute_script(Some(&ctx), &script, &mut stack, flags).unwrap();
        assert_eq!(stack.len(), 1);

        let script = ScriptBuilder::new()
            .int(20)
            .op(OP_CHECKSEQUENCEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(Some(&ctx), &script, &mut stack, flags),
            Err(Error::ScriptLockTimeUnsatisfied)
        ));

        // disable flag on the operand turns the check off
        let script = ScriptBuilder::new()
            .int(SEQUENCE_LOCKTIME_DISABLE_FLAG | 20)
            .op(OP_CHECKSEQUENCEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        execute_script(Some(&ctx), &script, &mut stack, flags).unwrap();

        // version 1 transactions cannot use CSV
        let mut v1 = tx.clone();
        v1.version = 1;
        let ctx = TransactionContext {
            tx: &v1,
            input_index: 0,
        };
        let script = ScriptBuilder::new()
            .int(5)
            .op(OP_CHECKSEQUENCEVERIFY)
            .build()
            .unwrap();
        let mut stack = VecDeque::new();
        assert!(matches!(
            execute_script(Some(&ctx), &script, &mut stack, flags),
            Err(Error::ScriptLockTimeUnsatisfied)
        ));
    }
}
