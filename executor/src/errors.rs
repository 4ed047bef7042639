//! Wire-level error taxonomies.
//!
//! Two closed enumerations are exposed to provers and sequencers:
//! - [`ExecutorError`], one per batch, derived from the executor's
//!   [`ZkResult`];
//! - [`RomError`], one per transaction and per trace step, derived from the
//!   short string tags the executor's tracer emits.
//!
//! Numeric codes follow the `executor.v1` protobuf numbering and must never
//! be reassigned.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Result code of one execution, as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum ZkResult {
    Success,
    OutOfCountersArith,
    OutOfCountersBinary,
    OutOfCountersKeccakF,
    OutOfCountersMemAlign,
    OutOfCountersPaddingPg,
    OutOfCountersPoseidonG,
    OutOfCountersSteps,
    InvalidForkId,
    BalanceMismatch,
    Fea2Scalar,
    Tos32,
    InvalidBatchL2Data,
    DbKeyNotFound,
    DbError,
    Internal,
}

impl ZkResult {
    pub fn is_success(self) -> bool {
        self == ZkResult::Success
    }
}

/// Batch-level error reported in a response.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ExecutorError {
    #[default]
    #[strum(serialize = "EXECUTOR_ERROR_UNSPECIFIED")]
    Unspecified = 0,
    #[strum(serialize = "EXECUTOR_ERROR_NO_ERROR")]
    NoError = 1,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_KECCAK")]
    CountersOverflowKeccak = 2,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_BINARY")]
    CountersOverflowBinary = 3,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_MEM")]
    CountersOverflowMem = 4,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_ARITH")]
    CountersOverflowArith = 5,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_PADDING")]
    CountersOverflowPadding = 6,
    #[strum(serialize = "EXECUTOR_ERROR_COUNTERS_OVERFLOW_POSEIDON")]
    CountersOverflowPoseidon = 7,
    #[strum(serialize = "EXECUTOR_ERROR_UNSUPPORTED_FORK_ID")]
    UnsupportedForkId = 8,
    #[strum(serialize = "EXECUTOR_ERROR_BALANCE_MISMATCH")]
    BalanceMismatch = 9,
    #[strum(serialize = "EXECUTOR_ERROR_FEA2SCALAR")]
    Fea2Scalar = 10,
    #[strum(serialize = "EXECUTOR_ERROR_TOS32")]
    Tos32 = 11,
}

impl TryFrom<String> for ExecutorError {
    type Error = strum::ParseError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl ExecutorError {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl From<ZkResult> for ExecutorError {
    fn from(result: ZkResult) -> Self {
        match result {
            ZkResult::Success => ExecutorError::NoError,
            ZkResult::OutOfCountersArith => ExecutorError::CountersOverflowArith,
            ZkResult::OutOfCountersBinary => ExecutorError::CountersOverflowBinary,
            ZkResult::OutOfCountersKeccakF => ExecutorError::CountersOverflowKeccak,
            ZkResult::OutOfCountersMemAlign => ExecutorError::CountersOverflowMem,
            ZkResult::OutOfCountersPaddingPg => ExecutorError::CountersOverflowPadding,
            ZkResult::OutOfCountersPoseidonG => ExecutorError::CountersOverflowPoseidon,
            ZkResult::InvalidForkId => ExecutorError::UnsupportedForkId,
            ZkResult::BalanceMismatch => ExecutorError::BalanceMismatch,
            ZkResult::Fea2Scalar => ExecutorError::Fea2Scalar,
            ZkResult::Tos32 => ExecutorError::Tos32,
            // No dedicated wire code exists for these.
            ZkResult::OutOfCountersSteps
            | ZkResult::InvalidBatchL2Data
            | ZkResult::DbKeyNotFound
            | ZkResult::DbError
            | ZkResult::Internal => ExecutorError::Unspecified,
        }
    }
}

/// An instruction-level error tag the taxonomy does not know about.
///
/// Seeing one means the executor and this gateway disagree on the
/// vocabulary; it must never be reported to a caller as a valid error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instruction-level error tag {0:?}")]
pub struct UnknownRomErrorTag(pub String);

/// Instruction-level error reported per transaction and per trace step.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum RomError {
    #[default]
    #[strum(serialize = "ROM_ERROR_UNSPECIFIED")]
    Unspecified = 0,
    #[strum(serialize = "ROM_ERROR_NO_ERROR")]
    NoError = 1,
    #[strum(serialize = "ROM_ERROR_OUT_OF_GAS")]
    OutOfGas = 2,
    #[strum(serialize = "ROM_ERROR_STACK_OVERFLOW")]
    StackOverflow = 3,
    #[strum(serialize = "ROM_ERROR_STACK_UNDERFLOW")]
    StackUnderflow = 4,
    #[strum(serialize = "ROM_ERROR_MAX_CODE_SIZE_EXCEEDED")]
    MaxCodeSizeExceeded = 5,
    #[strum(serialize = "ROM_ERROR_CONTRACT_ADDRESS_COLLISION")]
    ContractAddressCollision = 6,
    #[strum(serialize = "ROM_ERROR_EXECUTION_REVERTED")]
    ExecutionReverted = 7,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_STEP")]
    OutOfCountersStep = 8,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_KECCAK")]
    OutOfCountersKeccak = 9,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_BINARY")]
    OutOfCountersBinary = 10,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_MEM")]
    OutOfCountersMem = 11,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_ARITH")]
    OutOfCountersArith = 12,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_PADDING")]
    OutOfCountersPadding = 13,
    #[strum(serialize = "ROM_ERROR_OUT_OF_COUNTERS_POSEIDON")]
    OutOfCountersPoseidon = 14,
    #[strum(serialize = "ROM_ERROR_INVALID_JUMP")]
    InvalidJump = 15,
    #[strum(serialize = "ROM_ERROR_INVALID_OPCODE")]
    InvalidOpcode = 16,
    #[strum(serialize = "ROM_ERROR_INVALID_STATIC")]
    InvalidStatic = 17,
    #[strum(serialize = "ROM_ERROR_INVALID_BYTECODE_STARTS_EF")]
    InvalidBytecodeStartsEf = 18,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_SIGNATURE")]
    IntrinsicInvalidSignature = 19,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_CHAIN_ID")]
    IntrinsicInvalidChainId = 20,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_NONCE")]
    IntrinsicInvalidNonce = 21,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_GAS_LIMIT")]
    IntrinsicInvalidGasLimit = 22,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_BALANCE")]
    IntrinsicInvalidBalance = 23,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_BATCH_GAS_LIMIT")]
    IntrinsicInvalidBatchGasLimit = 24,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_INVALID_SENDER_CODE")]
    IntrinsicInvalidSenderCode = 25,
    #[strum(serialize = "ROM_ERROR_INTRINSIC_TX_GAS_OVERFLOW")]
    IntrinsicTxGasOverflow = 26,
    #[strum(serialize = "ROM_ERROR_BATCH_DATA_TOO_BIG")]
    BatchDataTooBig = 27,
    #[strum(serialize = "ROM_ERROR_UNSUPPORTED_FORK_ID")]
    UnsupportedForkId = 28,
}

impl TryFrom<String> for RomError {
    type Error = strum::ParseError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl RomError {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Maps a tracer tag to its error. Only exact matches are accepted; the
    /// empty tag means the instruction succeeded.
    pub fn from_tag(tag: &str) -> Result<Self, UnknownRomErrorTag> {
        Ok(match tag {
            "" => RomError::NoError,
            "OOG" => RomError::OutOfGas,
            "revert" => RomError::ExecutionReverted,
            "overflow" => RomError::StackOverflow,
            "underflow" => RomError::StackUnderflow,
            "OOCS" => RomError::OutOfCountersStep,
            "OOCK" => RomError::OutOfCountersKeccak,
            "OOCB" => RomError::OutOfCountersBinary,
            "OOCM" => RomError::OutOfCountersMem,
            "OOCA" => RomError::OutOfCountersArith,
            "OOCPA" => RomError::OutOfCountersPadding,
            "OOCPO" => RomError::OutOfCountersPoseidon,
            "intrinsic_invalid_signature" => RomError::IntrinsicInvalidSignature,
            "intrinsic_invalid_chain_id" => RomError::IntrinsicInvalidChainId,
            "intrinsic_invalid_nonce" => RomError::IntrinsicInvalidNonce,
            "intrinsic_invalid_gas_limit" => RomError::IntrinsicInvalidGasLimit,
            "intrinsic_invalid_gas_overflow" => RomError::IntrinsicTxGasOverflow,
            "intrinsic_invalid_balance" => RomError::IntrinsicInvalidBalance,
            "intrinsic_invalid_batch_gas_limit" => RomError::IntrinsicInvalidBatchGasLimit,
            "intrinsic_invalid_sender_code" => RomError::IntrinsicInvalidSenderCode,
            "invalidJump" => RomError::InvalidJump,
            "invalidOpcode" => RomError::InvalidOpcode,
            "invalidAddressCollision" => RomError::ContractAddressCollision,
            "invalidStaticTx" => RomError::InvalidStatic,
            "invalidCodeSize" => RomError::MaxCodeSizeExceeded,
            "invalidCodeStartsEF" => RomError::InvalidBytecodeStartsEf,
            "invalid_fork_id" => RomError::UnsupportedForkId,
            other => return Err(UnknownRomErrorTag(other.to_string())),
        })
    }

    /// The tracer tag producing this error, if there is one.
    pub fn tag(self) -> Option<&'static str> {
        Some(match self {
            RomError::NoError => "",
            RomError::OutOfGas => "OOG",
            RomError::ExecutionReverted => "revert",
            RomError::StackOverflow => "overflow",
            RomError::StackUnderflow => "underflow",
            RomError::OutOfCountersStep => "OOCS",
            RomError::OutOfCountersKeccak => "OOCK",
            RomError::OutOfCountersBinary => "OOCB",
            RomError::OutOfCountersMem => "OOCM",
            RomError::OutOfCountersArith => "OOCA",
            RomError::OutOfCountersPadding => "OOCPA",
            RomError::OutOfCountersPoseidon => "OOCPO",
            RomError::IntrinsicInvalidSignature => "intrinsic_invalid_signature",
            RomError::IntrinsicInvalidChainId => "intrinsic_invalid_chain_id",
            RomError::IntrinsicInvalidNonce => "intrinsic_invalid_nonce",
            RomError::IntrinsicInvalidGasLimit => "intrinsic_invalid_gas_limit",
            RomError::IntrinsicTxGasOverflow => "intrinsic_invalid_gas_overflow",
            RomError::IntrinsicInvalidBalance => "intrinsic_invalid_balance",
            RomError::IntrinsicInvalidBatchGasLimit => "intrinsic_invalid_batch_gas_limit",
            RomError::IntrinsicInvalidSenderCode => "intrinsic_invalid_sender_code",
            RomError::InvalidJump => "invalidJump",
            RomError::InvalidOpcode => "invalidOpcode",
            RomError::ContractAddressCollision => "invalidAddressCollision",
            RomError::InvalidStatic => "invalidStaticTx",
            RomError::MaxCodeSizeExceeded => "invalidCodeSize",
            RomError::InvalidBytecodeStartsEf => "invalidCodeStartsEF",
            RomError::UnsupportedForkId => "invalid_fork_id",
            RomError::Unspecified | RomError::BatchDataTooBig => return None,
        })
    }
}
