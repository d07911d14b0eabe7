//! Contract violation types.
//!
//! Every clause of the obligation rules has its own [`RuleViolation`] variant
//! so callers (and tests) can tell exactly which rule a transaction broke.

use obligation_protocol::crypto::PublicKey;
use obligation_protocol::ledger::{Amount, AmountError, Currency};
use obligation_protocol::transaction::ObligationCommand;
use thiserror::Error;

/// A broken obligation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// Obligation transactions carry exactly one obligation command.
    #[error("expected exactly one obligation command, found {found}")]
    RequireSingleCommand { found: usize },

    // -- Issue --------------------------------------------------------------
    #[error("no inputs should be consumed when issuing an obligation, found {count}")]
    IssueConsumesInputs { count: usize },

    #[error("only one obligation state should be created when issuing, found {count}")]
    IssueOutputCount { count: usize },

    #[error("a newly issued obligation must have a positive amount")]
    NonPositiveAmount,

    #[error("the lender and borrower cannot have the same identity")]
    LenderIsBorrower,

    // -- Transfer -----------------------------------------------------------
    #[error("an obligation transfer transaction should only consume one input state, found {count}")]
    TransferInputCount { count: usize },

    #[error("an obligation transfer transaction should only create one output state, found {count}")]
    TransferOutputCount { count: usize },

    #[error("only the lender property may change on transfer")]
    TransferChangesOtherFields,

    #[error("the lender property must change in a transfer")]
    LenderUnchanged,

    // -- Settle -------------------------------------------------------------
    #[error("there must be exactly one obligation input when settling, found {count}")]
    SettleInputCount { count: usize },

    #[error("there must be output cash when settling")]
    NoCashOutputs,

    #[error("there must be output cash paid to the recipient")]
    NoPaymentToLender,

    #[error("settlement payment is in {found}, obligation is in {expected}")]
    PaymentCurrencyMismatch { expected: Currency, found: Currency },

    #[error("the amount settled ({accepted}) cannot exceed the amount outstanding ({outstanding})")]
    OverSettlement { accepted: Amount, outstanding: Amount },

    #[error("there must be no obligation output when fully settling, found {count}")]
    FullySettledHasOutput { count: usize },

    #[error("there must be exactly one obligation output when partially settling, found {count}")]
    SettleOutputCount { count: usize },

    #[error("only the paid property may change on settlement")]
    SettleChangesOtherFields,

    #[error("paid must increase by exactly the settled amount: expected {expected}, found {found}")]
    UnderpaidMismatch { expected: Amount, found: Amount },

    // -- Shared -------------------------------------------------------------
    /// The command's signer set is not exactly the set the rule requires.
    #[error("{command}: signers {actual:?} must equal {expected:?}")]
    SignersMismatch {
        command: ObligationCommand,
        expected: Vec<PublicKey>,
        actual: Vec<PublicKey>,
    },

    #[error("amount arithmetic failed: {0}")]
    Amount(#[from] AmountError),
}

/// A broken cash rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CashViolation {
    #[error("cash states present but no cash command")]
    MissingCommand,

    #[error("expected exactly one cash command, found {found}")]
    RequireSingleCommand { found: usize },

    #[error("cash output of zero")]
    ZeroOutput,

    #[error("cash issue must not consume cash, found {count} inputs")]
    IssueConsumesInputs { count: usize },

    #[error("issued cash must be signed by its issuer {issuer}")]
    IssuerMustSign { issuer: PublicKey },

    /// Inputs and outputs differ for one (currency, issuer) group.
    #[error("cash of {currency} issued by {issuer} is unbalanced: in {inputs}, out {outputs}")]
    Unbalanced {
        currency: Currency,
        issuer: PublicKey,
        inputs: u64,
        outputs: u64,
    },

    #[error("owner {owner} of moved cash must sign")]
    MissingOwnerSignature { owner: PublicKey },

    #[error("amount arithmetic failed: {0}")]
    Amount(#[from] AmountError),
}

/// Whole-transaction verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("obligation contract: {0}")]
    Obligation(#[from] RuleViolation),

    #[error("cash contract: {0}")]
    Cash(#[from] CashViolation),
}
