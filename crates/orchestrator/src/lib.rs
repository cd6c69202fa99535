//! Custody orchestration
//!
//! Drives the accountable custody protocol on top of the script, signing and
//! storage layers:
//!
//! 1. **Deposits**: custody addresses per lock, UTXO scan and balance
//! 2. **Commitments**: one-time key derivation, commitment creation and
//!    registration
//! 3. **Shares**: verified, write-once signature shares
//! 4. **Recovery**: one-time key extraction and slashing once both shares exist
//! 5. **Withdrawals**: co-signed or self-signed spends with fee correction

pub mod account;
pub mod commitment;
mod fees;
pub mod policy;
mod records;
pub mod recovery;
pub mod shares;
pub mod withdrawal;

pub use account::DepositAccount;
pub use commitment::{CommitmentEngine, CommitmentRequest};
pub use policy::UnconfirmedPolicy;
pub use recovery::{RecoveryEngine, SlashTransactions};
pub use shares::{produce_share, ShareSet, SignatureShareEngine};
pub use withdrawal::{WithdrawalOrchestrator, WithdrawalPlan, WithdrawalReceipt, WithdrawalRoute};
