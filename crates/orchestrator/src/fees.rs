//! Sign-then-check fee correction shared by every flow that signs a spend.
//!
//! The realized size is only known after signing. The transaction is built
//! with an estimated fee, signed, measured, and rebuilt once with the
//! recommended fee if the relay floor is not met.

use bitcoin::psbt::Psbt;
use custody_bitcoin::{FeeCheck, Signer, SigningSpec, TransactionBuilder};
use custody_types::{CustodyError, Result};
use tracing::{debug, warn};

/// Signing rounds per attempt, in order.
pub(crate) struct SigningStep<'a> {
    pub signer: &'a dyn Signer,
    pub auto_finalize: bool,
}

/// A signed PSBT whose fee meets the relay floor.
pub(crate) struct CorrectedPsbt {
    pub psbt: Psbt,
    pub fee: u64,
    pub vsize: u64,
}

const MAX_ATTEMPTS: usize = 2;

/// Build with `initial_fee`, run every signing step, then check the fee. One
/// rebuild at the recommended fee is allowed.
pub(crate) async fn sign_with_fee_correction<B>(
    builder: &TransactionBuilder,
    steps: &[SigningStep<'_>],
    initial_fee: u64,
    build: B,
) -> Result<CorrectedPsbt>
where
    B: Fn(u64) -> Result<Psbt>,
{
    let mut fee = initial_fee;
    let mut last = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let mut psbt = build(fee)?;
        for step in steps {
            let spec = SigningSpec::all(&psbt, step.auto_finalize);
            psbt = step.signer.sign_transaction(psbt, &spec).await?;
        }

        match builder.correct_fee_after_sign(&psbt, fee)? {
            FeeCheck::Sufficient { paid, vsize } => {
                debug!(
                    "Fee {} sats sufficient for {} vB on attempt {}",
                    paid, vsize, attempt
                );
                return Ok(CorrectedPsbt {
                    psbt,
                    fee: paid,
                    vsize,
                });
            }
            FeeCheck::Insufficient {
                paid,
                required,
                recommended_fee,
                vsize,
            } => {
                warn!(
                    "Fee {} sats below minimum {} for {} vB, re-signing with {}",
                    paid, required, vsize, recommended_fee
                );
                fee = recommended_fee;
                last = Some((paid, required));
            }
        }
    }

    let (paid, required) = last.unwrap_or((fee, fee));
    Err(CustodyError::FeeCorrectionExhausted { paid, required })
}
