//! Authorization coordinator
//!
//! Drives a proposal from a built intent to a single execution:
//! build → propose → collect endorsements → validate → execute.
//!
//! The coordinator holds no durable state. Every operation re-reads the relay
//! record and the account, so any caller can resume a proposal by its hash.
//!
//! # Example
//!
//! ```ignore
//! use multisig_coordinator::coordinator::Coordinator;
//!
//! let coordinator = Coordinator::new(relay, ledger, CoordinatorConfig::default());
//! let proposal = coordinator.build_proposal(account, intent, params, &cancel).await?;
//! let hash = coordinator.propose(&proposal, &alice, &cancel).await?;
//! coordinator.endorse(&hash, &bob, &cancel).await?;
//! let state = coordinator.execute(&hash, &cancel).await?;
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod state;

use crate::account::{evaluate, AccountState, ExecutionReceipt, MultisigAccountView, Validity};
use crate::core::{Address, Endorsement, SafeTxParams, TransactionIntent, TransactionProposal};
use crate::crypto::{recover_signer, ShortHex, TxHash};
use crate::relay::{ProposalRecord, RecordOutcome, RecordStatus, RelayClient};
use crate::signer::Signer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use config::{CoordinatorConfig, RetryPolicy};
pub use error::{CoordinatorError, ErrorKind};
pub use retry::{Call, Retrier};
pub use state::{Authorization, AuthorizationState, EndorseOutcome, PendingProposal};

use error::signer_error;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Composes a relay and an account view into the authorization workflow
#[derive(Clone)]
pub struct Coordinator {
    relay: Arc<dyn RelayClient>,
    accounts: Arc<dyn MultisigAccountView>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        accounts: Arc<dyn MultisigAccountView>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            relay,
            accounts,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn retrier<'a>(&'a self, cancel: &'a CancellationToken) -> Retrier<'a> {
        Retrier::new(&self.config.retry, self.config.call_timeout(), cancel)
    }

    /// Bind an intent to the account's current nonce
    pub async fn build_proposal(
        &self,
        account: Address,
        intent: TransactionIntent,
        params: SafeTxParams,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<TransactionProposal> {
        let retrier = self.retrier(cancel);
        let state = self.read_state(&retrier, &account).await?;

        let proposal =
            TransactionProposal::new(intent, params, account, state.nonce, self.config.chain_id);
        log::info!(
            "Built proposal {} for {} at nonce {} ({})",
            proposal.hash.short(),
            account,
            proposal.nonce,
            proposal.intent.describe_call()
        );
        Ok(proposal)
    }

    /// Sign the proposal as `initiator` and store it at the relay
    ///
    /// Proposing the same proposal again returns the same hash.
    pub async fn propose(
        &self,
        proposal: &TransactionProposal,
        initiator: &dyn Signer,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<TxHash> {
        let retrier = self.retrier(cancel);
        let state = self.read_state(&retrier, &proposal.account).await?;
        ensure_signer(&state, initiator.identity(), proposal.account)?;
        if proposal.nonce < state.nonce {
            return Err(CoordinatorError::StaleNonce {
                proposal: proposal.nonce,
                current: state.nonce,
            });
        }

        let endorsement = self.solicit(&retrier, initiator, &proposal.hash).await?;

        let relay = self.relay.as_ref();
        let endorsement = &endorsement;
        let hash = retrier
            .run(Call::Relay, "propose", move || relay.propose(proposal, endorsement))
            .await
            .map_err(|e| {
                log::error!("Proposing {} failed: {}", proposal.hash.short(), e);
                e
            })?;

        if hash != proposal.hash {
            log::warn!(
                "Relay stored {} under {}",
                proposal.hash.short(),
                hash.short()
            );
        }
        log::info!(
            "Proposed {} for {} at nonce {} (initiator {})",
            hash.short(),
            proposal.account,
            proposal.nonce,
            initiator.identity()
        );
        Ok(hash)
    }

    /// Ask `signer` to endorse a stored proposal and record the endorsement
    pub async fn endorse(
        &self,
        hash: &TxHash,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<EndorseOutcome> {
        let retrier = self.retrier(cancel);
        let record = self.fetch_record(&retrier, hash).await?;
        if !record.is_pending() {
            return Err(CoordinatorError::RelayRejected(format!(
                "{} is no longer pending",
                hash.short()
            )));
        }

        let state = self.read_state(&retrier, &record.proposal.account).await?;
        if record.proposal.nonce < state.nonce {
            return Err(CoordinatorError::StaleNonce {
                proposal: record.proposal.nonce,
                current: state.nonce,
            });
        }

        let identity = signer.identity();
        ensure_signer(&state, identity, record.proposal.account)?;
        if record.has_endorsed(&identity) {
            log::debug!("{} already endorsed {}", identity, hash.short());
            return Ok(EndorseOutcome::AlreadyRecorded);
        }

        // Sign what the relay stored, not a locally recomputed hash
        let target = &record.proposal.hash;
        let endorsement = self.solicit(&retrier, signer, target).await?;

        let relay = self.relay.as_ref();
        let endorsement = &endorsement;
        retrier
            .run(Call::Relay, "confirm", move || relay.confirm(target, endorsement))
            .await?;

        log::info!(
            "{} endorsed {} ({} endorsements, threshold {})",
            identity,
            target.short(),
            record.endorsements.len() + 1,
            state.threshold
        );
        Ok(EndorseOutcome::Accepted)
    }

    /// Current state of a proposal
    pub async fn status(
        &self,
        hash: &TxHash,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<AuthorizationState> {
        let retrier = self.retrier(cancel);
        let record = self.fetch_record(&retrier, hash).await?;
        let state = self.read_state(&retrier, &record.proposal.account).await?;
        self.derive_state(&retrier, &record, &state).await
    }

    /// Execute a proposal once it is valid
    ///
    /// Returns `Executed` with the receipt (also when it already ran), or the
    /// pending state if endorsements or earlier nonces are still missing.
    pub async fn execute(
        &self,
        hash: &TxHash,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<AuthorizationState> {
        let retrier = self.retrier(cancel);
        retrier.check_cancelled()?;

        let record = self.fetch_record(&retrier, hash).await?;
        if let Some(state) = terminal_state(&record) {
            log::info!("{} already settled: {}", hash.short(), state);
            return Ok(state);
        }

        let proposal = &record.proposal;
        if let Some(receipt) = self
            .find_execution(&retrier, &proposal.account, &proposal.hash)
            .await?
        {
            log::info!(
                "{} already executed (receipt {})",
                proposal.hash.short(),
                receipt.receipt_id
            );
            self.mark_outcome(&retrier, &proposal.hash, RecordOutcome::Executed(receipt.clone()))
                .await;
            return Ok(AuthorizationState::Executed { receipt });
        }

        let accounts = self.accounts.as_ref();
        let endorsements = record.endorsements.as_slice();
        let validity = retrier
            .run(Call::Account, "validate proposal", move || {
                accounts.validate(proposal, endorsements)
            })
            .await?;

        match validity {
            Validity::Valid => {}
            Validity::StaleNonce { proposal: nonce, current } => {
                log::warn!(
                    "{} is stale (nonce {}, account at {}); rebuild required",
                    proposal.hash.short(),
                    nonce,
                    current
                );
                return Err(CoordinatorError::StaleNonce {
                    proposal: nonce,
                    current,
                });
            }
            other => {
                let state = AuthorizationState::from_validity(other);
                log::info!("{} not executable yet: {}", proposal.hash.short(), state);
                return Ok(state);
            }
        }

        // Last point at which cancellation is honoured
        retrier.check_cancelled()?;
        let receipt = self.submit(&record).await?;

        self.mark_outcome(&retrier, &proposal.hash, RecordOutcome::Executed(receipt.clone()))
            .await;
        log::info!(
            "Executed {} on {} at nonce {} (receipt {})",
            proposal.hash.short(),
            proposal.account,
            receipt.nonce,
            receipt.receipt_id
        );
        if let Some(link) = self.config.explorer_link(&receipt.receipt_id) {
            log::info!("View the transaction at {}", link);
        }
        Ok(AuthorizationState::Executed { receipt })
    }

    /// Build, propose, collect endorsements in order and execute
    ///
    /// Cosigners are asked one at a time until the proposal is valid; the
    /// remaining ones are not contacted. A conflict or revert ends the
    /// authorization in `Rejected` or `Failed`; other errors are returned.
    pub async fn authorize(
        &self,
        account: Address,
        intent: TransactionIntent,
        params: SafeTxParams,
        initiator: &dyn Signer,
        cosigners: &[&dyn Signer],
        cancel: &CancellationToken,
    ) -> CoordinatorResult<Authorization> {
        let proposal = self.build_proposal(account, intent, params, cancel).await?;
        let hash = proposal.hash;

        match self.drive(&proposal, initiator, cosigners, cancel).await {
            Ok(state) => Ok(Authorization { hash, state }),
            Err(err) => match AuthorizationState::from_terminal_error(&err) {
                Some(state) => {
                    log::warn!("Authorization of {} ended {}", hash.short(), state);
                    Ok(Authorization { hash, state })
                }
                None => Err(err),
            },
        }
    }

    async fn drive(
        &self,
        proposal: &TransactionProposal,
        initiator: &dyn Signer,
        cosigners: &[&dyn Signer],
        cancel: &CancellationToken,
    ) -> CoordinatorResult<AuthorizationState> {
        let hash = self.propose(proposal, initiator, cancel).await?;

        for cosigner in cosigners {
            let state = self.status(&hash, cancel).await?;
            if !state.is_pending() {
                break;
            }
            self.endorse(&hash, *cosigner, cancel).await?;
        }

        self.execute(&hash, cancel).await
    }

    /// Rebind a stale proposal's intent and parameters to the current nonce
    ///
    /// The returned proposal still has to be proposed and endorsed.
    pub async fn rebuild(
        &self,
        hash: &TxHash,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<TransactionProposal> {
        let retrier = self.retrier(cancel);
        let record = self.fetch_record(&retrier, hash).await?;
        if let Some(receipt) = record.receipt() {
            return Err(CoordinatorError::RelayRejected(format!(
                "{} already executed (receipt {})",
                hash.short(),
                receipt.receipt_id
            )));
        }

        let proposal = &record.proposal;
        if let Some(receipt) = self
            .find_execution(&retrier, &proposal.account, &proposal.hash)
            .await?
        {
            return Err(CoordinatorError::RelayRejected(format!(
                "{} already executed (receipt {})",
                hash.short(),
                receipt.receipt_id
            )));
        }

        let state = self.read_state(&retrier, &proposal.account).await?;
        if proposal.nonce >= state.nonce {
            log::debug!("{} is not stale; keeping nonce {}", hash.short(), proposal.nonce);
            return Ok(proposal.clone());
        }

        let rebuilt = proposal.rebind(state.nonce);
        log::info!(
            "Rebuilt {} as {} at nonce {}",
            hash.short(),
            rebuilt.hash.short(),
            rebuilt.nonce
        );
        Ok(rebuilt)
    }

    /// Unexecuted proposals of an account with their states
    pub async fn pending(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> CoordinatorResult<Vec<PendingProposal>> {
        let retrier = self.retrier(cancel);
        let relay = self.relay.as_ref();
        let records = retrier
            .run(Call::Relay, "list pending", move || relay.list_pending(account))
            .await?;
        let state = self.read_state(&retrier, account).await?;

        let mut pending = Vec::with_capacity(records.len());
        for record in records {
            let derived = self.derive_state(&retrier, &record, &state).await?;
            pending.push(PendingProposal {
                record,
                state: derived,
            });
        }
        Ok(pending)
    }

    async fn read_state(
        &self,
        retrier: &Retrier<'_>,
        account: &Address,
    ) -> CoordinatorResult<AccountState> {
        let accounts = self.accounts.as_ref();
        retrier
            .run(Call::Account, "read account state", move || {
                accounts.current_state(account)
            })
            .await
    }

    async fn fetch_record(
        &self,
        retrier: &Retrier<'_>,
        hash: &TxHash,
    ) -> CoordinatorResult<ProposalRecord> {
        let relay = self.relay.as_ref();
        retrier
            .run(Call::Relay, "fetch proposal", move || relay.fetch(hash))
            .await
    }

    async fn find_execution(
        &self,
        retrier: &Retrier<'_>,
        account: &Address,
        hash: &TxHash,
    ) -> CoordinatorResult<Option<ExecutionReceipt>> {
        let accounts = self.accounts.as_ref();
        retrier
            .run(Call::Account, "look up execution", move || {
                accounts.find_execution(account, hash)
            })
            .await
    }

    /// Get a signature from `signer` and check it recovers to the signer
    async fn solicit(
        &self,
        retrier: &Retrier<'_>,
        signer: &dyn Signer,
        hash: &TxHash,
    ) -> CoordinatorResult<Endorsement> {
        let identity = signer.identity();
        let signature = retrier
            .run(Call::Signer(identity), "request signature", move || async move {
                signer
                    .sign(hash)
                    .await
                    .map_err(|e| signer_error(identity, e))
            })
            .await
            .map_err(|e| {
                log::warn!("No signature from {} for {}: {}", identity, hash.short(), e);
                e
            })?;

        match recover_signer(hash, &signature) {
            Ok(recovered) if recovered == identity => {
                Ok(Endorsement::new(*hash, identity, signature))
            }
            Ok(recovered) => Err(CoordinatorError::SignatureDeclined {
                signer: identity,
                reason: format!("signature recovers to {}", recovered),
            }),
            Err(e) => Err(CoordinatorError::SignatureDeclined {
                signer: identity,
                reason: format!("invalid signature: {}", e),
            }),
        }
    }

    async fn derive_state(
        &self,
        retrier: &Retrier<'_>,
        record: &ProposalRecord,
        state: &AccountState,
    ) -> CoordinatorResult<AuthorizationState> {
        if let Some(settled) = terminal_state(record) {
            return Ok(settled);
        }

        let validity = evaluate(state, &record.proposal, &record.endorsements);
        if validity.is_stale() {
            // The relay may not know yet that this very proposal consumed the nonce
            if let Some(receipt) = self
                .find_execution(retrier, &record.proposal.account, &record.proposal.hash)
                .await?
            {
                return Ok(AuthorizationState::Executed { receipt });
            }
        }
        Ok(AuthorizationState::from_validity(validity))
    }

    /// Submit for execution; not cancellable once started
    async fn submit(&self, record: &ProposalRecord) -> CoordinatorResult<ExecutionReceipt> {
        let uncancelled = CancellationToken::new();
        let retrier = self.retrier(&uncancelled);
        let proposal = &record.proposal;
        let attempts = retrier.max_attempts();
        let mut attempt = 1;

        loop {
            let result = retrier
                .once(
                    Call::Account,
                    self.accounts.execute(proposal, &record.endorsements),
                )
                .await;

            let err = match result {
                Ok(receipt) => return Ok(receipt),
                Err(CoordinatorError::ExecutionReverted(reason)) => {
                    return self.classify_revert(&retrier, record, reason).await;
                }
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            // The submission may have landed before the failure
            if let Ok(Some(receipt)) = retrier
                .once(
                    Call::Account,
                    self.accounts.find_execution(&proposal.account, &proposal.hash),
                )
                .await
            {
                log::info!("Execution of {} landed despite: {}", proposal.hash.short(), err);
                return Ok(receipt);
            }

            if attempt >= attempts {
                log::error!(
                    "Submitting {} failed after {} attempts: {}",
                    proposal.hash.short(),
                    attempts,
                    err
                );
                return Err(err);
            }
            let delay = retrier.delay(attempt);
            log::warn!(
                "Submitting {} failed (attempt {}/{}): {}; retrying in {:?}",
                proposal.hash.short(),
                attempt,
                attempts,
                err,
                delay
            );
            retrier.pause(delay).await?;
            attempt += 1;
        }
    }

    /// Decide whether a revert means the nonce moved on or the call itself failed
    async fn classify_revert(
        &self,
        retrier: &Retrier<'_>,
        record: &ProposalRecord,
        reason: String,
    ) -> CoordinatorResult<ExecutionReceipt> {
        let proposal = &record.proposal;
        if let Ok(Some(receipt)) = self
            .find_execution(retrier, &proposal.account, &proposal.hash)
            .await
        {
            return Ok(receipt);
        }

        match self.read_state(retrier, &proposal.account).await {
            Ok(state) if state.nonce > proposal.nonce => {
                log::warn!(
                    "{} lost the race for nonce {} (account at {})",
                    proposal.hash.short(),
                    proposal.nonce,
                    state.nonce
                );
                Err(CoordinatorError::StaleNonce {
                    proposal: proposal.nonce,
                    current: state.nonce,
                })
            }
            Ok(_) => {
                log::error!("Execution of {} reverted: {}", proposal.hash.short(), reason);
                self.mark_outcome(retrier, &proposal.hash, RecordOutcome::Failed(reason.clone()))
                    .await;
                Err(CoordinatorError::ExecutionReverted(reason))
            }
            Err(e) => {
                log::error!(
                    "Execution of {} reverted ({}); account state unreadable: {}",
                    proposal.hash.short(),
                    reason,
                    e
                );
                Err(CoordinatorError::ExecutionReverted(reason))
            }
        }
    }

    /// Store the terminal marker at the relay; failures are logged, not raised
    async fn mark_outcome(&self, retrier: &Retrier<'_>, hash: &TxHash, outcome: RecordOutcome) {
        let relay = self.relay.as_ref();
        let outcome = &outcome;
        let result = retrier
            .run(Call::Relay, "record outcome", move || {
                relay.record_outcome(hash, outcome.clone())
            })
            .await;
        if let Err(e) = result {
            log::warn!("Could not record outcome of {} at relay: {}", hash.short(), e);
        }
    }
}

fn ensure_signer(state: &AccountState, signer: Address, account: Address) -> CoordinatorResult<()> {
    if !state.is_signer(&signer) {
        log::warn!("{} is not a signer of {}", signer, account);
        return Err(CoordinatorError::UnauthorizedSigner { signer, account });
    }
    Ok(())
}

fn terminal_state(record: &ProposalRecord) -> Option<AuthorizationState> {
    match &record.status {
        RecordStatus::Pending => None,
        RecordStatus::Executed { receipt } => Some(AuthorizationState::Executed {
            receipt: receipt.clone(),
        }),
        RecordStatus::Failed { reason } => Some(AuthorizationState::Failed {
            kind: ErrorKind::ExecutionReverted,
            reason: reason.clone(),
        }),
    }
}
