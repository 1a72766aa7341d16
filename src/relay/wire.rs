//! JSON bodies exchanged with an HTTP relay
//!
//! Field names follow the Safe transaction service (`camelCase`, amounts as
//! decimal strings, bytes as `0x` hex). `method` is an optional extra carried
//! alongside the call data; records from a service that does not echo it are
//! rebuilt from the call data alone.

use crate::account::ExecutionReceipt;
use crate::core::{
    Address, Endorsement, MethodSignature, Operation, SafeTxParams, TransactionIntent,
    TransactionProposal,
};
use crate::crypto::{decode_hex, ShortHex, Signature, TxHash};
use crate::relay::{ProposalRecord, RecordStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A body that could not be turned back into domain types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl ToString) -> WireError {
    WireError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

/// Transaction fields shared by requests and responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTxFields {
    pub to: Address,
    pub value: String,
    pub data: Option<String>,
    pub operation: u8,
    pub safe_tx_gas: u64,
    pub base_gas: u64,
    pub gas_price: String,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl SafeTxFields {
    pub fn from_proposal(proposal: &TransactionProposal) -> Self {
        let data = if proposal.intent.data.is_empty() {
            None
        } else {
            Some(format!("0x{}", hex::encode(&proposal.intent.data)))
        };
        Self {
            to: proposal.intent.target,
            value: proposal.intent.value.to_string(),
            data,
            operation: proposal.params.operation.as_u8(),
            safe_tx_gas: proposal.params.safe_tx_gas,
            base_gas: proposal.params.base_gas,
            gas_price: proposal.params.gas_price.to_string(),
            gas_token: proposal.params.gas_token,
            refund_receiver: proposal.params.refund_receiver,
            nonce: proposal.nonce,
            method: proposal.intent.method.as_ref().map(ToString::to_string),
        }
    }

    /// Rebuild the proposal; the hash is recomputed from the fields
    pub fn to_proposal(&self, account: Address, chain_id: u64) -> Result<TransactionProposal, WireError> {
        let data = match &self.data {
            Some(hex) => decode_hex(hex).map_err(|e| invalid("data", e))?,
            None => Vec::new(),
        };
        let method = match self.method.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let method: MethodSignature = text.parse().map_err(|e| invalid("method", e))?;
                if data.get(..4) != Some(&method.selector()[..]) {
                    return Err(invalid(
                        "method",
                        format!("{} does not match the call data selector", method),
                    ));
                }
                Some(method)
            }
            _ => None,
        };
        let value = self.value.parse().map_err(|e| invalid("value", e))?;
        let gas_price = self.gas_price.parse().map_err(|e| invalid("gasPrice", e))?;
        let operation = Operation::from_u8(self.operation)
            .ok_or_else(|| invalid("operation", format!("unknown operation {}", self.operation)))?;

        let intent = TransactionIntent {
            target: self.to,
            method,
            data,
            value,
        };
        let params = SafeTxParams {
            operation,
            safe_tx_gas: self.safe_tx_gas,
            base_gas: self.base_gas,
            gas_price,
            gas_token: self.gas_token,
            refund_receiver: self.refund_receiver,
        };
        Ok(TransactionProposal::new(intent, params, account, self.nonce, chain_id))
    }
}

/// Body of `POST /api/v1/safes/{account}/multisig-transactions/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    #[serde(flatten)]
    pub tx: SafeTxFields,
    pub contract_transaction_hash: TxHash,
    pub sender: Address,
    pub signature: Signature,
    pub origin: Option<String>,
}

impl ProposeRequest {
    pub fn new(proposal: &TransactionProposal, endorsement: &Endorsement) -> Self {
        Self {
            tx: SafeTxFields::from_proposal(proposal),
            contract_transaction_hash: proposal.hash,
            sender: endorsement.signer,
            signature: endorsement.signature,
            origin: Some(env!("CARGO_PKG_NAME").to_string()),
        }
    }

    /// Proposal and initial endorsement as sent; the proposal keeps the sender's hash
    pub fn into_parts(
        self,
        account: Address,
        chain_id: u64,
    ) -> Result<(TransactionProposal, Endorsement), WireError> {
        let mut proposal = self.tx.to_proposal(account, chain_id)?;
        proposal.hash = self.contract_transaction_hash;
        let endorsement = Endorsement::new(proposal.hash, self.sender, self.signature);
        Ok((proposal, endorsement))
    }
}

/// Body of `POST /api/v1/multisig-transactions/{hash}/confirmations/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub signature: Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResponse {
    pub owner: Address,
    pub signature: Signature,
    pub submission_date: DateTime<Utc>,
}

/// A stored multisig transaction as returned by the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTransactionResponse {
    pub safe: Address,
    #[serde(flatten)]
    pub tx: SafeTxFields,
    pub safe_tx_hash: TxHash,
    pub submission_date: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub is_executed: bool,
    pub is_successful: Option<bool>,
    pub transaction_hash: Option<String>,
    pub execution_date: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub confirmations: Vec<ConfirmationResponse>,
}

impl MultisigTransactionResponse {
    pub fn from_record(record: &ProposalRecord) -> Self {
        let confirmations = record
            .endorsements
            .iter()
            .map(|e| ConfirmationResponse {
                owner: e.signer,
                signature: e.signature,
                submission_date: record.submitted_at,
            })
            .collect();

        let (is_executed, is_successful, transaction_hash, execution_date, failure_reason) =
            match &record.status {
                RecordStatus::Pending => (false, None, None, None, None),
                RecordStatus::Executed { receipt } => (
                    true,
                    Some(true),
                    Some(receipt.receipt_id.clone()),
                    Some(receipt.executed_at),
                    None,
                ),
                RecordStatus::Failed { reason } => {
                    (true, Some(false), None, None, Some(reason.clone()))
                }
            };

        Self {
            safe: record.proposal.account,
            tx: SafeTxFields::from_proposal(&record.proposal),
            safe_tx_hash: record.proposal.hash,
            submission_date: record.submitted_at,
            modified: record.updated_at,
            is_executed,
            is_successful,
            transaction_hash,
            execution_date,
            failure_reason,
            confirmations,
        }
    }

    /// Rebuild the record; the relay's hash is kept even if it disagrees with
    /// the locally computed one
    pub fn into_record(self, chain_id: u64) -> Result<ProposalRecord, WireError> {
        let mut proposal = self.tx.to_proposal(self.safe, chain_id)?;
        if proposal.hash != self.safe_tx_hash {
            log::warn!(
                "Relay hash {} differs from local hash {} for nonce {}",
                self.safe_tx_hash.short(),
                proposal.hash.short(),
                proposal.nonce
            );
            proposal.hash = self.safe_tx_hash;
        }

        let mut confirmations = self.confirmations;
        confirmations.sort_by_key(|c| c.submission_date);
        let endorsements = confirmations
            .into_iter()
            .map(|c| Endorsement::new(self.safe_tx_hash, c.owner, c.signature))
            .collect();

        let status = if let Some(reason) = self.failure_reason {
            RecordStatus::Failed { reason }
        } else if self.is_executed && self.is_successful != Some(false) {
            RecordStatus::Executed {
                receipt: ExecutionReceipt {
                    receipt_id: self.transaction_hash.unwrap_or_default(),
                    proposal_hash: self.safe_tx_hash,
                    account: self.safe,
                    nonce: proposal.nonce,
                    executed_at: self.execution_date.unwrap_or(self.modified),
                },
            }
        } else if self.is_executed {
            RecordStatus::Failed {
                reason: "execution failed".to_string(),
            }
        } else {
            RecordStatus::Pending
        };

        Ok(ProposalRecord {
            proposal,
            endorsements,
            status,
            submitted_at: self.submission_date,
            updated_at: self.modified,
        })
    }
}

/// Paginated list wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::build_from_strings;
    use crate::crypto::KeyPair;

    fn record() -> (ProposalRecord, KeyPair) {
        let kp = KeyPair::generate();
        let intent = build_from_strings(
            "0x2dd0849e27b78cb66e144a50105e785cfd815eaa",
            "transfer(address,uint256)",
            &[
                "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".to_string(),
                "1000".to_string(),
            ],
            None,
        )
        .unwrap();
        let proposal = TransactionProposal::new(
            intent,
            SafeTxParams::default(),
            Address::repeat_byte(0x42),
            7,
            5,
        );
        let endorsement = Endorsement::new(
            proposal.hash,
            kp.address(),
            kp.sign_hash(&proposal.hash).unwrap(),
        );
        (ProposalRecord::new(proposal, endorsement), kp)
    }

    #[test]
    fn test_response_rebuilds_record() {
        let (record, kp) = record();
        let json = serde_json::to_value(MultisigTransactionResponse::from_record(&record)).unwrap();
        assert_eq!(json["nonce"], 7);
        assert_eq!(json["value"], "0");
        assert_eq!(json["method"], "transfer(address,uint256)");
        assert_eq!(json["isExecuted"], false);

        let response: MultisigTransactionResponse = serde_json::from_value(json).unwrap();
        let rebuilt = response.into_record(5).unwrap();
        assert_eq!(rebuilt.proposal, record.proposal);
        assert_eq!(rebuilt.signers(), vec![kp.address()]);
        assert!(rebuilt.is_pending());
    }

    #[test]
    fn test_relay_hash_wins() {
        let (record, _) = record();
        let response = MultisigTransactionResponse::from_record(&record);
        // Rebuilding on another chain gives another local hash
        let rebuilt = response.into_record(1).unwrap();
        assert_eq!(rebuilt.proposal.hash, record.proposal.hash);
        assert!(!rebuilt.proposal.verify_hash());
    }

    #[test]
    fn test_propose_request_parts() {
        let (record, kp) = record();
        let request = ProposeRequest::new(&record.proposal, &record.endorsements[0]);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("contractTransactionHash"));
        assert!(json.contains("safeTxGas"));

        let request: ProposeRequest = serde_json::from_str(&json).unwrap();
        let (proposal, endorsement) = request.into_parts(Address::repeat_byte(0x42), 5).unwrap();
        assert_eq!(proposal, record.proposal);
        assert_eq!(endorsement.signer, kp.address());
        assert!(endorsement.is_authentic());
    }

    #[test]
    fn test_record_without_method_rebuilds_from_data() {
        let (record, kp) = record();
        let mut json =
            serde_json::to_value(MultisigTransactionResponse::from_record(&record)).unwrap();
        json.as_object_mut().unwrap().remove("method");

        let response: MultisigTransactionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.tx.method, None);
        let rebuilt = response.into_record(5).unwrap();
        assert_eq!(rebuilt.proposal.intent.method, None);
        assert_eq!(rebuilt.proposal.intent.data, record.proposal.intent.data);
        assert_eq!(rebuilt.proposal.hash, record.proposal.hash);
        assert!(rebuilt.proposal.verify_hash());
        assert_eq!(rebuilt.proposal.intent.describe_call(), "0xa9059cbb");
        assert_eq!(rebuilt.signers(), vec![kp.address()]);

        let fields = SafeTxFields::from_proposal(&rebuilt.proposal);
        assert!(!serde_json::to_string(&fields).unwrap().contains("method"));
    }

    #[test]
    fn test_invalid_fields() {
        let (record, _) = record();
        let mut fields = SafeTxFields::from_proposal(&record.proposal);
        fields.operation = 4;
        assert!(matches!(
            fields.to_proposal(Address::ZERO, 5),
            Err(WireError::InvalidField { field: "operation", .. })
        ));

        let mut fields = SafeTxFields::from_proposal(&record.proposal);
        fields.value = "lots".to_string();
        assert!(matches!(
            fields.to_proposal(Address::ZERO, 5),
            Err(WireError::InvalidField { field: "value", .. })
        ));

        let mut fields = SafeTxFields::from_proposal(&record.proposal);
        fields.method = Some("pause()".to_string());
        assert!(matches!(
            fields.to_proposal(Address::ZERO, 5),
            Err(WireError::InvalidField { field: "method", .. })
        ));
    }
}
