//! HTTP relay client
//!
//! Talks JSON to a relay exposing Safe-transaction-service style routes.

use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::{ShortHex, TxHash};
use crate::relay::wire::{ConfirmRequest, MultisigTransactionResponse, Page, ProposeRequest};
use crate::relay::{ProposalRecord, RecordOutcome, RelayClient, RelayError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Upper bound on pages followed for one listing
const MAX_PAGES: usize = 100;

/// Client for a relay reachable over HTTP(S)
pub struct HttpRelayClient {
    client: Client,
    base_url: String,
    chain_id: u64,
}

impl HttpRelayClient {
    /// Create a client; `chain_id` is used to rebuild fetched proposals
    pub fn new(endpoint: &str, chain_id: u64, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            chain_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpFailure> {
        self.get_url(&format!("{}{}", self.base_url, path)).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpFailure> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport)?;
        handle_response(response).await
    }

    /// `next` links are absolute on the hosted service; accept paths too
    fn resolve_link(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            format!("{}{}", self.base_url, link)
        } else {
            format!("{}/{}", self.base_url, link)
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpFailure> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        handle_response(response).await
    }

    fn decode_record(&self, response: MultisigTransactionResponse) -> Result<ProposalRecord, RelayError> {
        response
            .into_record(self.chain_id)
            .map_err(|e| RelayError::Rejected(format!("malformed relay response: {}", e)))
    }
}

/// A failed HTTP exchange before it is given domain meaning
#[derive(Debug)]
enum HttpFailure {
    Transport(String),
    Status { status: StatusCode, message: String },
    Decode(String),
}

impl HttpFailure {
    /// Map to a relay error; `hash` names the record a 404 refers to
    fn into_relay_error(self, hash: Option<TxHash>) -> RelayError {
        match self {
            HttpFailure::Transport(message) => RelayError::Unavailable(message),
            HttpFailure::Decode(message) => {
                RelayError::Rejected(format!("malformed relay response: {}", message))
            }
            HttpFailure::Status { status, message } => {
                let detail = format!("HTTP {}: {}", status.as_u16(), message);
                match hash {
                    Some(hash) if status == StatusCode::NOT_FOUND => {
                        RelayError::UnknownProposal(hash)
                    }
                    _ if status.is_server_error()
                        || status == StatusCode::REQUEST_TIMEOUT
                        || status == StatusCode::TOO_MANY_REQUESTS =>
                    {
                        RelayError::Unavailable(detail)
                    }
                    _ => RelayError::Rejected(detail),
                }
            }
        }
    }
}

fn transport(e: reqwest::Error) -> HttpFailure {
    HttpFailure::Transport(e.to_string())
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, HttpFailure> {
    let status = response.status();

    if status.is_success() {
        let body = response.bytes().await.map_err(transport)?;
        // Some endpoints answer 201/204 with an empty body
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| HttpFailure::Decode(e.to_string()))
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(HttpFailure::Status { status, message })
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn propose(
        &self,
        proposal: &TransactionProposal,
        endorsement: &Endorsement,
    ) -> Result<TxHash, RelayError> {
        let path = format!(
            "/api/v1/safes/{}/multisig-transactions/",
            proposal.account.to_checksum(None)
        );
        let body = ProposeRequest::new(proposal, endorsement);

        match self.post::<_, serde_json::Value>(&path, &body).await {
            Ok(_) => Ok(proposal.hash),
            Err(HttpFailure::Status { status, message })
                if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY =>
            {
                // Already known: success only if the stored proposal is ours
                log::debug!("Relay refused propose ({}): {}", status.as_u16(), message);
                let existing = self.fetch(&proposal.hash).await.map_err(|e| match e {
                    RelayError::UnknownProposal(_) => {
                        RelayError::Rejected(format!("HTTP {}: {}", status.as_u16(), message))
                    }
                    other => other,
                })?;
                if existing.proposal != *proposal {
                    return Err(RelayError::Conflict(proposal.hash));
                }
                if !existing.has_endorsed(&endorsement.signer) {
                    self.confirm(&proposal.hash, endorsement).await?;
                }
                Ok(proposal.hash)
            }
            Err(failure) => Err(failure.into_relay_error(None)),
        }
    }

    async fn fetch(&self, hash: &TxHash) -> Result<ProposalRecord, RelayError> {
        let path = format!("/api/v1/multisig-transactions/{}/", hash);
        let response: MultisigTransactionResponse = self
            .get(&path)
            .await
            .map_err(|f| f.into_relay_error(Some(*hash)))?;
        self.decode_record(response)
    }

    async fn confirm(&self, hash: &TxHash, endorsement: &Endorsement) -> Result<(), RelayError> {
        let path = format!("/api/v1/multisig-transactions/{}/confirmations/", hash);
        let body = ConfirmRequest {
            signature: endorsement.signature,
        };
        self.post::<_, serde_json::Value>(&path, &body)
            .await
            .map_err(|f| f.into_relay_error(Some(*hash)))?;
        Ok(())
    }

    async fn list_pending(&self, account: &Address) -> Result<Vec<ProposalRecord>, RelayError> {
        let mut url = format!(
            "{}/api/v1/safes/{}/multisig-transactions/?executed=false",
            self.base_url,
            account.to_checksum(None)
        );
        let mut responses = Vec::new();
        let mut pages = 0;
        loop {
            if pages == MAX_PAGES {
                return Err(RelayError::Rejected(format!(
                    "pending list of {} spans more than {} pages",
                    account, MAX_PAGES
                )));
            }
            let page: Page<MultisigTransactionResponse> =
                self.get_url(&url).await.map_err(|f| f.into_relay_error(None))?;
            pages += 1;
            responses.extend(page.results);
            match page.next {
                Some(next) => url = self.resolve_link(&next),
                None => break,
            }
        }
        log::debug!("Read {} pending records over {} pages", responses.len(), pages);

        let mut records = responses
            .into_iter()
            .map(|r| self.decode_record(r))
            .collect::<Result<Vec<_>, _>>()?;
        records.retain(|r| r.is_pending());
        records.sort_by(|a, b| {
            a.proposal
                .nonce
                .cmp(&b.proposal.nonce)
                .then(a.submitted_at.cmp(&b.submitted_at))
        });
        Ok(records)
    }

    async fn record_outcome(&self, hash: &TxHash, outcome: RecordOutcome) -> Result<(), RelayError> {
        // The hosted service indexes executions from the chain itself
        log::debug!("Not reporting outcome of {} to relay: {:?}", hash.short(), outcome);
        Ok(())
    }
}
