//! CLI commands for the coordinator
//!
//! Offline commands build and sign proposals; relay commands read what a
//! relay service holds.

use crate::coordinator::CoordinatorConfig;
use crate::core::{build_from_strings, parse_address, SafeTxParams, TransactionProposal};
use crate::crypto::{ShortHex, Signature, TxHash};
use crate::relay::{ProposalRecord, RecordStatus, RelayClient};
use crate::signer::{LocalSigner, Signer};
use alloy_primitives::U256;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Textual description of a proposal as given on the command line
#[derive(Debug, Clone)]
pub struct ProposalInput {
    pub account: String,
    pub target: String,
    pub method: String,
    pub args: Vec<String>,
    pub value: Option<U256>,
    pub nonce: u64,
}

/// Build a proposal and print its canonical hash
pub fn cmd_hash(input: &ProposalInput, config: &CoordinatorConfig) -> CliResult<TransactionProposal> {
    let account = parse_address(&input.account)?;
    let intent = build_from_strings(&input.target, &input.method, &input.args, input.value)?;
    let proposal = TransactionProposal::new(
        intent,
        SafeTxParams::default(),
        account,
        input.nonce,
        config.chain_id,
    );

    println!("📝 Proposal");
    println!("   Account:  {}", proposal.account);
    println!("   Chain:    {}", proposal.chain_id);
    println!("   Nonce:    {}", proposal.nonce);
    println!("   Target:   {}", proposal.intent.target);
    println!("   Method:   {}", proposal.intent.describe_call());
    println!("   Value:    {}", proposal.intent.value);
    println!("   Data:     0x{}", hex::encode(&proposal.intent.data));
    println!("   Hash:     {}", proposal.hash);

    Ok(proposal)
}

/// Sign a proposal hash with a local key
pub async fn cmd_sign(private_key: &str, hash: &str) -> CliResult<Signature> {
    let hash: TxHash = hash.parse()?;
    let signer = LocalSigner::from_private_key_hex(private_key)?;
    let signature = signer.sign(&hash).await?;

    println!("✍️  Signed {}", hash);
    println!("   Signer:    {}", signer.identity());
    println!("   Signature: {}", signature.to_hex());

    Ok(signature)
}

/// Show a proposal stored at the relay
pub async fn cmd_show(relay: &dyn RelayClient, hash: &str) -> CliResult<ProposalRecord> {
    let hash: TxHash = hash.parse()?;
    let record = relay.fetch(&hash).await?;

    println!("📄 Proposal {}", record.hash());
    println!("   Account:   {}", record.proposal.account);
    println!("   Nonce:     {}", record.proposal.nonce);
    println!(
        "   Call:      {} on {}",
        record.proposal.intent.describe_call(),
        record.proposal.intent.target
    );
    println!("   Submitted: {}", record.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Status:    {}", describe_status(&record.status));
    println!("   Endorsed by ({}):", record.endorsements.len());
    for endorsement in &record.endorsements {
        let mark = if endorsement.is_authentic() { "✅" } else { "❌" };
        println!("     {} {}", mark, endorsement.signer);
    }

    Ok(record)
}

/// List unexecuted proposals of an account
pub async fn cmd_pending(relay: &dyn RelayClient, account: &str) -> CliResult<Vec<ProposalRecord>> {
    let account = parse_address(account)?;
    let records = relay.list_pending(&account).await?;

    if records.is_empty() {
        println!("📭 No pending proposals for {}", account);
        return Ok(records);
    }

    println!("📋 Pending proposals for {} ({}):", account, records.len());
    println!("{:-<80}", "");
    for record in &records {
        println!(
            "  #{:<5} {}  {}  ({} endorsements)",
            record.proposal.nonce,
            record.hash().short(),
            record.proposal.intent.describe_call(),
            record.endorsements.len()
        );
    }

    Ok(records)
}

fn describe_status(status: &RecordStatus) -> String {
    match status {
        RecordStatus::Pending => "pending".to_string(),
        RecordStatus::Executed { receipt } => format!(
            "executed {} ({})",
            receipt.receipt_id,
            receipt.executed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        RecordStatus::Failed { reason } => format!("failed: {}", reason),
    }
}
