use ethers::types::Log;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Upload target descriptor. Passed through to the uploader untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DriveInfo {
    pub access_token: Option<String>,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub extra: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UploadResult {
    pub vana_file_id: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Registered(RegistrationReceipt),
    /// No receipt came back. `contract_error` carries the revert reason when the registry surfaced one.
    Rejected { contract_error: Option<String> },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProofResult {
    pub job_id: String,
    pub file_id: u64,
    pub proof_data: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RefineRequest {
    pub file_id: u64,
    pub encryption_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refiner_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    pub body: Value,
    pub job_id: Option<String>,
    pub polled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RewardResult {
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContributionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_receipt: Option<ReceiptSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tee_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tee_proof_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_tx_hash: Option<String>,
}

/// Partial update for [`ContributionData`]. Present fields overlay, absent fields are left alone.
pub type ContributionPatch = ContributionData;

impl ContributionData {
    pub fn merge(&mut self, patch: ContributionPatch) {
        fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        overlay(&mut self.contribution_id, patch.contribution_id);
        overlay(&mut self.encrypted_url, patch.encrypted_url);
        overlay(&mut self.transaction_receipt, patch.transaction_receipt);
        overlay(&mut self.file_id, patch.file_id);
        overlay(&mut self.tee_job_id, patch.tee_job_id);
        overlay(&mut self.tee_proof_data, patch.tee_proof_data);
        overlay(&mut self.reward_tx_hash, patch.reward_tx_hash);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    BlockchainRegistration,
    RequestTeeProof,
    ProcessProof,
    ClaimReward,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Upload,
        Step::BlockchainRegistration,
        Step::RequestTeeProof,
        Step::ProcessProof,
        Step::ClaimReward,
    ];

    /// 1-based position shown in progress UIs. `0` is reserved for "not started".
    pub fn number(self) -> u8 {
        match self {
            Step::Upload => 1,
            Step::BlockchainRegistration => 2,
            Step::RequestTeeProof => 3,
            Step::ProcessProof => 4,
            Step::ClaimReward => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Upload => "upload_data",
            Step::BlockchainRegistration => "blockchain_registration",
            Step::RequestTeeProof => "request_tee_proof",
            Step::ProcessProof => "process_proof",
            Step::ClaimReward => "claim_reward",
        }
    }
}
