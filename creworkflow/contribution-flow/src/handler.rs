use ethers::types::Address;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::collaborators::Collaborators;
use crate::errors::FlowError;
use crate::models::{
    ContributionPatch, DriveInfo, ReceiptSummary, RefineRequest, RegistrationOutcome, Step,
    UploadResult, UserInfo,
};
use crate::receipt::extract_file_id_from;
use crate::state::{FlowEvent, FlowRun, FlowSnapshot, FlowState};

/// Message every contributor signs; the signature doubles as the data encryption key.
pub const SIGN_MESSAGE: &str = "Please sign to retrieve your encryption key";

/// When `tee_proof_data` lands in the contribution record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProofDataMerge {
    /// Merged as soon as the process-proof step starts, and kept if refinement fails.
    #[default]
    Eager,
    /// Merged only after refinement succeeds.
    OnRefinementSuccess,
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub sign_message: String,
    pub proof_data_merge: ProofDataMerge,
    /// Only `FileAdded` logs from this contract are trusted when set.
    pub registry_address: Option<Address>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            sign_message: SIGN_MESSAGE.to_string(),
            proof_data_merge: ProofDataMerge::default(),
            registry_address: None,
        }
    }
}

struct Registration {
    file_id: u64,
    encrypted_key: String,
}

pub struct ContributionFlow {
    config: FlowConfig,
    collaborators: Collaborators,
    state: FlowState,
}

impl ContributionFlow {
    pub fn new(collaborators: Collaborators, config: FlowConfig) -> Self {
        Self {
            config,
            collaborators,
            state: FlowState::new(),
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<FlowSnapshot> {
        self.state.subscribe_snapshots()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.state.subscribe_events()
    }

    pub fn is_busy(&self) -> bool {
        self.state.snapshot().is_busy()
    }

    /// Drops all progress so a fresh run can start from step zero. A run still in
    /// flight is superseded: its later writes are discarded and it stops at the next step.
    pub fn reset_flow(&self) {
        info!("contribution flow reset");
        self.state.reset();
    }

    /// Runs sign, upload, registration, proof, refinement and reward claim in order,
    /// stopping at the first failure. Progress is published through the state channels;
    /// the returned snapshot is the state at the end of the run.
    pub async fn run_contribution(
        &self,
        user_info: Option<&UserInfo>,
        drive_info: &DriveInfo,
        is_wallet_connected: bool,
    ) -> FlowSnapshot {
        let current = self.state.snapshot();
        if current.phase.is_terminal() {
            warn!(phase = ?current.phase, "contribution run ignored; reset the flow first");
            return current;
        }

        let run = self.state.run();
        let Some(user_info) = user_info else {
            error!("contribution run without user info");
            run.fail(FlowError::MissingUserInfo.user_message());
            return self.state.snapshot();
        };

        info!(wallet_connected = is_wallet_connected, "contribution run started");
        run.begin();

        match self.execute(run, user_info, drive_info, is_wallet_connected).await {
            Ok(()) => {
                info!("contribution run completed");
                run.succeed();
            }
            Err(FlowError::Superseded) => {
                warn!("contribution run abandoned after reset");
            }
            Err(err) => {
                let snapshot = self.state.snapshot();
                error!(
                    reason = %err,
                    current_step = snapshot.current_step,
                    completed_steps = ?snapshot.completed_steps,
                    "contribution run failed"
                );
                run.fail(err.user_message());
            }
        }
        self.state.snapshot()
    }

    async fn execute(
        &self,
        run: FlowRun<'_>,
        user_info: &UserInfo,
        drive_info: &DriveInfo,
        is_wallet_connected: bool,
    ) -> Result<(), FlowError> {
        let signature = self.sign().await?;
        let upload = self.upload(run, user_info, &signature, drive_info).await?;

        // signing works without a connected wallet session, registration does not
        if !is_wallet_connected {
            return Err(FlowError::WalletNotConnected);
        }

        let registration = self.register(run, &upload, &signature).await?;
        self.prove_refine_and_claim(run, &registration, &signature).await
    }

    async fn sign(&self) -> Result<String, FlowError> {
        let signature = self
            .collaborators
            .signer
            .sign_message(&self.config.sign_message)
            .await
            .map_err(|e| {
                warn!(error = %e, "message signing rejected");
                FlowError::SigningFailed
            })?;
        if signature.trim().is_empty() {
            warn!("signer returned an empty signature");
            return Err(FlowError::SigningFailed);
        }
        Ok(signature)
    }

    async fn upload(
        &self,
        run: FlowRun<'_>,
        user_info: &UserInfo,
        signature: &str,
        drive_info: &DriveInfo,
    ) -> Result<UploadResult, FlowError> {
        self.start(run, Step::Upload)?;
        let uploaded = self
            .collaborators
            .uploader
            .upload(user_info, signature, drive_info)
            .await
            .map_err(FlowError::collaborator)?
            .ok_or(FlowError::UploadFailed)?;

        run.set_share_url(&uploaded.download_url);
        self.complete(run, Step::Upload);
        Ok(uploaded)
    }

    async fn register(
        &self,
        run: FlowRun<'_>,
        upload: &UploadResult,
        signature: &str,
    ) -> Result<Registration, FlowError> {
        self.start(run, Step::BlockchainRegistration)?;
        let registry = &self.collaborators.registry;

        let public_key = registry
            .public_key()
            .await
            .map_err(FlowError::collaborator)?;
        let encrypted_key = self
            .collaborators
            .encryptor
            .encrypt(signature, &public_key)
            .map_err(FlowError::collaborator)?;

        let receipt = match registry
            .add_file(&upload.download_url, &encrypted_key)
            .await
            .map_err(FlowError::collaborator)?
        {
            RegistrationOutcome::Registered(receipt) => receipt,
            RegistrationOutcome::Rejected { contract_error } => {
                return Err(match contract_error.filter(|e| !e.trim().is_empty()) {
                    Some(e) => FlowError::Contract(e),
                    None => FlowError::RegistrationFailed,
                });
            }
        };

        let file_id = extract_file_id_from(&receipt, self.config.registry_address)
            .ok_or(FlowError::MissingFileId)?;
        info!(
            file_id,
            tx_hash = %receipt.transaction_hash,
            block_number = ?receipt.block_number,
            "file registered on chain"
        );

        run.merge_data(ContributionPatch {
            contribution_id: Some(upload.vana_file_id.clone()),
            encrypted_url: Some(upload.download_url.clone()),
            transaction_receipt: Some(ReceiptSummary {
                hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            }),
            file_id: Some(file_id),
            ..Default::default()
        });
        self.complete(run, Step::BlockchainRegistration);

        Ok(Registration {
            file_id,
            encrypted_key,
        })
    }

    /// Steps 3 to 5 share one failure boundary; merges already applied are kept.
    async fn prove_refine_and_claim(
        &self,
        run: FlowRun<'_>,
        registration: &Registration,
        signature: &str,
    ) -> Result<(), FlowError> {
        let c = &self.collaborators;

        self.start(run, Step::RequestTeeProof)?;
        let proof = c
            .prover
            .request_contribution_proof(
                registration.file_id,
                &registration.encrypted_key,
                signature,
            )
            .await
            .map_err(FlowError::ProofStage)?;
        info!(job_id = %proof.job_id, file_id = proof.file_id, "tee proof requested");
        run.merge_data(ContributionPatch {
            tee_job_id: Some(proof.job_id.clone()),
            ..Default::default()
        });
        self.complete(run, Step::RequestTeeProof);

        self.start(run, Step::ProcessProof)?;
        let proof_patch = ContributionPatch {
            tee_proof_data: Some(proof.proof_data.clone()),
            ..Default::default()
        };
        if self.config.proof_data_merge == ProofDataMerge::Eager {
            run.merge_data(proof_patch.clone());
        }
        let refined = c
            .refiner
            .refine(RefineRequest {
                file_id: proof.file_id,
                encryption_key: signature.to_string(),
                refiner_id: None,
            })
            .await
            .map_err(|e| {
                error!(error = %e, file_id = proof.file_id, "data refinement failed");
                FlowError::ProofStage(e)
            })?;
        info!(
            job_id = refined.job_id.as_deref().unwrap_or("-"),
            polled = refined.polled,
            "data refinement completed"
        );
        if self.config.proof_data_merge == ProofDataMerge::OnRefinementSuccess {
            run.merge_data(proof_patch);
        }
        self.complete(run, Step::ProcessProof);

        self.start(run, Step::ClaimReward)?;
        let reward = c
            .rewards
            .request_reward(registration.file_id)
            .await
            .map_err(FlowError::ProofStage)?;
        let reward_tx_hash = reward.and_then(|r| r.transaction_hash);
        if reward_tx_hash.is_none() {
            warn!(file_id = registration.file_id, "reward claim returned no transaction hash");
        }
        run.merge_data(ContributionPatch {
            reward_tx_hash,
            ..Default::default()
        });
        self.complete(run, Step::ClaimReward);
        Ok(())
    }

    /// Fails with [`FlowError::Superseded`] once a reset has replaced this run.
    fn start(&self, run: FlowRun<'_>, step: Step) -> Result<(), FlowError> {
        if !run.start_step(step) {
            return Err(FlowError::Superseded);
        }
        info!(step = step.label(), number = step.number(), "contribution step started");
        Ok(())
    }

    fn complete(&self, run: FlowRun<'_>, step: Step) {
        if run.complete_step(step) {
            info!(step = step.label(), number = step.number(), "contribution step completed");
        }
    }
}
