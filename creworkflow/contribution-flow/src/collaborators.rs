//! Capability traits for the external services a contribution run talks to.
//!
//! Every trait is object safe so a [`Collaborators`] bundle can hold
//! `Arc<dyn ...>` handles, and tests can swap in stubs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::crypto::Secp256k1Encryptor;
use crate::models::{
    DriveInfo, ProofResult, RefineOutcome, RefineRequest, RegistrationOutcome, RewardResult,
    UploadResult, UserInfo,
};

#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign_message(&self, message: &str) -> Result<String, String>;
}

#[async_trait]
pub trait DataUploader: Send + Sync {
    /// `Ok(None)` means the upload produced nothing usable.
    async fn upload(
        &self,
        user_info: &UserInfo,
        signature: &str,
        drive_info: &DriveInfo,
    ) -> Result<Option<UploadResult>, String>;
}

#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Network-wide public key that refinement keys are encrypted to.
    async fn public_key(&self) -> Result<String, String>;

    async fn add_file(&self, url: &str, encrypted_key: &str)
    -> Result<RegistrationOutcome, String>;
}

pub trait KeyEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str, public_key: &str) -> Result<String, String>;
}

#[async_trait]
pub trait ProofRequester: Send + Sync {
    async fn request_contribution_proof(
        &self,
        file_id: u64,
        encrypted_key: &str,
        signature: &str,
    ) -> Result<ProofResult, String>;
}

#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, request: RefineRequest) -> Result<RefineOutcome, String>;
}

#[async_trait]
pub trait RewardClaimer: Send + Sync {
    async fn request_reward(&self, file_id: u64) -> Result<Option<RewardResult>, String>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub signer: Arc<dyn MessageSigner>,
    pub uploader: Arc<dyn DataUploader>,
    pub registry: Arc<dyn FileRegistry>,
    pub encryptor: Arc<dyn KeyEncryptor>,
    pub prover: Arc<dyn ProofRequester>,
    pub refiner: Arc<dyn Refiner>,
    pub rewards: Arc<dyn RewardClaimer>,
}

impl Collaborators {
    /// Bundles the remote services with the default secp256k1 key encryptor.
    pub fn new(
        signer: Arc<dyn MessageSigner>,
        uploader: Arc<dyn DataUploader>,
        registry: Arc<dyn FileRegistry>,
        prover: Arc<dyn ProofRequester>,
        refiner: Arc<dyn Refiner>,
        rewards: Arc<dyn RewardClaimer>,
    ) -> Self {
        Self {
            signer,
            uploader,
            registry,
            encryptor: Arc::new(Secp256k1Encryptor),
            prover,
            refiner,
            rewards,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn KeyEncryptor>) -> Self {
        self.encryptor = encryptor;
        self
    }
}
