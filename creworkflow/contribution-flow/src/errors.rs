use thiserror::Error;

/// Terminal failure of a contribution run. `Display` is the message shown to the contributor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Unable to access user information. Please try again.")]
    MissingUserInfo,

    #[error("Failed to sign the message. Please try again.")]
    SigningFailed,

    #[error("Failed to upload data to Google Drive")]
    UploadFailed,

    #[error("Wallet connection required to register on blockchain")]
    WalletNotConnected,

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Failed to add file to blockchain")]
    RegistrationFailed,

    #[error("File ID not found in transaction receipt")]
    MissingFileId,

    #[error("{0}")]
    Collaborator(String),

    #[error("{}", proof_stage_message(.0))]
    ProofStage(String),

    /// The run was reset while in flight.
    #[error("Contribution run was reset")]
    Superseded,
}

fn proof_stage_message(message: &str) -> &str {
    if message.trim().is_empty() {
        "Failed to process TEE proof or claim reward"
    } else {
        message
    }
}

impl FlowError {
    /// Errors raised by a collaborator outside the proof boundary keep their own message,
    /// falling back to the generic contribution failure text.
    pub fn collaborator(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::Collaborator("Failed to process your contribution. Please try again.".to_string())
        } else {
            Self::Collaborator(message)
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
