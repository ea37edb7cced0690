use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};

use crate::collaborators::MessageSigner;

/// Signs EIP-191 personal messages with a locally held key.
#[derive(Debug, Clone)]
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    pub fn from_private_key(private_key: &str) -> Result<Self, String> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| format!("invalid private key: {e}"))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> String {
        format!("0x{}", hex::encode(self.wallet.address().as_bytes()))
    }
}

#[async_trait]
impl MessageSigner for LocalKeySigner {
    async fn sign_message(&self, message: &str) -> Result<String, String> {
        let signature = self
            .wallet
            .sign_message(message)
            .await
            .map_err(|e| format!("message signing failed: {e}"))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}
