/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Keypair`] type as an object used to sign messages and access the
//! public key, plus the derivation of the node's wallet address from its public key.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use super::basic::{PublicKeyBytes, SignatureBytes, WalletAddress};

/// A wrapper around [`SigningKey`](ed25519_dalek::SigningKey) which implements convenience
/// methods for creating signatures and deriving the node's wallet address.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Convenience method for creating signatures over values or messages represented as
    /// vectors of bytes.
    pub(crate) fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }

    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }

    pub(crate) fn public_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes::new(self.0.verifying_key().to_bytes())
    }

    /// The wallet address owned by this keypair: the Base64 encoding of the SHA256 hash of
    /// the public key.
    pub fn wallet_address(&self) -> WalletAddress {
        wallet_address_of(&self.0.verifying_key())
    }
}

/// Derive the wallet address owned by a public key.
pub fn wallet_address_of(public_key: &VerifyingKey) -> WalletAddress {
    let hash = Sha256::digest(public_key.to_bytes());
    WalletAddress::new(STANDARD_NO_PAD.encode(hash))
}
