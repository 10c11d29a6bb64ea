//! Cryptographic primitives.
//!
//! - BLAKE3 for Merkle nodes and address derivation
//! - SHA-256 for header, genesis, and validator-set hashing
//! - Ed25519 for transaction and commit signatures
//!
//! Verification is deterministic with no randomization. The ledger and the
//! inter-chain plugin treat these as opaque "verify signature" operations.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::types::{Address, Hash};

/// Domain separator so an address can never collide with a Merkle node hash.
const ADDRESS_DOMAIN: &[u8] = b"hubchain/address";

pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    sha2::Sha256::digest(data).into()
}

/// Derive an account address from an Ed25519 public key.
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ADDRESS_DOMAIN);
    hasher.update(public_key);
    *hasher.finalize().as_bytes()
}

/// Verify an Ed25519 signature.
///
/// Returns `false` for malformed public keys as well as bad signatures.
pub fn verify_ed25519(message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    verifying_key.verify(message, &sig).is_ok()
}

/// Sign a message. Used by transaction builders and tests, never by the driver.
pub fn sign_ed25519(message: &[u8], signing_key: &SigningKey) -> [u8; 64] {
    signing_key.sign(message).to_bytes()
}

/// Generate an Ed25519 keypair from OS randomness.
pub fn generate_keypair() -> (VerifyingKey, SigningKey) {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    (signing_key.verifying_key(), signing_key)
}
