//! # Hashing Utilities
//!
//! BLAKE3 is the only hash Vaultline uses. It derives three things:
//!
//! - **Mapping slots**: where an entry of a storage mapping lives.
//! - **Role identifiers**: so `"PAUSER"` is the same 32 bytes everywhere.
//! - **Dev addresses**: `Address::derive("alice")` for tests and devnets.
//!
//! Each use gets its own domain via BLAKE3's `derive_key` mode, so a role id
//! can never be mistaken for a storage slot even if the inputs coincide.

/// Domain for mapping-slot derivation.
pub const DOMAIN_MAPPING_SLOT: &str = "vaultline 2026 storage mapping slot";

/// Domain for role identifier derivation.
pub const DOMAIN_ROLE_ID: &str = "vaultline 2026 access control role";

/// Domain for deterministic development addresses.
pub const DOMAIN_DEV_ADDRESS: &str = "vaultline 2026 dev address";

/// Compute the plain BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash `data` under a domain-separation context.
///
/// Uses BLAKE3's `derive_key` mode rather than a manual prefix. Two calls
/// with different contexts never collide, whatever the data.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash several byte slices under one domain without concatenating them.
pub fn domain_separated_hash_multi(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
