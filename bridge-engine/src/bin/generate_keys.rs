//! Validator Key Generation Utility
//!
//! Generates an Ed25519 key pair for a bridge validator.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin generate_keys
//! ```
//!
//! The public key goes into the validator's entry under `[[bridges.validators]]`.
//! The private key stays out of config files: export it in the environment
//! variable named by `service.validator.private_key_env`.

use bridge_engine::crypto::generate_keypair;

fn main() {
    let (private_key_b64, public_key_b64) = generate_keypair();

    println!("Generated Ed25519 Key Pair:");
    println!("Private Key (base64): {}", private_key_b64);
    println!("Public Key (base64): {}", public_key_b64);
    println!();
    println!("Register the public key with the bridge, then export the private key:");
    println!("  export BRIDGE_VALIDATOR_PRIVATE_KEY={}", private_key_b64);
}
