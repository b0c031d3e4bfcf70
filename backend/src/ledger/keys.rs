//! Address and seed encoding plus ed25519 signing keys.
//!
//! Addresses are strkey-encoded: base32 of a version byte, the 32-byte
//! ed25519 key, and a CRC16-XModem checksum. Public addresses start with `G`
//! and secret seeds with `S`; both are exactly 56 characters.

use super::LedgerError;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

/// Version byte for public account addresses (`G...`).
pub const VERSION_ACCOUNT: u8 = 0x30;

/// Version byte for secret seeds (`S...`).
pub const VERSION_SEED: u8 = 0x90;

/// Encoded strkey length in characters.
pub const STRKEY_LEN: usize = 56;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for c in encoded.bytes() {
        let index = BASE32_ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | index;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}

/// Encode a 32-byte key under the given version byte.
pub fn encode_strkey(version: u8, key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(version);
    payload.extend_from_slice(key);

    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());

    base32_encode(&payload)
}

/// Decode a strkey, checking length, version byte, and checksum.
pub fn decode_strkey(version: u8, encoded: &str) -> Option<[u8; 32]> {
    if encoded.len() != STRKEY_LEN {
        return None;
    }

    let raw = base32_decode(encoded)?;
    if raw.len() != 35 || raw[0] != version {
        return None;
    }

    let (payload, checksum) = raw.split_at(33);
    if crc16_xmodem(payload).to_le_bytes() != checksum {
        return None;
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&payload[1..]);
    Some(key)
}

/// Structural validity check for a public address. Used by the settlement
/// path to filter payees before building a transaction.
pub fn is_valid_address(address: &str) -> bool {
    decode_strkey(VERSION_ACCOUNT, address).is_some()
}

/// An ed25519 signing keypair.
///
/// The secret seed never leaves the holding process; only the derived public
/// address travels.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Parse a keypair from a strkey secret seed (`S...`).
    pub fn from_secret(seed: &str) -> Result<Self, LedgerError> {
        let bytes = decode_strkey(VERSION_SEED, seed).ok_or(LedgerError::InvalidKey)?;
        Ok(Self {
            signing: SigningKey::from_bytes(&bytes),
        })
    }

    /// Generate a fresh keypair from OS randomness.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public_address(&self) -> String {
        encode_strkey(VERSION_ACCOUNT, &self.signing.verifying_key().to_bytes())
    }

    pub fn secret_seed(&self) -> String {
        encode_strkey(VERSION_SEED, &self.signing.to_bytes())
    }

    /// Hex encoding of the raw verifying key, carried in envelope signatures.
    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing.sign(payload).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_address", &self.public_address())
            .finish()
    }
}
