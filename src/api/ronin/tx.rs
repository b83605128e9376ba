//! Local wallet and EIP-155 legacy transaction signing

use crate::Result;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Parse a 20-byte address in `0x...` or `ronin:...` form
pub fn parse_address(address: &str) -> Result<[u8; 20]> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("ronin:")
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)?;
    let address: [u8; 20] = bytes
        .try_into()
        .map_err(|_| format!("address must be 20 bytes: {}", address))?;
    Ok(address)
}

pub fn format_address(address: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(address))
}

/// Signing key plus its derived address
#[derive(Clone)]
pub struct Wallet {
    key: SigningKey,
    address: [u8; 20],
}

impl Wallet {
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))?;
        let key = SigningKey::from_slice(&bytes)?;

        let point = key.verifying_key().as_affine().to_encoded_point(false);
        // Uncompressed SEC1 point: 0x04 || X || Y
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        Ok(Self { key, address })
    }

    pub fn address(&self) -> [u8; 20] {
        self.address
    }

    pub fn address_hex(&self) -> String {
        format_address(&self.address)
    }
}

// ============== RLP ==============

fn encode_length(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        return vec![offset + len as u8];
    }
    let len_bytes = trim_leading_zeros(&len.to_be_bytes()).to_vec();
    let mut out = vec![offset + 55 + len_bytes.len() as u8];
    out.extend_from_slice(&len_bytes);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

pub fn rlp_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return bytes.to_vec();
    }
    let mut out = encode_length(bytes.len(), 0x80);
    out.extend_from_slice(bytes);
    out
}

/// Integers are big-endian with no leading zeros; zero is the empty string
pub fn rlp_uint(value: u128) -> Vec<u8> {
    rlp_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

pub fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();
    let mut out = encode_length(payload.len(), 0xc0);
    out.extend_from_slice(&payload);
    out
}

// ============== Transactions ==============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp_uint(self.nonce as u128),
            rlp_uint(self.gas_price),
            rlp_uint(self.gas_limit as u128),
            rlp_bytes(&self.to),
            rlp_uint(self.value),
            rlp_bytes(&self.data),
        ]
    }

    /// keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut fields = self.base_fields();
        fields.push(rlp_uint(self.chain_id as u128));
        fields.push(rlp_uint(0));
        fields.push(rlp_uint(0));
        keccak256(&rlp_list(&fields))
    }

    /// Raw signed transaction ready for `eth_sendRawTransaction`
    pub fn sign(&self, wallet: &Wallet) -> Result<Vec<u8>> {
        let hash = self.signing_hash();
        let (signature, recovery_id) = wallet.key.sign_prehash_recoverable(&hash)?;
        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);

        let v = self.chain_id as u128 * 2 + 35 + recovery_id.to_byte() as u128;

        let mut fields = self.base_fields();
        fields.push(rlp_uint(v));
        fields.push(rlp_bytes(trim_leading_zeros(r)));
        fields.push(rlp_bytes(trim_leading_zeros(s)));
        Ok(rlp_list(&fields))
    }
}
