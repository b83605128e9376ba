//! Minimal contract ABI support: selectors from ABI JSON, static call encoding
//! and `uint256` result decoding.

use crate::error::ApiError;
use crate::Result;
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AbiEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
}

#[derive(Debug, Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Vec<AbiParam>,
}

/// Either a bare ABI array or a build artifact with an `abi` field
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AbiDocument {
    Bare(Vec<AbiEntry>),
    Artifact { abi: Vec<AbiEntry> },
}

impl AbiParam {
    fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> =
                    self.components.iter().map(AbiParam::canonical_type).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.kind.clone(),
        }
    }
}

/// Function selectors of one contract, keyed by function name
#[derive(Debug, Clone)]
pub struct ContractAbi {
    name: String,
    functions: HashMap<String, [u8; 4]>,
}

impl ContractAbi {
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let entries = match serde_json::from_str::<AbiDocument>(json)? {
            AbiDocument::Bare(entries) => entries,
            AbiDocument::Artifact { abi } => abi,
        };

        let mut functions = HashMap::new();
        for entry in entries.iter().filter(|e| e.kind == "function") {
            let types: Vec<String> = entry.inputs.iter().map(AbiParam::canonical_type).collect();
            let signature = format!("{}({})", entry.name, types.join(","));
            // First overload wins
            functions
                .entry(entry.name.clone())
                .or_insert_with(|| selector(&signature));
        }

        Ok(Self {
            name: name.to_string(),
            functions,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to load ABI {}: {}", path.display(), e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("contract");
        Self::from_json(name, &json)
    }

    pub fn selector(&self, function: &str) -> Result<[u8; 4]> {
        self.functions.get(function).copied().ok_or_else(|| {
            format!("function `{}` not found in ABI {}", function, self.name).into()
        })
    }
}

/// First four bytes of keccak-256 over the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Static ABI argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address([u8; 20]),
    Uint(u128),
}

impl Token {
    fn encode_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(addr) => word[12..].copy_from_slice(addr),
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        }
        word
    }
}

pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(&arg.encode_word());
    }
    data
}

/// Decode a single `uint256` return value, saturating at `u128::MAX`
/// (unlimited approvals are `2^256 - 1`)
pub fn decode_uint(hex_data: &str) -> Result<u128> {
    let bytes = hex::decode(hex_data.trim_start_matches("0x"))?;
    if bytes.len() < 32 {
        return Err(ApiError::InvalidResponse(format!(
            "expected a 32-byte word, got {} bytes",
            bytes.len()
        ))
        .into());
    }

    let word = &bytes[..32];
    if word[..16].iter().any(|b| *b != 0) {
        return Ok(u128::MAX);
    }

    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}
