//! Pool notes
//!
//! A note is the depositor's private claim on one pool entry:
//! ```text
//! commitment = Hc(secret, nonce)   inserted as a leaf
//! nullifier  = Hc(secret, index)   revealed once, at withdraw
//! ```
//!
//! Users MUST keep the saved note. Lost secrets = lost funds.

use std::fmt;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};

/// A note bound (eventually) to one leaf of the pool tree.
#[derive(Clone, PartialEq, Eq)]
pub struct Note {
    secret: FieldElement,
    nonce: FieldElement,
    token_address: String,
    /// Advisory: the pool's fixed denomination is authoritative
    amount: u128,
    commitment: FieldElement,
    index: Option<u64>,
}

/// Stable save format.
#[derive(Serialize, Deserialize)]
struct SavedNote {
    #[serde(with = "decimal_u128")]
    amount: u128,
    secret: FieldElement,
    nonce: FieldElement,
    #[serde(rename = "tokenAddress", alias = "token")]
    token_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<u64>,
}

impl Note {
    /// Fresh note with secret and nonce drawn from the OS RNG.
    pub fn new<H: PoolHasher>(hasher: &H, token_address: impl Into<String>, amount: u128) -> Result<Self> {
        let secret = FieldElement::random(&mut OsRng);
        let nonce = FieldElement::random(&mut OsRng);
        Self::from_parts(hasher, token_address, amount, secret, nonce)
    }

    /// Restore a note from existing secret material.
    pub fn from_parts<H: PoolHasher>(
        hasher: &H,
        token_address: impl Into<String>,
        amount: u128,
        secret: FieldElement,
        nonce: FieldElement,
    ) -> Result<Self> {
        let commitment = hasher.hash_commitment(&secret, &nonce)?;
        Ok(Self {
            secret,
            nonce,
            token_address: token_address.into(),
            amount,
            commitment,
            index: None,
        })
    }

    /// Bind the note to its leaf. One-time: a different index is refused.
    ///
    /// The caller must pass the index the tree actually assigned to this
    /// note's commitment.
    pub fn assign_index(&mut self, index: u64) -> Result<()> {
        match self.index {
            Some(assigned) if assigned != index => Err(PoolError::IndexAlreadyAssigned {
                assigned,
                requested: index,
            }),
            _ => {
                self.index = Some(index);
                Ok(())
            }
        }
    }

    /// Nullifier for the bound leaf.
    pub fn nullifier<H: PoolHasher>(&self, hasher: &H) -> Result<FieldElement> {
        let index = self.index.ok_or(PoolError::IndexUnassigned)?;
        hasher.hash_commitment(&self.secret, &FieldElement::from(index))
    }

    pub fn commitment(&self) -> FieldElement {
        self.commitment
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn secret(&self) -> FieldElement {
        self.secret
    }

    pub fn nonce(&self) -> FieldElement {
        self.nonce
    }

    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    pub fn amount(&self) -> u128 {
        self.amount
    }

    /// JSON save string: `{amount, secret, nonce, tokenAddress, index}`.
    pub fn to_save(&self) -> Result<String> {
        let saved = SavedNote {
            amount: self.amount,
            secret: self.secret,
            nonce: self.nonce,
            token_address: self.token_address.clone(),
            index: self.index,
        };
        Ok(serde_json::to_string(&saved)?)
    }

    /// Restore from a save string. The commitment is recomputed.
    pub fn from_save<H: PoolHasher>(hasher: &H, save: &str) -> Result<Self> {
        let saved: SavedNote = serde_json::from_str(save)?;
        let mut note = Self::from_parts(
            hasher,
            saved.token_address,
            saved.amount,
            saved.secret,
            saved.nonce,
        )?;
        note.index = saved.index;
        Ok(note)
    }

    /// Restore a note that must already be spendable.
    pub fn from_save_indexed<H: PoolHasher>(hasher: &H, save: &str) -> Result<Self> {
        let note = Self::from_save(hasher, save)?;
        if note.index.is_none() {
            return Err(PoolError::IndexUnassigned);
        }
        Ok(note)
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("token_address", &self.token_address)
            .field("amount", &self.amount)
            .field("commitment", &self.commitment)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// u128 amounts as decimal strings (token amounts overflow u64).
mod decimal_u128 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.trim().parse().map_err(de::Error::custom)
    }
}
