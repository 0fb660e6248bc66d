use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use num_bigint::{BigInt, BigUint};
use regex::Regex;
use serde_json::Value;

use crate::error::OeisError;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"A\d+").expect("reference pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(u64);

impl SequenceId {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u64 {
        self.0
    }

    pub fn name(&self) -> String {
        format!("A{:06}", self.0)
    }

    pub fn short_name(&self) -> String {
        format!("A{}", self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{:06}", self.0)
    }
}

impl FromStr for SequenceId {
    type Err = OeisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let digits = normalized.strip_prefix('A').unwrap_or(&normalized);
        let is_valid = !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(OeisError::InvalidIdentifier(value.to_string()));
        }
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| OeisError::InvalidIdentifier(value.to_string()))
    }
}

pub trait SequenceKey {
    fn sequence_id(&self) -> Result<SequenceId, OeisError>;
}

impl<K: SequenceKey + ?Sized> SequenceKey for &K {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        (**self).sequence_id()
    }
}

impl<K: SequenceKey + ?Sized> SequenceKey for Arc<K> {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        (**self).sequence_id()
    }
}

impl SequenceKey for SequenceId {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        Ok(*self)
    }
}

impl SequenceKey for str {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        self.parse()
    }
}

impl SequenceKey for String {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        self.parse()
    }
}

macro_rules! integer_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SequenceKey for $ty {
                fn sequence_id(&self) -> Result<SequenceId, OeisError> {
                    u64::try_from(*self)
                        .map(SequenceId)
                        .map_err(|_| OeisError::InvalidIdentifier(self.to_string()))
                }
            }
        )*
    };
}

integer_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl SequenceKey for BigInt {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        u64::try_from(self)
            .map(SequenceId)
            .map_err(|_| OeisError::InvalidIdentifier(self.to_string()))
    }
}

impl SequenceKey for BigUint {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        u64::try_from(self)
            .map(SequenceId)
            .map_err(|_| OeisError::InvalidIdentifier(self.to_string()))
    }
}

impl SequenceKey for Value {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        match self {
            Value::Number(number) => number
                .as_u64()
                .map(SequenceId)
                .ok_or_else(|| OeisError::InvalidIdentifier(number.to_string())),
            Value::String(text) => text.parse(),
            other => Err(OeisError::InvalidIdentifier(other.to_string())),
        }
    }
}

pub fn name<K: SequenceKey>(key: K) -> Result<String, OeisError> {
    key.sequence_id().map(|id| id.name())
}

pub fn number<K: SequenceKey>(key: K) -> Result<u64, OeisError> {
    key.sequence_id().map(|id| id.number())
}

pub fn find_references(text: &str) -> Vec<String> {
    REFERENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
