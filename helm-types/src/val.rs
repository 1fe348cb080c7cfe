use crate::{Type, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn zero() -> Self {
        Address([0u8; 32])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", hex::encode(self.0))
    }
}

/// A primitive runtime value. Every value knows its primitive type; composite
/// values (arrays) exist only as flattened runs of primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Val {
    Bool(bool),
    I256(I256),
    U256(U256),
    ByteVec(Vec<u8>),
    Address(Address),
}

impl Val {
    pub fn tpe(&self) -> Type {
        match self {
            Val::Bool(_) => Type::Bool,
            Val::I256(_) => Type::I256,
            Val::U256(_) => Type::U256,
            Val::ByteVec(_) => Type::ByteVec,
            Val::Address(_) => Type::Address,
        }
    }

    pub fn u256(value: u64) -> Val {
        Val::U256(U256::from(value))
    }

    pub fn i256(value: i128) -> Val {
        Val::I256(I256::from_i128(value))
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Bool(b) => write!(f, "{}", b),
            Val::I256(n) => write!(f, "{}i", n),
            Val::U256(n) => write!(f, "{}u", n),
            Val::ByteVec(bytes) => write!(f, "#{}", hex::encode(bytes)),
            Val::Address(address) => write!(f, "{}", address),
        }
    }
}
