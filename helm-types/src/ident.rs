use serde::{Deserialize, Serialize};
use std::fmt;

/// A value-level name: variables, fields, constants, event fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ident(pub String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Ident(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-level name: contracts, scripts, interfaces, events, enums.
/// Lives in a separate namespace from [Ident].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub String);

impl TypeId {
    pub fn new(name: impl Into<String>) -> Self {
        TypeId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A function name. Built-in functions carry a marker and render with a
/// trailing `!` so user-defined names can never collide with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId {
    pub name: String,
    pub is_built_in: bool,
}

impl FuncId {
    pub fn new(name: impl Into<String>) -> Self {
        FuncId {
            name: name.into(),
            is_built_in: false,
        }
    }

    pub fn built_in(name: impl Into<String>) -> Self {
        FuncId {
            name: name.into(),
            is_built_in: true,
        }
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_built_in {
            write!(f, "{}!", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_func_ids_render_with_bang() {
        assert_eq!(FuncId::new("transfer").to_string(), "transfer");
        assert_eq!(FuncId::built_in("checkPermission").to_string(), "checkPermission!");
    }

    #[test]
    fn ident_and_type_id_are_distinct_namespaces() {
        // Same spelling, different types; the compiler keys them separately.
        let value_name = Ident::new("Counter");
        let type_name = TypeId::new("Counter");
        assert_eq!(value_name.as_str(), type_name.as_str());
    }
}
