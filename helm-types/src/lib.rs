mod ident;
mod numeric;
mod types;
mod val;

pub use ident::{FuncId, Ident, TypeId};
pub use numeric::{ParseI256Error, I256, U256};
pub use types::{flattened_types_length, format_types, ContractKind, Type};
pub use val::{Address, Val};
