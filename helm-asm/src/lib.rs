//! The instruction set the Helm VM accepts and the bytecode container shapes
//! the compiler produces. The compiler is a pure producer of these values;
//! execution lives on the VM side.

mod instruction;
mod script;

pub use instruction::{Instr, ToConstInstr};
pub use script::{Method, StatefulContract, StatefulScript, StatelessScript};
