use helm_error::{CompileError, CompileResult};

/// Options recognised by the compiler. Passed by reference into every
/// compilation entry point; the compiler itself never mutates it.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Upper bound on the iteration count of an unrolled loop.
    pub loop_unrolling_limit: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            loop_unrolling_limit: usize::MAX,
        }
    }
}

impl CompilerConfig {
    pub fn new(loop_unrolling_limit: usize) -> CompileResult<Self> {
        if loop_unrolling_limit == 0 {
            return Err(CompileError::InvalidCompilerOption {
                name: "loop_unrolling_limit",
                value: loop_unrolling_limit.to_string(),
            });
        }
        Ok(CompilerConfig {
            loop_unrolling_limit,
        })
    }
}
