/// Resource limits to keep parsing and evaluation bounded
///
/// Evaluation has no cancellation of its own; these limits are what stop a runaway
/// handler body or a pathological source file.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum source file size in bytes
    /// Real usage: ~10KB, Limit: 5MB
    pub max_file_size_bytes: usize,

    /// Maximum expression nesting depth accepted by the parser
    /// Real usage: ~5 levels, Limit: 100
    pub max_expression_depth: usize,

    /// Maximum depth of nested function calls
    /// Real usage: ~10 frames, Limit: 256
    pub max_call_depth: usize,

    /// Maximum iterations of a single `while` or `for` loop
    pub max_loop_iterations: u64,

    /// Maximum wall-clock time for one top-level execution, in milliseconds
    /// Real usage: ~1ms per handler, Limit: 1000ms
    pub max_evaluation_time_ms: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024, // 5 MB
            max_expression_depth: 100,
            max_call_depth: 256,
            max_loop_iterations: 1_000_000,
            max_evaluation_time_ms: 1000, // 1 second
        }
    }
}

impl ResourceLimits {
    /// Create a new ResourceLimits with default values
    pub fn new() -> Self {
        Self::default()
    }
}
