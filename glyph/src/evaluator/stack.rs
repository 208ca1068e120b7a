//! Native stack headroom for recursive evaluation
//!
//! Each Glyph call nests several Rust frames, so a handler recursing up to
//! `max_call_depth` can outgrow a small thread stack (tokio blocking workers get
//! 2 MB) before the depth check fires. Recursion points run through
//! [`ensure_sufficient_stack`], which moves onto a fresh heap segment when the
//! remaining stack drops under the red zone.

/// Minimum stack left before growing
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
