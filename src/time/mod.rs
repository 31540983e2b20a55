//! Injectable clocks and the quantized feed boundary.

/// Wall-clock abstraction.
pub mod clock;
/// Stable timestamp computation and change tracking.
pub mod stable;
