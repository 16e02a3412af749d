/// Router Module Index
///
/// Splits the surface by access: anonymous reads and edit gates on one side, the copy
/// route (which needs a resolved member) on the other.

/// Routes open to anonymous callers. Every read goes through the visibility gate.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;
