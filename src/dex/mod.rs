//! A3's own minimal DEX container reader (spec.md §1's "raw container
//! parser (DEX reader)" external collaborator — named but not specified
//! by the core; implemented here just far enough to drive C4–C7 end to
//! end from a real `.dex` input).

pub mod container;
pub mod leb128;
pub mod resolver;
