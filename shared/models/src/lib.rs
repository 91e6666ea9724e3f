//! # Chipline Domain Models
//!
//! Core types of the production board: the suppliers and stages that tag each
//! row, the canonical record every supplier layout is normalized into, and the
//! per-file extraction log.
//!
//! ## Key Models
//!
//! - **Supplier / Stage**: closed sets of subcontractors and supplier-scoped process stages
//! - **CanonicalField**: the full canonical column set, with the kind of coercion each field gets
//! - **CanonicalRecord**: one (lot, stage) observation; every field present, absent ones null
//! - **CanonicalTable**: concatenation of every supplier's records
//! - **ExtractionLog**: ordered success/error/skipped outcomes per source file

pub mod supplier;
pub mod record;
pub mod extraction;


pub use supplier::*;
pub use record::*;
pub use extraction::*;
