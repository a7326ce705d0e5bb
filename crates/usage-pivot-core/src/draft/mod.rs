//! Draft assembly and loading.
//!
//! Pipeline: UsageReport + FeatureGates → DraftAssembler → UsageDraft
//! → (store) → DraftLoader → UsageReport

mod assembler;
mod fingerprint;
mod loader;

pub use assembler::*;
pub use fingerprint::*;
pub use loader::*;
