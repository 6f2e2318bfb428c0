//! Study configuration.

pub mod traits;

pub use traits::AgreementTraits;
