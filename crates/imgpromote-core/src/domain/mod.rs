//! Domain types for image promotion.

pub mod error;
pub mod request;
pub mod result;

pub use error::{ExecError, PromoteError, Result, ValidationError};
pub use request::{ImageRef, PromotionRequest, PromotionStrategy};
pub use result::{JobStatus, PromotionResult, PromotionStatus, PromotionStep};
