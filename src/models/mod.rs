//! Data models
//!
//! Database entities, request bodies with their validation rules, and the
//! pagination types shared by list endpoints.

mod auth;
mod blog;
mod feedback;
mod pagination;
mod prediction;
mod user;
pub mod validation;

pub use auth::{
    EmailInput, LoginInput, Otp, OtpPurpose, RefreshToken, RefreshTokenInput, ResetPasswordInput,
    VerifyEmailInput, VerifyResetOtpInput,
};
pub use blog::{Blog, BlogWithAuthor, CreateBlogInput, UpdateBlogInput};
pub use feedback::{Feedback, FeedbackInput, FeedbackWithUser};
pub use pagination::{ListParams, PagedResult, Pagination, DEFAULT_LIMIT, MAX_LIMIT};
pub use prediction::{
    ModelPrediction, MultiModelPredictionOutput, PredictionHistory, PredictionHistoryItem,
    PredictionHistoryPage, PredictionInput,
};
pub use user::{AuthorSummary, SignupInput, UpdateUserInput, User, DEFAULT_ROLE};
pub use validation::{FieldError, Validate, ValidationErrors};

#[cfg(test)]
pub(crate) use prediction::{sample_input, sample_output};
