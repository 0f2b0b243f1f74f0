use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("present value must be a positive finite amount, got {0}")]
    InvalidPresentValue(f64),

    #[error("number of periods must be > 0, got {0}")]
    InvalidPeriods(u32),

    #[error("{field} must be a finite number, got {value}")]
    InvalidRate { field: &'static str, value: f64 },

    #[error("withdrawal must be a positive finite amount, got {0}")]
    InvalidWithdrawal(f64),

    #[error("cost basis must be >= 0, got {0}")]
    InvalidCostBasis(f64),

    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: String, reason: String },
}

impl PlanError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
