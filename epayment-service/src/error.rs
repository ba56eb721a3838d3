use axum::response::{IntoResponse, Response};
use common_crypto::CryptoError;
use common_http_errors::ApiError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::repo::StoreError;

/// Reasons a payment request is refused before anything is sent to the gateway.
/// Group numbers are 1-indexed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Merchant ID is not valid.")]
    MerchantId,
    #[error("Merchant Store ID is not valid.")]
    MerchantStoreId,
    #[error("Proxy Key is not valid.")]
    ProxyKey,
    #[error("Payment Amount is less than 0.01.")]
    AmountTooSmall,
    #[error("Payment Amount is greater than 99999.99.")]
    AmountTooLarge,
    #[error("Payment Request Number length incorrect, currently has length of {0}.")]
    RequestNumberLength(usize),
    #[error("Ledger ID [{0}] provided is not valid.")]
    LedgerId(usize),
    #[error("Revenue Category ID [{0}] provided is not valid.")]
    RevenueCategoryId(usize),
    #[error("Fund ID [{0}] provided is not valid.")]
    FundId(usize),
    #[error("Function ID [{0}] provided is not valid.")]
    FunctionId(usize),
    #[error("Cost Centre ID [{0}] provided is not valid.")]
    CostCentreId(usize),
    #[error("Program ID [{0}] provided is not valid.")]
    ProgramId(usize),
    #[error("Project ID [{0}] provided is not valid.")]
    ProjectId(usize),
    #[error("Program ID and Project ID for Workday Override group [{0}] are mutually exclusive and cannot be provided at the same time.")]
    ProgramAndProject(usize),
}

#[derive(Debug, Error)]
pub enum UpayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Parameter {0} is missing.")]
    MissingParameter(&'static str),
    #[error("Request body could not be parsed.")]
    MalformedBody,
    #[error("Unable to locate the entry based on payment_request_number.")]
    EntryNotFound,
    #[error("The form is not a payment form.")]
    NotPaymentForm,
    #[error("Merchant Update Secret does not match.")]
    SecretMismatch,
    #[error("Unexpected payment status value.")]
    UnexpectedStatus,
    #[error("You do not have permission to view this page.")]
    RedirectForbidden,
    #[error("Unknown redirect `{0}`.")]
    UnknownRedirect(String),
    #[error("Form {0} does not exist.")]
    UnknownForm(i64),
    #[error("Entry {0} does not exist.")]
    UnknownEntry(i64),
    #[error("Entry {entry_id} does not belong to form {form_id}.")]
    FormMismatch { form_id: i64, entry_id: i64 },
    #[error("Payment {payment_request_number} is not awaiting payment (status {status}).")]
    PaymentNotPending { payment_request_number: String, status: &'static str },
    #[error("Entry {0} has no payment amount on record.")]
    AmountMissing(i64),
    #[error("Form {0} has no usable default confirmation.")]
    ConfirmationMisconfigured(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl UpayError {
    /// Stable identifier used for the error envelope and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            UpayError::Validation(_) => "validation_failed",
            UpayError::MissingParameter(_) => "missing_parameter",
            UpayError::MalformedBody => "malformed_body",
            UpayError::EntryNotFound => "entry_not_found",
            UpayError::NotPaymentForm => "not_payment_form",
            UpayError::SecretMismatch => "secret_mismatch",
            UpayError::UnexpectedStatus => "unexpected_status",
            UpayError::RedirectForbidden => "forbidden",
            UpayError::UnknownRedirect(_) => "unknown_redirect",
            UpayError::UnknownForm(_) => "form_not_found",
            UpayError::UnknownEntry(_) => "entry_missing",
            UpayError::ConfirmationMisconfigured(_) => "confirmation_misconfigured",
            UpayError::FormMismatch { .. } => "form_mismatch",
            UpayError::PaymentNotPending { .. } => "payment_not_pending",
            UpayError::AmountMissing(_) => "amount_missing",
            UpayError::Store(_) | UpayError::Crypto(_) => "internal_error",
            UpayError::Gateway(_) => "gateway_unavailable",
        }
    }
}

impl From<UpayError> for ApiError {
    fn from(err: UpayError) -> Self {
        let code = err.code();
        let message = Some(err.to_string());
        match err {
            UpayError::Validation(_)
            | UpayError::MissingParameter(_)
            | UpayError::MalformedBody
            | UpayError::UnexpectedStatus
            | UpayError::FormMismatch { .. }
            | UpayError::PaymentNotPending { .. } => ApiError::BadRequest { code, trace_id: None, message },
            UpayError::SecretMismatch => ApiError::Unauthorized { code, trace_id: None, message },
            UpayError::RedirectForbidden => ApiError::Forbidden { trace_id: None, message },
            UpayError::UnknownRedirect(_) | UpayError::UnknownForm(_) | UpayError::UnknownEntry(_) => {
                ApiError::NotFound { code, trace_id: None }
            }
            UpayError::EntryNotFound
            | UpayError::NotPaymentForm
            | UpayError::ConfirmationMisconfigured(_)
            | UpayError::AmountMissing(_) => {
                ApiError::Server { code, trace_id: None, message }
            }
            UpayError::Gateway(_) => ApiError::BadGateway { code, trace_id: None, message },
            UpayError::Store(e) => ApiError::internal(e, None),
            UpayError::Crypto(e) => ApiError::internal(e, None),
        }
    }
}

impl IntoResponse for UpayError {
    fn into_response(self) -> Response {
        tracing::debug!(code = self.code(), error = %self, "request failed");
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn status_mapping() {
        let cases = [
            (UpayError::MissingParameter("paymentStatus"), StatusCode::BAD_REQUEST),
            (UpayError::UnexpectedStatus, StatusCode::BAD_REQUEST),
            (UpayError::Validation(ValidationError::ProxyKey), StatusCode::BAD_REQUEST),
            (UpayError::SecretMismatch, StatusCode::UNAUTHORIZED),
            (UpayError::RedirectForbidden, StatusCode::FORBIDDEN),
            (UpayError::UnknownRedirect("x".into()), StatusCode::NOT_FOUND),
            (UpayError::EntryNotFound, StatusCode::INTERNAL_SERVER_ERROR),
            (UpayError::NotPaymentForm, StatusCode::INTERNAL_SERVER_ERROR),
            (UpayError::FormMismatch { form_id: 5, entry_id: 14 }, StatusCode::BAD_REQUEST),
            (UpayError::AmountMissing(14), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn group_messages_are_one_indexed() {
        assert_eq!(ValidationError::LedgerId(1).to_string(), "Ledger ID [1] provided is not valid.");
        assert_eq!(
            ValidationError::RequestNumberLength(251).to_string(),
            "Payment Request Number length incorrect, currently has length of 251."
        );
    }
}
