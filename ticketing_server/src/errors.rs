use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use ticketing_engine::{
    traits::{IssuanceError, PromoLedgerError, TicketingDatabaseError, ValidationError},
    CheckoutError,
    ReconcileError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Missing or invalid header: {0}")]
    MissingHeader(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request cannot be processed. {0}")]
    PreconditionFailed(String),
    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,
    #[error("{0}")]
    TicketAlreadyUsed(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MissingHeader(_) => StatusCode::BAD_REQUEST,
            Self::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::TicketAlreadyUsed(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<TicketingDatabaseError> for ServerError {
    fn from(e: TicketingDatabaseError) -> Self {
        match e {
            TicketingDatabaseError::OrderNotFound(_)
            | TicketingDatabaseError::CustomerNotFound(_)
            | TicketingDatabaseError::EventNotFound(_)
            | TicketingDatabaseError::TicketTypeNotFound(_) => Self::NoRecordFound(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::GatewayUnavailable => Self::GatewayUnavailable(e.to_string()),
            CheckoutError::DatabaseError(s) => Self::BackendError(s),
            e => Self::PreconditionFailed(e.to_string()),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconcileError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}

impl From<IssuanceError> for ServerError {
    fn from(e: IssuanceError) -> Self {
        match e {
            IssuanceError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            IssuanceError::DatabaseError(s) => Self::BackendError(s),
            e => Self::PreconditionFailed(e.to_string()),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::TicketNotFound(_) => Self::NoRecordFound(e.to_string()),
            ValidationError::AlreadyUsed { .. } => Self::TicketAlreadyUsed(e.to_string()),
            ValidationError::DatabaseError(s) => Self::BackendError(s),
            e => Self::PreconditionFailed(e.to_string()),
        }
    }
}

impl From<PromoLedgerError> for ServerError {
    fn from(e: PromoLedgerError) -> Self {
        match e {
            PromoLedgerError::PromoNotFound(_) | PromoLedgerError::PromoIdNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PromoLedgerError::DuplicateCode(_) => Self::PreconditionFailed(e.to_string()),
            PromoLedgerError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}
