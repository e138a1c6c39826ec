use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    #[error("Invalid password")]
    BadPassword,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Device {0} is not authorized")]
    UnauthorizedDevice(String),
    #[error("Transport is not authenticated as a device")]
    UnauthorizedTransport,
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Invalid base64 payload in {field}")]
    InvalidEncoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("Invalid image: {0}")]
    InvalidImage(#[source] image::ImageError),
    #[error("No configuration found for this device")]
    NoConfiguration,
    #[error("QR code {0} not found in configuration")]
    UnknownQr(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No data available to export")]
    NoData,
    #[error("Storage error")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Internal server error")]
    Image {
        message: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Internal server error")]
    Archive {
        message: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Internal server error")]
    PasswordHash { message: String },
    #[error("Invalid device credential configuration: {0}")]
    CredentialConfig(String),
    #[error("Internal server error")]
    Task(String),
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    pub fn image(message: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            message: message.into(),
            source,
        }
    }

    pub fn archive(message: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            message: message.into(),
            source,
        }
    }

    pub fn encoding(field: &'static str, source: base64::DecodeError) -> Self {
        Self::InvalidEncoding { field, source }
    }

    pub fn password_hash(message: impl Into<String>, source: password_hash::Error) -> Self {
        Self::PasswordHash {
            message: format!("{}: {}", message.into(), source),
        }
    }

    /// Name of the category used when the error is reported over the socket.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnknownDevice(_) | AppError::BadPassword | AppError::Unauthenticated | AppError::UnauthorizedDevice(_) => "auth",
            AppError::UnauthorizedTransport => "unauthorized_transport",
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::InvalidEncoding { .. } | AppError::InvalidImage(_) => "validation",
            AppError::NoConfiguration | AppError::UnknownQr(_) | AppError::NotFound(_) | AppError::NoData => "not_found",
            AppError::Storage { .. } | AppError::Image { .. } | AppError::Archive { .. } => "storage",
            AppError::PasswordHash { .. } | AppError::CredentialConfig(_) | AppError::Task(_) | AppError::ConfigurationError { .. } => "internal",
        }
    }
}

impl From<password_hash::Error> for AppError {
    fn from(e: password_hash::Error) -> Self {
        AppError::password_hash("Password hashing failed", e)
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Task(e.to_string())
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::UnknownDevice(_) => Status::Unauthorized,
            AppError::BadPassword => Status::Unauthorized,
            AppError::Unauthenticated => Status::Unauthorized,
            AppError::UnauthorizedDevice(_) => Status::Forbidden,
            AppError::UnauthorizedTransport => Status::Forbidden,
            AppError::Validation(_) => Status::BadRequest,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::InvalidEncoding { .. } => Status::BadRequest,
            AppError::InvalidImage(_) => Status::BadRequest,
            AppError::NoConfiguration => Status::NotFound,
            AppError::UnknownQr(_) => Status::NotFound,
            AppError::NotFound(_) => Status::NotFound,
            AppError::NoData => Status::NotFound,
            AppError::Storage { .. } => Status::InternalServerError,
            AppError::Image { .. } => Status::InternalServerError,
            AppError::Archive { .. } => Status::InternalServerError,
            AppError::PasswordHash { .. } => Status::InternalServerError,
            AppError::CredentialConfig(_) => Status::InternalServerError,
            AppError::Task(_) => Status::InternalServerError,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let device_id = req
            .local_cache(|| None::<crate::auth::CurrentSession>)
            .as_ref()
            .map(|s| s.device_id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        error!(
            error = ?self,
            request_id = %request_id,
            device_id = %device_id,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let body = json!({ "success": false, "message": self.to_string() }).to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Bad Request"),
            ("401", "Unauthorized"),
            ("403", "Forbidden"),
            ("404", "Not Found"),
            ("500", "Internal Server Error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}
