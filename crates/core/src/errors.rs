use thiserror::Error;
use tracing::warn;

use crate::domain::name::NameRejection;
use crate::platform::PlatformError;
use crate::registration::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Validation(#[from] NameRejection),
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("expected entity is missing: {0}")]
    MissingEntity(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

pub const MISSING_PERMISSIONS: &str =
    "The bot is missing permissions for this action. Please ask a staff member to check its role.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to show the member. Bad requests carry a message that
    /// was written for the member in the first place.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "Could not register you to the support system right now. Please try again shortly."
            }
            Self::Internal { .. } => {
                "Could not register you to the support system. Please contact a staff member."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        // The member only sees a fixed sentence; the platform detail goes to the log.
        if let Self::Platform(PlatformError::PermissionDenied(detail)) = &self {
            warn!(
                event_name = "interface.permission_denied",
                correlation_id = %correlation_id,
                detail = %detail,
                "platform refused a bot action"
            );
        }
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Validation(rejection) => {
                Self::BadRequest { message: rejection.to_string(), correlation_id }
            }
            ApplicationError::Platform(PlatformError::PermissionDenied(_)) => {
                Self::BadRequest { message: MISSING_PERMISSIONS.to_owned(), correlation_id }
            }
            ApplicationError::Platform(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::MissingEntity(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::name::NameRejection;
    use crate::errors::{ApplicationError, InterfaceError, MISSING_PERMISSIONS};
    use crate::platform::PlatformError;
    use crate::registration::store::StoreError;

    #[test]
    fn validation_error_maps_to_bad_request_with_reason() {
        let interface =
            ApplicationError::from(NameRejection::NonAlphabetic).into_interface("ix-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "ix-1"
        ));
        assert_eq!(interface.user_message(), "Names may only contain letters.");
    }

    #[test]
    fn transport_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(PlatformError::Transport("connection reset".to_owned()))
                .into_interface("ix-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "ix-2");
    }

    #[test]
    fn permission_denied_hides_the_platform_detail() {
        let interface = ApplicationError::from(PlatformError::PermissionDenied(
            "create text channel: Missing Permissions (code 50013)".to_owned(),
        ))
        .into_interface("ix-5");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.user_message(), MISSING_PERMISSIONS);
        assert!(!interface.to_string().contains("50013"));
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::from(StoreError::Backend("database is locked".to_owned()))
            .into_interface("ix-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(!interface.user_message().contains("locked"));
    }

    #[test]
    fn missing_entity_maps_to_internal() {
        let interface =
            ApplicationError::MissingEntity("member 1 in guild 2".to_owned()).into_interface("ix-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(
            interface.user_message(),
            "Could not register you to the support system. Please contact a staff member."
        );
    }
}
