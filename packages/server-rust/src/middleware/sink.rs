//! Request-scoped error sink.
//!
//! Auth layers never write error responses themselves. They record what
//! went wrong here and the outermost [`super::ErrorRenderLayer`] decides
//! what the client sees.

use std::sync::Arc;

use http::Extensions;
use parking_lot::Mutex;

use crate::error::AuthError;

/// Shared list of errors recorded for one request.
///
/// Cloning is cheap; every clone refers to the same list.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    errors: Arc<Mutex<Vec<AuthError>>>,
}

impl ErrorSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sink stored in `extensions`, installing a new one if the
    /// request does not carry one yet.
    pub fn attach(extensions: &mut Extensions) -> Self {
        if let Some(sink) = extensions.get::<ErrorSink>() {
            return sink.clone();
        }
        let sink = ErrorSink::new();
        extensions.insert(sink.clone());
        sink
    }

    pub fn record(&self, error: AuthError) {
        self.errors.lock().push(error);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Status of the first recorded error.
    #[must_use]
    pub fn first_status(&self) -> Option<http::StatusCode> {
        self.errors.lock().first().map(AuthError::status)
    }

    /// Removes and returns everything recorded so far, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<AuthError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

#[cfg(test)]
mod tests {
    use claimgate_core::ExtractError;

    use super::*;

    #[test]
    fn attach_reuses_installed_sink() {
        let mut extensions = Extensions::new();
        let first = ErrorSink::attach(&mut extensions);
        first.record(AuthError::ContextUnavailable);

        let second = ErrorSink::attach(&mut extensions);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn drain_empties_the_sink() {
        let sink = ErrorSink::new();
        sink.record(AuthError::Extract(ExtractError::MissingAuthorization));
        sink.record(AuthError::ContextUnavailable);
        assert_eq!(sink.first_status(), Some(http::StatusCode::UNAUTHORIZED));

        let errors = sink.drain();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            AuthError::Extract(ExtractError::MissingAuthorization)
        ));
        assert!(sink.is_empty());
        assert!(!sink.has_errors());
    }
}
