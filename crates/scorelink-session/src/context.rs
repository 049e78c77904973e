//! The identity of the current play session.
//!
//! The host page passes its parameters in the URL; parsing them is somebody
//! else's job. What arrives here is a [`SessionParams`] of plain strings.
//! Turning it into a [`SessionContext`] is the only check we make: a
//! session without an id cannot be validated, streamed or submitted.

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionParams
// ---------------------------------------------------------------------------

/// Raw session parameters as supplied by the host page.
///
/// All fields are optional strings; empty means "not provided". The
/// page parameter names are `play_session_uuid`, `variant`, `input`,
/// `lang`, `testName`, `testRank` and `device`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub session_id: String,
    pub variant: String,
    pub input: String,
    pub lang: String,
    pub test_name: String,
    pub test_rank: String,
    pub device: String,
}

impl SessionParams {
    /// Creates params carrying only a session id.
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// The validated identity every backend request is scoped to.
///
/// Immutable once built: the fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: String,
    variant: String,
    input: String,
    lang: String,
    test_name: String,
    test_rank: String,
    device: String,
}

impl SessionContext {
    /// Builds a context from raw params.
    ///
    /// # Errors
    /// Returns [`SessionError::MissingSessionId`] if the session id is
    /// empty or whitespace.
    pub fn from_params(params: SessionParams) -> Result<Self, SessionError> {
        let session_id = params.session_id.trim();
        if session_id.is_empty() {
            return Err(SessionError::MissingSessionId);
        }

        Ok(Self {
            session_id: session_id.to_owned(),
            variant: params.variant,
            input: params.input,
            lang: params.lang,
            test_name: params.test_name,
            test_rank: params.test_rank,
            device: params.device,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Input mode, e.g. `"mouse"` or `"touch"`.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn test_rank(&self) -> &str {
        &self.test_rank
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session_id_is_rejected() {
        let result = SessionContext::from_params(SessionParams::default());
        assert!(matches!(result, Err(SessionError::MissingSessionId)));
    }

    #[test]
    fn test_whitespace_session_id_is_rejected() {
        let result = SessionContext::from_params(SessionParams::with_session_id("   "));
        assert!(matches!(result, Err(SessionError::MissingSessionId)));
    }

    #[test]
    fn test_context_keeps_all_params() {
        let params = SessionParams {
            session_id: " 9c1f ".into(),
            variant: "aim-gridshot".into(),
            input: "mouse".into(),
            lang: "en".into(),
            test_name: "Reaction".into(),
            test_rank: "2".into(),
            device: "desktop".into(),
        };
        let ctx = SessionContext::from_params(params).unwrap();

        assert_eq!(ctx.session_id(), "9c1f");
        assert_eq!(ctx.variant(), "aim-gridshot");
        assert_eq!(ctx.input(), "mouse");
        assert_eq!(ctx.lang(), "en");
        assert_eq!(ctx.test_name(), "Reaction");
        assert_eq!(ctx.test_rank(), "2");
        assert_eq!(ctx.device(), "desktop");
    }
}
