//! Submission validation. Pure checks, resolved before any sandbox exists.

use crate::config::ServiceConfig;
use crate::profile::{LanguageProfile, ProfileRegistry};
use chrono::{DateTime, Utc};
use seek_common::{ExecuteRequest, ValidationError};
use std::sync::Arc;
use uuid::Uuid;

/// One accepted execution request. Immutable; discarded once the response
/// has been produced.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub code: String,
    pub language_id: String,
    pub stdin: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// Validate a raw request against the registry and configured size bounds.
///
/// Returns the accepted submission together with its resolved profile so the
/// caller never performs a second registry lookup.
pub fn validate(
    raw: &ExecuteRequest,
    registry: &ProfileRegistry,
    config: &ServiceConfig,
) -> Result<(Submission, Arc<LanguageProfile>), ValidationError> {
    let profile = registry
        .get(&raw.language)
        .ok_or_else(|| ValidationError::UnsupportedLanguage(raw.language.clone()))?;

    if raw.code.trim().is_empty() {
        return Err(ValidationError::EmptyCode);
    }

    if raw.code.len() > config.max_code_bytes {
        return Err(ValidationError::CodeTooLarge {
            limit: config.max_code_bytes,
            actual: raw.code.len(),
        });
    }

    if raw.input.len() > config.max_stdin_bytes {
        return Err(ValidationError::StdinTooLarge {
            limit: config.max_stdin_bytes,
            actual: raw.input.len(),
        });
    }

    // NUL bytes would corrupt the source file and argv handling; other
    // control characters (tab, newline, CR) are legitimate source text.
    if has_disallowed_controls(&raw.code) || has_disallowed_controls(&raw.input) {
        return Err(ValidationError::DisallowedControlCharacters);
    }

    let submission = Submission {
        id: Uuid::new_v4(),
        code: raw.code.clone(),
        language_id: profile.id.clone(),
        stdin: if raw.input.is_empty() {
            None
        } else {
            Some(raw.input.clone())
        },
        requested_at: Utc::now(),
    };

    Ok((submission, profile))
}

fn has_disallowed_controls(text: &str) -> bool {
    text.chars()
        .any(|c| c == '\0' || (c.is_control() && c != '\n' && c != '\r' && c != '\t'))
}
