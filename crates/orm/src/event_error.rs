use std::fmt;

/// Failure raised by a [`ModelObserver`](crate::events::ModelObserver).
///
/// Returning `Ok(false)` from a `*ing` hook cancels the operation quietly;
/// returning one of these aborts it and surfaces as `ModelError::Event`.
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    Validation {
        message: String,
        hint: Option<String>,
    },
    Observer {
        message: String,
    },
    Hook {
        event: &'static str,
        message: String,
    },
}

impl EventError {
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn validation_with_hint(message: &str, hint: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn observer(message: &str) -> Self {
        Self::Observer {
            message: message.to_string(),
        }
    }

    pub fn hook(event: &'static str, message: &str) -> Self {
        Self::Hook {
            event,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Validation { message, hint } => {
                write!(f, "Validation error: {}", message)?;
                if let Some(hint) = hint {
                    write!(f, " (hint: {})", hint)?;
                }
                Ok(())
            }
            EventError::Observer { message } => write!(f, "Observer error: {}", message),
            EventError::Hook { event, message } => {
                write!(f, "'{}' hook failed: {}", event, message)
            }
        }
    }
}

impl std::error::Error for EventError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_hint_display() {
        let err = EventError::validation_with_hint("email taken", "use another address");
        assert_eq!(
            err.to_string(),
            "Validation error: email taken (hint: use another address)"
        );
    }

    #[test]
    fn test_hook_display() {
        let err = EventError::hook("creating", "quota exceeded");
        assert_eq!(err.to_string(), "'creating' hook failed: quota exceeded");
    }
}
