//! Production-environment guard.

/// Refusal to run a job against the production environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("refusing to {action} in production environment '{environment}'")]
    ProductionEnvironment { action: String, environment: String },
}

/// Fails when `environment` is the configured production environment id.
///
/// Compares environment ids only; the check never looks at a client handle.
pub fn refuse_production(
    action: &str,
    environment: &str,
    production: &str,
) -> Result<(), GuardError> {
    if environment == production {
        return Err(GuardError::ProductionEnvironment {
            action: action.to_string(),
            environment: environment.to_string(),
        });
    }
    Ok(())
}
