use super::{types::Config, BackendConfig, ConfigError};

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.storage.local_root.as_os_str().is_empty() {
        return Err(invalid("storage.local_root cannot be empty"));
    }
    if let Some(remote) = &config.storage.remote {
        if remote.endpoint.trim().is_empty() {
            return Err(invalid("storage.remote.endpoint cannot be empty"));
        }
        if remote.bucket.trim().is_empty() {
            return Err(invalid("storage.remote.bucket cannot be empty"));
        }
    }

    if config.generation.timeout_secs == 0 {
        return Err(invalid("generation.timeout_secs must be greater than 0"));
    }
    for (i, backend) in config.generation.backends.iter().enumerate() {
        match backend {
            BackendConfig::Http { url } if url.trim().is_empty() => {
                return Err(invalid(format!("generation.backends[{}].url cannot be empty", i)));
            }
            BackendConfig::Grpc { address } if address.trim().is_empty() => {
                return Err(invalid(format!(
                    "generation.backends[{}].address cannot be empty",
                    i
                )));
            }
            BackendConfig::Subprocess {
                interpreters,
                script,
            } => {
                if script.as_os_str().is_empty() {
                    return Err(invalid(format!(
                        "generation.backends[{}].script cannot be empty",
                        i
                    )));
                }
                if interpreters.is_empty() {
                    return Err(invalid(format!(
                        "generation.backends[{}].interpreters cannot be empty",
                        i
                    )));
                }
            }
            _ => {}
        }
    }

    if config.queue.name.trim().is_empty() {
        return Err(invalid("queue.name cannot be empty"));
    }
    if config.queue.poll_interval_ms == 0 {
        return Err(invalid("queue.poll_interval_ms must be greater than 0"));
    }
    if config.queue.lease_secs == 0 {
        return Err(invalid("queue.lease_secs must be greater than 0"));
    }
    if config.queue.max_deliveries == 0 {
        return Err(invalid("queue.max_deliveries must be greater than 0"));
    }

    if config.notifier.enabled && config.notifier.bot_token.trim().is_empty() {
        return Err(invalid("notifier.bot_token is required when notifier is enabled"));
    }
    if config.notifier.timeout_secs == 0 {
        return Err(invalid("notifier.timeout_secs must be greater than 0"));
    }

    Ok(())
}
