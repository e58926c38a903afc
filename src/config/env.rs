use crate::error::SwiftyError;

use super::types::FileConfig;

/// Expand environment variable references in a config string.
///
/// Supported syntaxes:
/// - `${VAR}` - replaced with env var value; error if unset
/// - `${VAR:-fallback}` - env var value, or fallback if unset or empty
/// - `$env:VAR` - same as `${VAR}`
pub fn expand_env_vars(input: &str) -> Result<String, SwiftyError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(body) = after.strip_prefix('{') {
            let close = body
                .find('}')
                .ok_or_else(|| env_error(&format!("Unclosed variable reference: ${{{body}")))?;
            let expr = &body[..close];
            match expr.split_once(":-") {
                Some((name, fallback)) => match std::env::var(name) {
                    Ok(val) if !val.is_empty() => result.push_str(&val),
                    _ => result.push_str(fallback),
                },
                None => result.push_str(&required_var(expr)?),
            }
            rest = &body[close + 1..];
        } else if let Some(body) = after.strip_prefix("env:") {
            let end = body
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(body.len());
            if end == 0 {
                return Err(env_error("Empty variable name in $env: reference"));
            }
            result.push_str(&required_var(&body[..end])?);
            rest = &body[end..];
        } else {
            result.push('$');
            rest = after;
        }
    }
    result.push_str(rest);

    Ok(result)
}

fn required_var(name: &str) -> Result<String, SwiftyError> {
    std::env::var(name)
        .map_err(|_| env_error(&format!("Environment variable '{name}' is not set")))
}

/// Expand environment variables in every string setting of a file config.
pub fn expand_file_config(config: &mut FileConfig) -> Result<(), SwiftyError> {
    for field in [
        &mut config.client_id,
        &mut config.client_secret,
        &mut config.redirect_uri,
        &mut config.scope,
        &mut config.api_base,
        &mut config.authorize_path,
        &mut config.token_path,
        &mut config.profile_path,
    ] {
        if let Some(value) = field {
            *value = expand_env_vars(value)?;
        }
    }
    Ok(())
}

fn env_error(detail: &str) -> SwiftyError {
    SwiftyError::ConfigError {
        path: std::path::PathBuf::from("<env>"),
        detail: detail.to_string(),
    }
}
