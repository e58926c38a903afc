use std::path::{Path, PathBuf};

use crate::error::SwiftyError;

use super::env::expand_file_config;
use super::types::{
    ClientConfig, FileConfig, DEFAULT_API_BASE, DEFAULT_AUTHORIZE_PATH, DEFAULT_PROFILE_PATH,
    DEFAULT_SCOPE, DEFAULT_TOKEN_PATH,
};

pub const ENV_CONFIG: &str = "SWIFTY_CONFIG";
pub const ENV_CLIENT_ID: &str = "SWIFTY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SWIFTY_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SWIFTY_REDIRECT_URI";
pub const ENV_SCOPE: &str = "SWIFTY_SCOPE";
pub const ENV_API_BASE: &str = "SWIFTY_API_BASE";

/// Strip JSONC comments (`//` line comments and `/* */` block comments).
pub fn strip_jsonc_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(ch) = chars.next() {
        if in_string {
            result.push(ch);
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(ch);
            }
            ('/', Some(&'/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some(&'*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // keep line numbers stable for parse errors
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

/// Find the config file to use. First existing candidate wins:
///
/// 1. `--config` CLI flag
/// 2. `SWIFTY_CONFIG` env var
/// 3. `./config/swiftyhub.json`
/// 4. `~/.swiftyhub/swiftyhub.json` or `~/.swiftyhub/swiftyhub.jsonc`
pub fn discover_config_file(cli_config: Option<&str>) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = cli_config {
        candidates.push(PathBuf::from(path));
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG) {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("./config/swiftyhub.json"));
    if let Some(home) = dirs::home_dir() {
        let dir = home.join(".swiftyhub");
        candidates.push(dir.join("swiftyhub.json"));
        candidates.push(dir.join("swiftyhub.jsonc"));
    }

    candidates.into_iter().find(|p| p.exists())
}

fn load_file_config(path: &Path) -> Result<FileConfig, SwiftyError> {
    let content = std::fs::read_to_string(path).map_err(|e| SwiftyError::ConfigError {
        path: path.to_path_buf(),
        detail: format!("Cannot read file: {e}"),
    })?;

    let stripped = strip_jsonc_comments(&content);
    let mut cfg = serde_json::from_str::<FileConfig>(&stripped).map_err(|e| {
        SwiftyError::ConfigError {
            path: path.to_path_buf(),
            detail: format!("Invalid JSON: {e}"),
        }
    })?;
    expand_file_config(&mut cfg)?;
    Ok(cfg)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Layer environment overrides on top of a file config and validate.
///
/// Every missing required setting is reported at once, by the name of the
/// environment variable that would supply it.
pub fn resolve<F>(file: FileConfig, env: F) -> Result<ClientConfig, SwiftyError>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |key: &str, from_file: Option<String>| non_empty(env(key)).or(non_empty(from_file));

    let client_id = pick(ENV_CLIENT_ID, file.client_id);
    let redirect_uri = pick(ENV_REDIRECT_URI, file.redirect_uri);

    let mut missing = Vec::new();
    if client_id.is_none() {
        missing.push(ENV_CLIENT_ID.to_string());
    }
    if redirect_uri.is_none() {
        missing.push(ENV_REDIRECT_URI.to_string());
    }
    let (Some(client_id), Some(redirect_uri)) = (client_id, redirect_uri) else {
        return Err(SwiftyError::MissingConfig(missing));
    };

    Ok(ClientConfig {
        client_id,
        client_secret: pick(ENV_CLIENT_SECRET, file.client_secret),
        redirect_uri,
        scope: pick(ENV_SCOPE, file.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        api_base: pick(ENV_API_BASE, file.api_base).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        authorize_path: non_empty(file.authorize_path)
            .unwrap_or_else(|| DEFAULT_AUTHORIZE_PATH.to_string()),
        token_path: non_empty(file.token_path).unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
        profile_path: non_empty(file.profile_path)
            .unwrap_or_else(|| DEFAULT_PROFILE_PATH.to_string()),
        system_browser: file.system_browser.unwrap_or(false),
        pkce: file.pkce.unwrap_or(false),
        store_path: file.store_path,
    })
}

/// Load the config file (if any), apply environment overrides, and validate.
pub fn load_config(cli_config: Option<&str>) -> Result<ClientConfig, SwiftyError> {
    let file = match discover_config_file(cli_config) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_file_config(&path)?
        }
        None => FileConfig::default(),
    };
    resolve(file, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn strip_line_and_block_comments() {
        let input = r#"{
  // client registered on the intranet
  "clientId": "abc", /* inline */ "scope": "public"
}"#;
        let parsed: serde_json::Value =
            serde_json::from_str(&strip_jsonc_comments(input)).unwrap();
        assert_eq!(parsed["clientId"], "abc");
        assert_eq!(parsed["scope"], "public");
    }

    #[test]
    fn preserve_strings_with_slashes() {
        let input = r#"{"redirectUri": "swiftyhub://auth", "note": "a/*b*/c"}"#;
        let parsed: serde_json::Value =
            serde_json::from_str(&strip_jsonc_comments(input)).unwrap();
        assert_eq!(parsed["redirectUri"], "swiftyhub://auth");
        assert_eq!(parsed["note"], "a/*b*/c");
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let input = r#"{"k": "say \"//hi\""}"#;
        assert_eq!(strip_jsonc_comments(input), input);
    }

    #[test]
    fn resolve_reports_all_missing_settings() {
        let err = resolve(FileConfig::default(), env_of(&[])).unwrap_err();
        match err {
            SwiftyError::MissingConfig(names) => {
                assert_eq!(names, vec![ENV_CLIENT_ID, ENV_REDIRECT_URI]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_treats_blank_values_as_missing() {
        let err = resolve(
            FileConfig::default(),
            env_of(&[(ENV_CLIENT_ID, "  "), (ENV_REDIRECT_URI, "swiftyhub://auth")]),
        )
        .unwrap_err();
        assert!(matches!(err, SwiftyError::MissingConfig(ref n) if n == &[ENV_CLIENT_ID]));
    }

    #[test]
    fn resolve_env_overrides_file() {
        let file = FileConfig {
            client_id: Some("from-file".into()),
            redirect_uri: Some("swiftyhub://auth".into()),
            scope: Some("public projects".into()),
            pkce: Some(true),
            ..FileConfig::default()
        };
        let cfg = resolve(file, env_of(&[(ENV_CLIENT_ID, "from-env")])).unwrap();
        assert_eq!(cfg.client_id, "from-env");
        assert_eq!(cfg.redirect_uri, "swiftyhub://auth");
        assert_eq!(cfg.scope, "public projects");
        assert!(cfg.pkce);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.token_path, DEFAULT_TOKEN_PATH);
        assert!(cfg.client_secret.is_none());
    }

    #[test]
    fn load_file_config_parses_jsonc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swiftyhub.jsonc");
        std::fs::write(
            &path,
            r#"{
  // comment
  "clientId": "abc",
  "redirectUri": "swiftyhub://auth",
  "systemBrowser": true
}"#,
        )
        .unwrap();

        let cfg = load_file_config(&path).unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("abc"));
        assert_eq!(cfg.system_browser, Some(true));
    }

    #[test]
    fn load_file_config_error_on_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not valid json at all").unwrap();

        let err = load_file_config(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn load_file_config_error_on_missing_file() {
        let err = load_file_config(Path::new("/nonexistent/file.json")).unwrap_err();
        assert!(err.to_string().contains("Cannot read file"));
    }

    #[test]
    fn discover_prefers_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, "{}").unwrap();
        let found = discover_config_file(path.to_str());
        assert_eq!(found, Some(path));
    }

    #[test]
    fn discover_skips_nonexistent_cli_path() {
        let found = discover_config_file(Some("/nonexistent/path/config.json"));
        assert_ne!(found, Some(PathBuf::from("/nonexistent/path/config.json")));
    }
}
