pub mod http_mock;

use std::path::Path;

pub const REDIRECT_URI: &str = "myapp://auth";

/// Create a temp directory holding a swiftyhub.json that points at `api_base`
/// and keeps its token store inside the same directory.
#[allow(dead_code)]
pub fn temp_config_dir(api_base: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), api_base);
    dir
}

#[allow(dead_code)]
pub fn write_config(dir: &Path, api_base: &str) {
    let config = serde_json::json!({
        // Comments are allowed in config files.
        "clientId": "client-1",
        "clientSecret": "secret-1",
        "redirectUri": REDIRECT_URI,
        "apiBase": api_base,
        "storePath": dir.join("session.json"),
    });
    let body = format!(
        "// test config\n{}",
        serde_json::to_string_pretty(&config).unwrap()
    );
    std::fs::write(dir.join("swiftyhub.json"), body).unwrap();
}

/// Seed the token store the way `FileTokenStore` writes it.
#[allow(dead_code)]
pub fn seed_refresh_token(dir: &Path, token: &str) {
    let stored = serde_json::json!({
        "refresh_token": token,
        "saved_at": "2024-01-01T00:00:00Z",
    });
    std::fs::write(dir.join("session.json"), stored.to_string()).unwrap();
}

/// A user record as the profile endpoint returns it.
#[allow(dead_code)]
pub fn user_record(login: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 4242,
        "login": login,
        "displayname": "Jane Doe",
        "email": "jdoe@student.42.fr",
        "image": { "link": "https://cdn.intra.42.fr/users/jdoe.jpg" },
        "location": "e1r2p3",
        "wallet": 120,
        "correction_point": 5,
        "pool_month": "september",
        "pool_year": "2022",
        "cursus_users": [{
            "level": 7.45,
            "cursus": { "slug": "42cursus" },
            "skills": [{ "id": 1, "name": "Unix", "level": 4.31 }]
        }],
        "projects_users": [{
            "id": 11, "final_mark": 125, "status": "finished", "validated?": true,
            "project": { "name": "Libft" }
        }]
    })
}
