use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{AuthErrorKind, SwiftyError};

/// Slug of the main curriculum; its level and skills are preferred.
const MAIN_CURSUS_SLUG: &str = "42cursus";
/// Skill levels are shown against this ceiling.
const SKILL_LEVEL_CEILING: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: u64,
    pub login: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub wallet: i64,
    pub correction_points: i64,
    pub pool: Option<String>,
    pub level: f64,
    pub projects: Vec<Project>,
    pub skills: Vec<Skill>,
}

impl Profile {
    /// Progress toward the next level, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        (self.level.fract() * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Projects with everything in progress listed last; otherwise stable.
    pub fn projects_sorted(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.iter().collect();
        projects.sort_by_key(|p| p.status == ProjectStatus::InProgress);
        projects
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Finished,
    InProgress,
    WaitingForCorrection,
    SearchingAGroup,
    CreatingGroup,
    Parent,
    Other(String),
}

impl From<&str> for ProjectStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "finished" => ProjectStatus::Finished,
            "in_progress" => ProjectStatus::InProgress,
            "waiting_for_correction" => ProjectStatus::WaitingForCorrection,
            "searching_a_group" => ProjectStatus::SearchingAGroup,
            "creating_group" => ProjectStatus::CreatingGroup,
            "parent" => ProjectStatus::Parent,
            other => ProjectStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub status: ProjectStatus,
    pub final_mark: Option<i64>,
    pub validated: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skill {
    pub id: u64,
    pub name: String,
    pub level: f64,
}

impl Skill {
    pub fn percent(&self) -> u8 {
        (self.level / SKILL_LEVEL_CEILING * 100.0)
            .round()
            .clamp(0.0, 100.0) as u8
    }
}

// --- wire format -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<u64>,
    login: Option<String>,
    #[serde(default)]
    displayname: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    image: Option<RawImage>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    wallet: Option<i64>,
    #[serde(default)]
    correction_point: Option<i64>,
    #[serde(default)]
    pool_month: Option<String>,
    #[serde(default)]
    pool_year: Option<String>,
    #[serde(default)]
    cursus_users: Vec<RawCursusUser>,
    #[serde(default)]
    projects_users: Vec<RawProjectUser>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCursusUser {
    #[serde(default)]
    level: Option<f64>,
    #[serde(default)]
    cursus: Option<RawCursus>,
    #[serde(default)]
    skills: Vec<RawSkill>,
}

#[derive(Debug, Deserialize)]
struct RawCursus {
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSkill {
    id: Option<u64>,
    name: Option<String>,
    #[serde(default)]
    level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawProjectUser {
    id: Option<u64>,
    #[serde(default)]
    final_mark: Option<i64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "validated?")]
    validated: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    project: Option<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawUser> for Profile {
    type Error = String;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or("user record has no id")?;
        let login = raw
            .login
            .filter(|l| !l.is_empty())
            .ok_or("user record has no login")?;

        let cursus = raw
            .cursus_users
            .iter()
            .find(|c| c.cursus.as_ref().and_then(|c| c.slug.as_deref()) == Some(MAIN_CURSUS_SLUG))
            .or_else(|| raw.cursus_users.last());

        let skills = cursus
            .map(|c| {
                c.skills
                    .iter()
                    .filter_map(|s| {
                        Some(Skill {
                            id: s.id?,
                            name: s.name.clone()?,
                            level: s.level.unwrap_or(0.0),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Entries without an id or project name are dropped rather than
        // failing the whole profile.
        let projects = raw
            .projects_users
            .into_iter()
            .filter_map(|p| {
                Some(Project {
                    id: p.id?,
                    name: p.project?.name?,
                    status: p.status.as_deref().unwrap_or("in_progress").into(),
                    final_mark: p.final_mark,
                    validated: p.validated,
                    created_at: p.created_at,
                })
            })
            .collect();

        let pool = match (raw.pool_month, raw.pool_year) {
            (Some(month), Some(year)) => Some(format!("{month} {year}")),
            (None, Some(year)) => Some(year),
            _ => None,
        };

        Ok(Profile {
            id,
            display_name: raw.displayname.unwrap_or_else(|| login.clone()),
            login,
            email: raw.email,
            avatar_url: raw.image.and_then(|i| i.link),
            location: raw.location,
            wallet: raw.wallet.unwrap_or(0),
            correction_points: raw.correction_point.unwrap_or(0),
            pool,
            level: cursus.and_then(|c| c.level).unwrap_or(0.0),
            projects,
            skills,
        })
    }
}

/// Parse and validate a user record at the API boundary.
pub fn parse_profile(body: &str) -> Result<Profile, SwiftyError> {
    let raw: RawUser = serde_json::from_str(body).map_err(|e| {
        tracing::warn!("Profile response is not a user record: {e}");
        SwiftyError::Auth(AuthErrorKind::MalformedResponse)
    })?;
    Profile::try_from(raw).map_err(|detail| {
        tracing::warn!("Rejected profile: {detail}");
        SwiftyError::Auth(AuthErrorKind::MalformedResponse)
    })
}

// --- client ----------------------------------------------------------------

impl std::fmt::Debug for dyn ProfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSource").finish()
    }
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the signed-in user's record. `SwiftyError::Unauthorized` means
    /// the access token was refused.
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, SwiftyError>;
}

#[derive(Debug, Clone)]
pub struct ProfileClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ProfileClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            endpoint: config.profile_endpoint(),
        }
    }
}

#[async_trait]
impl ProfileSource for ProfileClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, SwiftyError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Profile request failed: {e}");
                SwiftyError::Auth(AuthErrorKind::NetworkUnavailable)
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SwiftyError::Unauthorized);
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SwiftyError::Auth(AuthErrorKind::NetworkUnavailable));
        }
        if !status.is_success() {
            return Err(SwiftyError::ProtocolError(format!(
                "Profile endpoint returned status {status}"
            )));
        }

        let body = resp.text().await.map_err(|e| {
            tracing::warn!("Profile body could not be read: {e}");
            SwiftyError::Auth(AuthErrorKind::NetworkUnavailable)
        })?;
        parse_profile(&body)
    }
}
