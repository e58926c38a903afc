pub mod profile;

pub use profile::{parse_profile, Profile, ProfileClient, ProfileSource, Project, ProjectStatus, Skill};
