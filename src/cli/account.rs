use std::io::IsTerminal;

use crate::error::SwiftyError;
use crate::session::SessionController;
use crate::types::SessionState;

use super::output::{print_json, print_profile, print_status};

/// Restore any stored session and report where it stands.
pub async fn run_status(controller: &SessionController, json: bool) -> Result<(), SwiftyError> {
    controller.init().await;
    let snapshot = controller.snapshot();
    if json {
        print_json(&snapshot);
    } else {
        print_status(&snapshot, std::io::stdout().is_terminal());
    }
    Ok(())
}

pub async fn run_profile(controller: &SessionController, json: bool) -> Result<(), SwiftyError> {
    if controller.init().await != SessionState::SignedIn {
        return Err(SwiftyError::NotSignedIn);
    }
    let profile = controller.fetch_profile().await?;
    if json {
        print_json(&profile);
    } else {
        print_profile(&profile, std::io::stdout().is_terminal());
    }
    Ok(())
}

/// Forget the stored session. Works offline.
pub fn run_logout(controller: &SessionController) -> Result<(), SwiftyError> {
    controller.logout()?;
    println!("Signed out.");
    Ok(())
}
