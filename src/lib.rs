pub mod api;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod oauth;
pub mod session;
pub mod types;

pub use api::profile::{Profile, ProfileClient, ProfileSource};
pub use config::{load_config, ClientConfig};
pub use connectivity::ConnectivityMonitor;
pub use error::{AuthErrorKind, SwiftyError};
pub use oauth::{
    AuthorizationLauncher, AuthorizationRequest, FileTokenStore, MemoryTokenStore,
    NavigationEvent, Presentation, RedirectInterceptor, TokenExchange, TokenExchangeClient,
    TokenStore,
};
pub use session::{SessionController, SessionSnapshot};
pub use types::{AuthOutcome, Session, SessionState};
