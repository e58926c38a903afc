pub mod interceptor;
pub mod launcher;
pub mod loopback;
pub mod nonce;
pub mod store;
pub mod token;

pub use interceptor::{Interception, InterceptorState, NavigationEvent, RedirectInterceptor};
pub use launcher::{is_loopback_http, AuthorizationLauncher, AuthorizationRequest, Presentation};
pub use loopback::LoopbackListener;
pub use nonce::{generate_pkce, generate_state, PkceChallenge};
pub use store::{default_store_path, FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{Grant, TokenExchange, TokenExchangeClient};
