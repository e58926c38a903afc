pub mod controller;

pub use controller::{SessionController, SessionSnapshot};
