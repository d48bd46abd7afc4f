// Orchestration-facing surface: configuration, backend selection and the
// change-notification hook.

pub mod config;
pub mod factory;
pub mod notify;

pub use config::Config;
pub use factory::{select_backend, Backend, FileFactory};
pub use notify::ChangeNotifier;
