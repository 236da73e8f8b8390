pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod tasks {
    #[cfg(unix)]
    pub mod control;
    pub mod files;
    pub mod loader;
    pub mod viewer;
}
