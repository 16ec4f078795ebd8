pub mod analytics;
pub mod derive;
pub mod extract;
pub mod fetch;
pub mod loader;
pub mod model;
pub mod store;
