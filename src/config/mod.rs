pub mod ajs_config;
pub mod path_matcher;

pub use ajs_config::AjsConfig;
pub use path_matcher::PathMatcher;
