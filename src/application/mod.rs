pub mod bootstrap;
pub mod commands;
pub mod preference_engine;
pub mod ticker;
pub mod timing_resolver;
