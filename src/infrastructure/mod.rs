pub mod config;
pub mod error;
pub mod location_service;
pub mod preference_store;
pub mod storage;
pub mod timing_provider_client;
