pub mod api;
pub mod changes;
pub mod config;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod notifications;
pub mod payments;
pub mod repository;
pub mod service;
