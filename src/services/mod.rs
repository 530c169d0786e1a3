pub mod auth_service;
pub mod directory_service;
pub mod review_service;
pub mod stats_service;
