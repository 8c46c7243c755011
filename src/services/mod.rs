pub mod application_service;
pub mod candidate_service;
pub mod credential_service;
pub mod resume_service;
