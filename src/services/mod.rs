pub mod feedback_service;
pub mod gamification_service;
pub mod lesson_service;
pub mod notification_service;
pub mod plan_service;
pub mod progress_service;
pub mod stats_service;
pub mod teacher_service;
pub mod user_service;
