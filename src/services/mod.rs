// src/services/mod.rs

pub mod analytics;
pub mod attempts;
pub mod gamification;
pub mod scoring;

pub use analytics::AnalyticsService;
pub use attempts::AttemptService;
pub use gamification::GamificationService;
