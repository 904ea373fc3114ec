/// Admin dashboard data: registry and raw predictions.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// CSV export of the predictions table.
pub mod export_service;
/// Health check service.
pub mod health_service;
/// Aggregated statistics over stored predictions.
pub mod insights_service;
/// Landing page countdown.
pub mod landing_service;
/// Prediction persistence with explicit fail-soft fallbacks.
pub mod record_service;
/// Player registry access.
pub mod registry_service;
/// Idle form session eviction.
pub mod session_sweeper;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Form session transitions.
pub mod wizard_service;
