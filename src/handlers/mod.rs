// Two security tiers:
// Public (no auth, /auth/*) → Protected (JWT auth, /api/*)
pub mod protected;
pub mod public;
