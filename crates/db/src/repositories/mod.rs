pub mod content_repo;
pub mod permission_repo;
pub mod session_repo;
pub mod user_repo;

pub use content_repo::ContentRepo;
pub use permission_repo::PermissionRepo;
pub use session_repo::EditingSessionRepo;
pub use user_repo::UserRepo;
