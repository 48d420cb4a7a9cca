pub mod photo_service;
pub mod photo_service_impl;
pub use photo_service::{AddToHistoryOutcome, PhotoError, PhotoService, RemoveOutcome};
pub use photo_service_impl::SeaOrmPhotoService;

pub mod profile_service;
pub mod profile_service_impl;
pub use profile_service::{ProfileError, ProfileService};
pub use profile_service_impl::SeaOrmProfileService;
