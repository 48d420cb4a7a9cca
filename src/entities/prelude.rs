pub use super::photo_history::Entity as PhotoHistory;
pub use super::users::Entity as Users;
