pub mod prelude;

pub mod photo_history;
pub mod users;
