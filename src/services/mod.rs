//! Cached lookups that sit beside the list screens.

pub mod comments;
pub mod schedule;
pub mod users;

pub use comments::{Comment, CommentService};
pub use schedule::{Fixture, SportsSchedule};
pub use users::UserDirectory;
