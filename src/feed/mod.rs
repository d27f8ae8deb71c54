pub mod author;
pub mod comments;
pub mod home;
pub mod library;

pub use author::{get_author_for_user, AuthorForUserResponse};
pub use comments::comments_for_poem;
pub use home::{get_home_view, DynamicView, HomeResponse, PoemOfTheDay, StaticView};
pub use library::{get_library_for_user, LibraryForUserResponse};
