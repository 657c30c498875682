//! Room content: the on-disk room files and the bespoke challenge registry.

pub mod bespoke;
pub mod loader;
pub mod types;

pub use loader::{load_game, load_room_file, load_rooms};
pub use types::RoomFile;
