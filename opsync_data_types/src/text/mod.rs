//! Text values edited through foldable operations.

mod char_string;

pub use char_string::{CharString, CharStringOperation};
