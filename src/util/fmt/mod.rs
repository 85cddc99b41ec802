pub mod error;
pub mod tree;

pub use error::render_error;
pub use tree::{print_root, print_root_string};
