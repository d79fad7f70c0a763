mod load;
mod node;
mod parse;
mod tree;

pub use load::load_story;
pub use node::{Story, StoryMeta, StoryNode, find_node, is_legacy_linear};
pub use parse::parse_story;
pub use tree::{StoryTree, TreeNode};
