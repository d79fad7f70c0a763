pub mod layout;
pub mod navigator;
pub mod outline;
pub mod search;
pub mod session;
pub mod story;
pub mod util;

pub use layout::{LayoutConfig, TreeLayout, layout_tree};
pub use navigator::{ActivePath, ChoiceOutcome, Progress, resolve_choice};
pub use session::{ChoiceStep, ReaderSession};
pub use story::{Story, StoryNode, StoryTree};
