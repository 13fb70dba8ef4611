pub mod files;
pub mod notes;
pub mod shell;
pub mod system_info;
pub mod web_search;

pub use files::{ListFilesSkill, ReadFileSkill, WriteFileSkill};
pub use notes::ManageNotesSkill;
pub use shell::ExecuteCommandSkill;
pub use system_info::SystemInfoSkill;
pub use web_search::WebSearchSkill;

use super::Skill;

/// Every builtin skill, in the order they are offered to the model.
pub fn all() -> Vec<Box<dyn Skill>> {
    vec![
        Box::new(ReadFileSkill),
        Box::new(WriteFileSkill),
        Box::new(ListFilesSkill),
        Box::new(ExecuteCommandSkill),
        Box::new(SystemInfoSkill),
        Box::new(ManageNotesSkill),
        Box::new(WebSearchSkill),
    ]
}
