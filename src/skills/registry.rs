//! Skills registry: the fixed capability set offered to the model.
//!
//! Skills keep their registration order, which is also the order of the
//! descriptors sent with every completion request.

use serde_json::Value;
use tracing::{debug, warn};

use super::{Skill, SkillContext, ToolDescriptor};
use crate::sandbox::ToolError;

pub struct SkillRegistry {
    skills: Vec<Box<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self { skills: Vec::new() }
    }

    /// Registry holding every builtin skill.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for skill in super::builtin::all() {
            registry.register(skill);
        }
        registry
    }

    /// Adds a skill. A skill with the same name replaces the earlier one.
    pub fn register(&mut self, skill: Box<dyn Skill>) {
        if let Some(pos) = self.skills.iter().position(|s| s.name() == skill.name()) {
            warn!("Replacing already registered skill '{}'", skill.name());
            self.skills[pos] = skill;
        } else {
            self.skills.push(skill);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Skill> {
        self.skills
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.skills.iter().map(|s| s.name()).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.skills.iter().map(|s| s.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Runs a skill and folds every failure into result text.
    ///
    /// Unknown names, argument mismatches and execution failures all come
    /// back as a string so the loop can hand them to the model.
    pub async fn execute(&self, name: &str, params: Value, context: &SkillContext) -> String {
        let Some(skill) = self.get(name) else {
            warn!("Model requested unknown tool '{name}'");
            return format!("Error: Unknown tool '{name}'");
        };

        debug!(tool = name, "Executing skill");

        match skill.execute(params, context).await {
            Ok(output) => output,
            Err(ToolError::InvalidArguments(detail)) => {
                warn!(tool = name, "Invalid arguments: {detail}");
                format!("Error: Invalid arguments for '{name}': {detail}")
            }
            Err(e) => {
                warn!(tool = name, "Skill failed: {e}");
                format!("Error executing '{name}': {e}")
            }
        }
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
