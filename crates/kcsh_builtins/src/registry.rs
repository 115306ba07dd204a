//! Built-in command registry

use once_cell::sync::Lazy;

use crate::cd::CdCommand;
use crate::context::ContextCommand;
use crate::exit::ExitCommand;
use crate::help::HelpCommand;
use crate::prompt::PromptCommand;
use crate::Builtin;

/// Registry of built-in commands, in the order `help` lists them
pub struct BuiltinRegistry {
    commands: Vec<Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// The builtins every kcsh session has
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ContextCommand));
        registry.register(Box::new(PromptCommand));
        registry.register(Box::new(HelpCommand));
        registry.register(Box::new(CdCommand));
        registry.register(Box::new(ExitCommand));
        registry
    }

    /// Register a builtin, replacing one with the same name
    pub fn register(&mut self, builtin: Box<dyn Builtin>) {
        self.commands.retain(|b| b.name() != builtin.name());
        self.commands.push(builtin);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Builtin> {
        self.commands
            .iter()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Builtin> {
        self.commands.iter().map(|b| b.as_ref())
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static BUILTIN_REGISTRY: Lazy<BuiltinRegistry> = Lazy::new(BuiltinRegistry::new);

/// The shared standard registry
pub fn get_builtin_registry() -> &'static BuiltinRegistry {
    &BUILTIN_REGISTRY
}
