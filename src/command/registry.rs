//! Command registry: ordered named groups of descriptors.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;

use super::descriptor::{CommandBuilder, CommandDescriptor};
use crate::error::Result;

struct Group {
    name: String,
    commands: Vec<Arc<CommandDescriptor>>,
}

#[derive(Default)]
struct Table {
    version: u64,
    groups: Vec<Group>,
}

/// Shared command table.
///
/// All mutation goes through `register`/`retain`, which swap whole
/// descriptors under the write lock. Readers clone `Arc`s out and never hold
/// the lock across an await.
#[derive(Default)]
pub struct CommandRegistry {
    table: RwLock<Table>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `desc` by name within `group`.
    ///
    /// Groups are created on first use and keep their creation order.
    /// Returns the descriptor that was replaced, if any.
    pub fn register(&self, group: &str, desc: CommandDescriptor) -> Option<Arc<CommandDescriptor>> {
        let desc = Arc::new(desc);
        let mut table = self.write();
        table.version += 1;

        let idx = match table.groups.iter().position(|g| g.name == group) {
            Some(idx) => idx,
            None => {
                table.groups.push(Group {
                    name: group.to_string(),
                    commands: Vec::new(),
                });
                table.groups.len() - 1
            }
        };
        let commands = &mut table.groups[idx].commands;

        match commands.iter().position(|c| c.name() == desc.name()) {
            Some(pos) => {
                tracing::debug!("replacing command '{}' in group '{}'", desc.name(), group);
                Some(std::mem::replace(&mut commands[pos], desc))
            }
            None => {
                tracing::debug!("registered command '{}' in group '{}'", desc.name(), group);
                commands.push(desc);
                None
            }
        }
    }

    /// Build and register; a build failure drops only this command.
    pub fn register_builder(&self, group: &str, builder: CommandBuilder) -> Result<()> {
        let name = builder.name().to_string();
        match builder.build() {
            Ok(desc) => {
                self.register(group, desc);
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to register '{}' in group '{}': {}", name, group, e);
                Err(e)
            }
        }
    }

    /// Drop every command of `group` whose name is not in `keep`.
    pub fn retain(&self, group: &str, keep: &[String]) -> usize {
        let mut table = self.write();
        let Some(g) = table.groups.iter_mut().find(|g| g.name == group) else {
            return 0;
        };
        let before = g.commands.len();
        g.commands.retain(|c| keep.iter().any(|k| k == c.name()));
        let removed = before - g.commands.len();
        if removed > 0 {
            table.version += 1;
        }
        removed
    }

    /// First descriptor named `name`, searching groups in creation order.
    ///
    /// A name shadowed by an earlier group is unreachable here but still
    /// takes part in pattern dispatch.
    pub fn lookup_exact(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        let table = self.read();
        table
            .groups
            .iter()
            .find_map(|g| g.commands.iter().find(|c| c.name() == name))
            .cloned()
    }

    /// Snapshot of every pattern-bearing descriptor, groups then commands in
    /// registration order.
    pub fn all_patterns(&self) -> PatternSet {
        let table = self.read();
        let commands = table
            .groups
            .iter()
            .flat_map(|g| g.commands.iter())
            .filter(|c| c.pattern().is_some())
            .cloned()
            .collect();
        PatternSet { commands }
    }

    /// Every descriptor with its group name.
    pub fn list(&self) -> Vec<(String, Arc<CommandDescriptor>)> {
        let table = self.read();
        table
            .groups
            .iter()
            .flat_map(|g| g.commands.iter().map(move |c| (g.name.clone(), Arc::clone(c))))
            .collect()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.read().groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.read().version
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Restartable snapshot of pattern commands.
pub struct PatternSet {
    commands: Vec<Arc<CommandDescriptor>>,
}

impl PatternSet {
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<CommandDescriptor>, &Regex)> {
        self.commands
            .iter()
            .filter_map(|c| c.pattern().map(|re| (c, re)))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::context::Invocation;
    use crate::command::descriptor::Reply;

    fn cmd(name: &str, reply: &'static str) -> CommandDescriptor {
        CommandBuilder::new(name)
            .run(move |_: &mut Invocation| Ok(Reply::from(reply)))
            .build()
            .unwrap()
    }

    fn pattern_cmd(name: &str, pattern: &str) -> CommandDescriptor {
        CommandBuilder::new(name)
            .pattern(pattern)
            .run(|_: &mut Invocation| Ok(Reply::Nothing))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = CommandRegistry::new();
        assert!(registry.register("core", cmd("echo", "a")).is_none());

        let found = registry.lookup_exact("echo").unwrap();
        assert_eq!(found.name(), "echo");
        assert!(registry.lookup_exact("nope").is_none());
    }

    #[test]
    fn test_replace_keeps_old_snapshot_valid() {
        let registry = CommandRegistry::new();
        registry.register("core", cmd("echo", "old"));
        let held = registry.lookup_exact("echo").unwrap();
        let version = registry.version();

        let replaced = registry.register("core", cmd("echo", "new")).unwrap();
        assert!(Arc::ptr_eq(&held, &replaced));
        assert!(!Arc::ptr_eq(&held, &registry.lookup_exact("echo").unwrap()));
        assert!(registry.version() > version);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_first_group_wins_exact_lookup() {
        let registry = CommandRegistry::new();
        registry.register("first", pattern_cmd("dup", "a"));
        registry.register("second", pattern_cmd("dup", "b"));

        let found = registry.lookup_exact("dup").unwrap();
        assert_eq!(found.pattern().unwrap().as_str(), "^(?:a)$");

        // Both stay reachable through patterns.
        assert_eq!(registry.all_patterns().len(), 2);
    }

    #[test]
    fn test_patterns_in_registration_order() {
        let registry = CommandRegistry::new();
        registry.register("g1", pattern_cmd("one", "x"));
        registry.register("g2", pattern_cmd("two", "x"));
        registry.register("g1", cmd("plain", "p"));
        registry.register("g1", pattern_cmd("three", "x"));

        let patterns = registry.all_patterns();
        let names: Vec<&str> = patterns.iter().map(|(c, _)| c.name()).collect();
        assert_eq!(names, vec!["one", "three", "two"]);

        // Restartable.
        assert_eq!(patterns.iter().count(), 3);
    }

    #[test]
    fn test_register_builder_failure_is_contained() {
        let registry = CommandRegistry::new();
        let bad = CommandBuilder::new("bad").pattern("(");
        assert!(registry.register_builder("core", bad).is_err());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_retain() {
        let registry = CommandRegistry::new();
        registry.register("m", cmd("a", "a"));
        registry.register("m", cmd("b", "b"));

        assert_eq!(registry.retain("m", &["a".to_string()]), 1);
        assert!(registry.lookup_exact("b").is_none());
        assert_eq!(registry.group_names(), vec!["m"]);
    }
}
