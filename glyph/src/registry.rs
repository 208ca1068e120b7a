//! Per-kind declaration tables
//!
//! Filled once while a module loads and read-only afterwards. A reload builds a
//! fresh registry instead of mutating a live one.

use crate::ast::{
    dispatch_key, Command, ContractDef, CronTask, EventHandler, Function, GraphQLOperation, GraphQLResolver,
    HttpMethod, Item, QueueWorker, Route, TypeDef,
};
use crate::environment::Environment;
use crate::error::RuntimeError;
use std::collections::HashMap;
use tracing::debug;

/// What happens when a second declaration uses a key that is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the load with [`RuntimeError::Duplicate`]
    #[default]
    Error,
    /// Keep the later declaration in place of the earlier one
    Overwrite,
}

/// Insertion-ordered table with unique string keys
#[derive(Debug, Clone)]
pub struct Table<T> {
    kind: &'static str,
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Table<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, key: String, item: T, policy: DuplicatePolicy) -> Result<(), RuntimeError> {
        match self.index.get(&key) {
            Some(&position) => match policy {
                DuplicatePolicy::Error => Err(RuntimeError::Duplicate {
                    kind: self.kind,
                    name: key,
                }),
                DuplicatePolicy::Overwrite => {
                    debug!(kind = self.kind, key = %key, "overwriting earlier declaration");
                    self.entries[position].1 = item;
                    Ok(())
                }
            },
            None => {
                debug!(kind = self.kind, key = %key, "registered");
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, item));
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Items in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Declarations of one loaded module, by kind
#[derive(Debug, Clone)]
pub struct Registry {
    pub types: Table<TypeDef>,
    pub routes: Table<Route>,
    pub functions: Table<Function>,
    pub commands: Table<Command>,
    pub cron_tasks: Table<CronTask>,
    pub event_handlers: Table<EventHandler>,
    pub queue_workers: Table<QueueWorker>,
    pub contracts: Table<ContractDef>,
    pub resolvers: Table<GraphQLResolver>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            types: Table::new("type"),
            routes: Table::new("route"),
            functions: Table::new("function"),
            commands: Table::new("command"),
            cron_tasks: Table::new("cron task"),
            event_handlers: Table::new("event handler"),
            queue_workers: Table::new("queue worker"),
            contracts: Table::new("contract"),
            resolvers: Table::new("resolver"),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration under its key. Imports and constants are not stored
    /// here; the interpreter binds them in the global environment.
    pub fn register(&mut self, item: &Item, policy: DuplicatePolicy) -> Result<(), RuntimeError> {
        match item {
            Item::TypeDef(def) => self.types.insert(def.name.clone(), def.clone(), policy),
            Item::Route(route) => self
                .routes
                .insert(route.dispatch_key(), route.clone(), policy)
                .map_err(|e| match e {
                    RuntimeError::Duplicate { kind, .. } => RuntimeError::Duplicate {
                        kind,
                        name: route.key(),
                    },
                    other => other,
                }),
            Item::Function(function) => {
                self.functions
                    .insert(function.name.clone(), function.clone(), policy)
            }
            Item::Command(command) => {
                self.commands
                    .insert(command.name.clone(), command.clone(), policy)
            }
            Item::CronTask(task) => {
                self.cron_tasks
                    .insert(task.key().to_string(), task.clone(), policy)
            }
            Item::EventHandler(handler) => {
                self.event_handlers
                    .insert(handler.event_type.clone(), handler.clone(), policy)
            }
            Item::QueueWorker(worker) => {
                self.queue_workers
                    .insert(worker.queue_name.clone(), worker.clone(), policy)
            }
            Item::Contract(contract) => {
                self.contracts
                    .insert(contract.name.clone(), contract.clone(), policy)
            }
            Item::Resolver(resolver) => {
                self.resolvers
                    .insert(resolver.key(), resolver.clone(), policy)
            }
            Item::Import(_) | Item::Const(_) => Ok(()),
        }
    }

    pub fn route(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        self.routes.get(&dispatch_key(method, path))
    }

    pub fn resolver(&self, operation: GraphQLOperation, field: &str) -> Option<&GraphQLResolver> {
        self.resolvers.get(&format!("{}.{}", operation, field))
    }

    /// Cron task by name, falling back to a match on the schedule string
    pub fn cron_task(&self, name_or_schedule: &str) -> Option<&CronTask> {
        self.cron_tasks
            .get(name_or_schedule)
            .or_else(|| self.cron_tasks.iter().find(|t| t.schedule == name_or_schedule))
    }

    /// Total number of registered declarations
    pub fn len(&self) -> usize {
        self.types.len()
            + self.routes.len()
            + self.functions.len()
            + self.commands.len()
            + self.cron_tasks.len()
            + self.event_handlers.len()
            + self.queue_workers.len()
            + self.contracts.len()
            + self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A loaded module's registry together with its global scope.
///
/// Functions exported from an imported module carry this so that their bodies
/// keep resolving names against the module they were declared in.
#[derive(Debug)]
pub struct ModuleScope {
    pub registry: Registry,
    pub globals: Environment,
}
