use crate::migrate::change_set::ChangeSet;
use crate::migrate::Direction;
use crate::Result;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type HookFn = dyn (Fn(&mut ChangeSet) -> Result<()>) + Send + Sync;
pub type MigrateFn = dyn (Fn(&mut ChangeSet, Direction) -> Result<()>) + Send + Sync;
pub type PostHookFn = dyn (Fn(&ChangeSet) -> Result<()>) + Send + Sync;

/// A single migration step.
///
/// A migration declares its changes through hooks. A direction-specific body
/// (`up` or `down`) takes precedence over the generic `migrate` body, which is
/// written once in its "up" form and replayed inverted when going down.
/// Pre hooks record into the same change set as the body; post hooks run after
/// the changes have been processed and can only inspect them.
#[derive(Clone)]
pub struct Migration {
    description: String,
    up: Option<Arc<HookFn>>,
    down: Option<Arc<HookFn>>,
    migrate: Option<Arc<MigrateFn>>,
    pre_up: Option<Arc<HookFn>>,
    post_up: Option<Arc<PostHookFn>>,
    pre_down: Option<Arc<HookFn>>,
    post_down: Option<Arc<PostHookFn>>,
}

impl Migration {
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
            up: None,
            down: None,
            migrate: None,
            pre_up: None,
            post_up: None,
            pre_down: None,
            post_down: None,
        }
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn up<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(hook));
        self
    }

    pub fn down<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(hook));
        self
    }

    pub fn migrate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChangeSet, Direction) -> Result<()> + Send + Sync + 'static,
    {
        self.migrate = Some(Arc::new(hook));
        self
    }

    pub fn pre_up<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.pre_up = Some(Arc::new(hook));
        self
    }

    pub fn post_up<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.post_up = Some(Arc::new(hook));
        self
    }

    pub fn pre_down<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.pre_down = Some(Arc::new(hook));
        self
    }

    pub fn post_down<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ChangeSet) -> Result<()> + Send + Sync + 'static,
    {
        self.post_down = Some(Arc::new(hook));
        self
    }

    pub(crate) fn get_pre_hook(&self, direction: Direction) -> Option<&HookFn> {
        match direction {
            Direction::Up => self.pre_up.as_deref(),
            Direction::Down => self.pre_down.as_deref(),
        }
    }

    pub(crate) fn get_hook(&self, direction: Direction) -> Option<&HookFn> {
        match direction {
            Direction::Up => self.up.as_deref(),
            Direction::Down => self.down.as_deref(),
        }
    }

    pub(crate) fn get_migrate_hook(&self) -> Option<&MigrateFn> {
        self.migrate.as_deref()
    }

    pub(crate) fn get_post_hook(&self, direction: Direction) -> Option<&PostHookFn> {
        match direction {
            Direction::Up => self.post_up.as_deref(),
            Direction::Down => self.post_down.as_deref(),
        }
    }

    /// Whether the migration declares anything for the given direction.
    pub fn supports(&self, direction: Direction) -> bool {
        self.get_hook(direction).is_some() || self.migrate.is_some()
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("description", &self.description)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .field("migrate", &self.migrate.is_some())
            .finish_non_exhaustive()
    }
}
