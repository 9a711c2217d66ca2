/// Work queued up while the manager lock is held and executed once it is
/// released. Backend calls and user callbacks both go through here so that
/// neither can re-enter the lock mid-mutation.
pub(crate) struct Effects {
    actions: Vec<Box<dyn FnOnce() + Send>>,
}

impl Effects {
    pub(crate) fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, action: impl FnOnce() + Send + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Runs everything in the order it was pushed.
    pub(crate) fn run(self) {
        for action in self.actions {
            action();
        }
    }
}
