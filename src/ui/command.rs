use std::future::Future;
use std::pin::Pin;

use crate::ui::element::FocusId;

/// Side effects produced by an `update` step, executed by the driving loop.
pub enum Command<Msg> {
    /// Do nothing
    None,

    /// Execute multiple commands in sequence
    Batch(Vec<Command<Msg>>),

    /// Perform an async operation and feed the result back as a message
    Perform(Pin<Box<dyn Future<Output = Msg> + Send>>),

    /// Set focus to a specific element
    SetFocus(FocusId),
}

impl<Msg> Command<Msg> {
    /// Wrap an async operation, mapping its output into a message.
    pub fn perform<F, T>(future: F, to_msg: impl FnOnce(T) -> Msg + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        Msg: Send + 'static,
    {
        Command::Perform(Box::pin(async move {
            let result = future.await;
            to_msg(result)
        }))
    }

    pub fn batch(commands: Vec<Command<Msg>>) -> Self {
        Command::Batch(commands)
    }

    pub fn set_focus(id: FocusId) -> Self {
        Command::SetFocus(id)
    }

    /// Flatten this command into its leaf commands.
    pub fn into_leaves(self) -> Vec<Command<Msg>> {
        match self {
            Command::None => Vec::new(),
            Command::Batch(cmds) => cmds.into_iter().flat_map(Command::into_leaves).collect(),
            other => vec![other],
        }
    }
}

impl<Msg> Default for Command<Msg> {
    fn default() -> Self {
        Command::None
    }
}
