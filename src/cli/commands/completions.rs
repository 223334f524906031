//! Shell completions generation.
//!
//! The `bootkit completions` command generates shell completion scripts.

use async_trait::async_trait;
use clap::CommandFactory;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, CompletionsArgs};
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};

/// The completions command implementation.
pub struct CompletionsCommand {
    args: CompletionsArgs,
}

impl CompletionsCommand {
    /// Create a new completions command.
    pub fn new(args: CompletionsArgs) -> Self {
        Self { args }
    }

    fn write_to(&self, buf: &mut dyn std::io::Write) {
        let mut cmd = Cli::command();
        clap_complete::generate(self.args.shell, &mut cmd, "bootkit", buf);
    }
}

#[async_trait]
impl Command for CompletionsCommand {
    async fn execute(
        &self,
        _out: &Output,
        _token: &CancellationToken,
    ) -> crate::error::Result<CommandResult> {
        self.write_to(&mut std::io::stdout());
        Ok(CommandResult::success())
    }
}
