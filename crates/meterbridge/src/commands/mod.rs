//! Command dispatch: bridges CLI args -> core operations -> output.

pub mod configure;
pub mod fetch;
pub mod run;
pub mod show;
pub mod storage;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(global).await,
        Command::Configure(args) => configure::handle(args, global).await,
        Command::Show => show::handle(global),
        Command::Fetch(args) => fetch::handle(&args, global).await,
        Command::Backup => storage::backup(global),
        Command::Restore => storage::restore(global),
        Command::Export(args) => storage::export(&args, global),
        Command::Import(args) => storage::import(&args, global),
        Command::Clear => storage::clear(global),
    }
}
