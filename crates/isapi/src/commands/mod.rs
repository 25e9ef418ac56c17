//! Command dispatch: bridges CLI args -> client requests -> output formatting.

pub mod config_cmd;
pub mod download;
pub mod events;
pub mod get;
pub mod probe;
pub mod send;
pub mod status;

use isapi_api::{IsapiClient, Reply};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &IsapiClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(client, global).await,
        Command::Get(args) => get::handle(client, args, global).await,
        Command::Send(args) => send::handle(client, args, global).await,
        Command::Events(args) => events::handle(client, args, global).await,
        Command::Download(args) => download::handle(client, args).await,
        // Probe and Config are handled before dispatch
        Command::Probe | Command::Config(_) => unreachable!(),
    }
}

/// Print a buffered reply: documents in the chosen format, text verbatim.
fn print_reply(reply: Reply, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = match reply {
        Reply::Document(doc) => output::render_value(global.output, &doc)?,
        Reply::Text(text) => text,
        Reply::Events(events) => output::render_values(global.output, &events)?,
        Reply::Opaque(resp) => {
            return Err(CliError::Validation {
                field: "response".into(),
                reason: format!("unexpected binary response ({})", resp.status()),
            });
        }
    };
    output::print_output(&rendered);
    Ok(())
}
