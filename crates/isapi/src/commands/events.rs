//! `isapi events`: collect events from a multipart alert stream.

use isapi_api::{IsapiClient, RequestOptions};
use tracing::info;

use crate::cli::{EventsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &IsapiClient,
    args: EventsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(count) = args.count {
        client.set_event_count(count);
    }
    info!(count = client.event_count(), "waiting for events");

    let events = client
        .resource(args.segments)
        .invoke(RequestOptions::get().stream())
        .await?
        .into_events()
        .unwrap_or_default();

    output::print_output(&output::render_values(global.output, &events)?);
    Ok(())
}
