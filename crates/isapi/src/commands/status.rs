//! `isapi status`: the endpoint negotiation probes.

use isapi_api::session::STATUS_PROBE;
use isapi_api::{IsapiClient, RequestOptions};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(client: &IsapiClient, global: &GlobalOpts) -> Result<(), CliError> {
    let reply = client
        .resource(STATUS_PROBE)
        .invoke(RequestOptions::get())
        .await?;
    super::print_reply(reply, global)
}
