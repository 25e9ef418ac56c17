//! `isapi get`: buffered GET of any endpoint.

use isapi_api::{IsapiClient, RequestOptions};

use crate::cli::{GetArgs, GlobalOpts};
use crate::error::CliError;

pub async fn handle(
    client: &IsapiClient,
    args: GetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut options = RequestOptions::get();
    options.query = args.query;
    if args.text {
        options = options.text();
    }

    let reply = client.resource(args.segments).invoke(options).await?;
    super::print_reply(reply, global)
}
