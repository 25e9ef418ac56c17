//! `isapi send`: PUT / POST / DELETE with an optional body file.

use std::str::FromStr;

use isapi_api::{IsapiClient, Method, RequestOptions};

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;

pub async fn handle(
    client: &IsapiClient,
    args: SendArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let method = parse_method(&args.method)?;

    let mut options = RequestOptions::new(method);
    options.query = args.query;
    if let Some(ref path) = args.body {
        options = options.body(tokio::fs::read(path).await?);
    }
    if args.text {
        options = options.text();
    }

    let reply = client.resource(args.segments).invoke(options).await?;
    super::print_reply(reply, global)
}

fn parse_method(raw: &str) -> Result<Method, CliError> {
    Method::from_str(&raw.to_ascii_uppercase()).map_err(|_| CliError::Validation {
        field: "method".into(),
        reason: format!("'{raw}' is not an HTTP method"),
    })
}
