//! `isapi download`: stream an opaque response body to a file.

use tokio::io::AsyncWriteExt;
use tracing::info;

use isapi_api::{IsapiClient, RequestOptions};

use crate::cli::DownloadArgs;
use crate::error::CliError;

pub async fn handle(client: &IsapiClient, args: DownloadArgs) -> Result<(), CliError> {
    let mut options = RequestOptions::get().opaque();
    options.query = args.query;

    let reply = client.resource(args.segments).invoke(options).await?;
    let Some(mut response) = reply.into_response() else {
        return Err(CliError::Validation {
            field: "response".into(),
            reason: "device did not return a body stream".into(),
        });
    };

    // Opaque replies are not status-checked by the client.
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::DeviceStatus {
            status: status.as_u16(),
            body,
        });
    }

    let mut file = tokio::fs::File::create(&args.out).await?;
    let mut written = 0usize;
    let cancel = client.cancellation_token();
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CliError::Interrupted),
            chunk = response.chunk() => chunk?,
        };
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    info!(bytes = written, path = %args.out.display(), "download complete");
    eprintln!("Saved {written} bytes to {}", args.out.display());
    Ok(())
}
