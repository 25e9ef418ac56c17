//! `isapi probe`: one-shot device health report.
//!
//! Connection and the status endpoint are mandatory; if either fails the
//! report carries `"status": "ERROR"` and the message instead of the
//! command failing. Device time and camera channels are best effort.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use isapi_api::session::STATUS_PROBE;
use isapi_api::{ClientConfig, Error, IsapiClient, RequestOptions, Value};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const TIME_PATH: [&str; 2] = ["System", "time"];
const CHANNELS_PATH: [&str; 4] = ["System", "Video", "inputs", "channels"];

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
enum ProbeStatus {
    Online,
    Error,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_method: Option<String>,
    device_info: DeviceInfo,
    camera_info: CameraInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceInfo {
    /// Device clock as reported by `System/time`, empty if unavailable.
    dvr_time: String,
    checked_at: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct CameraInfo {
    total_cameras: usize,
    camera_status: Vec<CameraStatus>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct CameraStatus {
    number: String,
    status: &'static str,
}

pub async fn handle(
    config: ClientConfig,
    cancel: CancellationToken,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let checked_at = chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let report = match probe(config, cancel).await {
        Ok((auth_method, dvr_time, camera_info)) => ProbeReport {
            status: ProbeStatus::Online,
            error: None,
            auth_method: Some(auth_method),
            device_info: DeviceInfo {
                dvr_time,
                checked_at,
            },
            camera_info,
        },
        Err(Error::Cancelled) => return Err(CliError::Interrupted),
        Err(e) => {
            warn!(error = %e, "probe failed");
            ProbeReport {
                status: ProbeStatus::Error,
                error: Some(e.to_string()),
                auth_method: None,
                device_info: DeviceInfo {
                    dvr_time: String::new(),
                    checked_at,
                },
                camera_info: CameraInfo::default(),
            }
        }
    };

    let compact = matches!(global.output, OutputFormat::JsonCompact);
    output::print_output(&output::render_json(&report, compact)?);
    Ok(())
}

async fn probe(
    config: ClientConfig,
    cancel: CancellationToken,
) -> Result<(String, String, CameraInfo), Error> {
    let client = IsapiClient::connect_with_cancel(config, cancel).await?;

    client
        .resource(STATUS_PROBE)
        .invoke(RequestOptions::get())
        .await?;

    let dvr_time = match optional(&client, &TIME_PATH).await? {
        Some(doc) => doc
            .pointer("Time/localTime")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        None => String::new(),
    };

    let camera_info = optional(&client, &CHANNELS_PATH)
        .await?
        .map(|doc| camera_info(&doc))
        .unwrap_or_default();

    Ok((client.auth_method().to_string(), dvr_time, camera_info))
}

/// GET a best-effort endpoint. Only cancellation is fatal.
async fn optional(client: &IsapiClient, path: &[&str]) -> Result<Option<Value>, Error> {
    match client
        .resource(path.iter().copied())
        .invoke(RequestOptions::get())
        .await
    {
        Ok(reply) => Ok(reply.into_document()),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(e) => {
            warn!(path = %path.join("/"), error = %e, "optional probe step failed");
            Ok(None)
        }
    }
}

fn camera_info(doc: &Value) -> CameraInfo {
    let channels = doc
        .pointer("VideoInputChannelList/VideoInputChannel")
        .map(Value::as_list)
        .unwrap_or_default();

    let camera_status = channels
        .iter()
        .filter_map(|channel| {
            let number = channel.get("id")?.as_str()?.to_owned();
            let enabled = channel
                .get("enabled")
                .or_else(|| channel.get("videoInputEnabled"))
                .and_then(Value::as_str)
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            Some(CameraStatus {
                number,
                status: if enabled { "Working" } else { "Not Working" },
            })
        })
        .collect();

    CameraInfo {
        total_cameras: channels.len(),
        camera_status,
    }
}
