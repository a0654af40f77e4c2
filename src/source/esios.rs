// Wind generation from the REE ESIOS API, indicator 540.
// https://api.esios.ree.es/

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use flate2::{write::GzEncoder, Compression};
use jiff::Timestamp;
use log::{info, warn};
use reqwest::{
    blocking::Client,
    header::{ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use serde::Deserialize;

use crate::{
    config::WindConfig,
    interval::granularity::Granularity,
    source::{DataSource, FetchError},
    timeseries::series::Sample,
};

pub struct EsiosClient {
    endpoint: String,
    credential: String,
    client: Client,
    raw_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    indicator: Indicator,
}

#[derive(Debug, Deserialize)]
struct Indicator {
    #[serde(default)]
    values: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    value: Option<f64>,
    datetime: Option<String>,
    datetime_utc: Option<String>,
}

/// The `time_trunc` query parameter for this granularity, if ESIOS offers it.
pub fn time_trunc(granularity: Granularity) -> Option<&'static str> {
    match granularity.minutes() {
        5 => Some("five_minutes"),
        10 => Some("ten_minutes"),
        15 => Some("quarter-hour"),
        60 => Some("hour"),
        _ => None,
    }
}

/// Parse the body of an indicator response.  Values come back with their UTC
/// timestamp and with a local one, prefer the UTC field when present.
pub fn parse_values(body: &str) -> Result<Vec<Sample>, FetchError> {
    let payload: Payload = serde_json::from_str(body)
        .map_err(|e| FetchError::Transient(format!("unreadable payload: {e}")))?;
    let mut out = Vec::with_capacity(payload.indicator.values.len());
    for v in payload.indicator.values {
        let text = match v.datetime_utc.as_deref().or(v.datetime.as_deref()) {
            Some(text) => text,
            None => return Err(FetchError::Transient("value without a datetime".into())),
        };
        let timestamp = text
            .parse::<Timestamp>()
            .map_err(|e| FetchError::Transient(format!("bad datetime {text:?}: {e}")))?;
        out.push(Sample::new(timestamp, v.value));
    }
    Ok(out)
}

impl EsiosClient {
    pub fn new(endpoint: &str, credential: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(EsiosClient {
            endpoint: endpoint.to_string(),
            credential: credential.to_string(),
            client,
            raw_dir: None,
        })
    }

    pub fn from_config(config: &WindConfig) -> Result<Self, reqwest::Error> {
        EsiosClient::new(
            &config.source_endpoint,
            &config.credential,
            config.http_timeout,
        )
    }

    /// Keep a gzipped copy of every response body under this directory.
    pub fn with_raw_archive(mut self, dir: PathBuf) -> Self {
        self.raw_dir = Some(dir);
        self
    }

    /// Return the json filename for a request.  Does not check if the file exists.
    pub fn raw_filename(dir: &Path, start: Timestamp, end: Timestamp) -> PathBuf {
        dir.join(start.strftime("%Y").to_string()).join(format!(
            "wind_{}_{}.json",
            start.strftime("%Y%m%dT%H%M"),
            end.strftime("%Y%m%dT%H%M")
        ))
    }

    fn archive_raw(&self, dir: &Path, start: Timestamp, end: Timestamp, body: &str) -> std::io::Result<PathBuf> {
        let mut path = EsiosClient::raw_filename(dir, start, end).into_os_string();
        path.push(".gz");
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        encoder.write_all(body.as_bytes())?;
        encoder.finish()?;
        Ok(path)
    }
}

impl DataSource for EsiosClient {
    fn fetch(
        &self,
        start: Timestamp,
        end: Timestamp,
        granularity: Granularity,
    ) -> Result<Vec<Sample>, FetchError> {
        let trunc = time_trunc(granularity).ok_or_else(|| {
            FetchError::Transient(format!("ESIOS has no {granularity} resolution"))
        })?;
        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.credential)
            .query(&[
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("time_trunc", trunc.to_string()),
            ])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Transient(format!("request timed out: {e}"))
                } else {
                    FetchError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        let body = response
            .text()
            .map_err(|e| FetchError::Transient(format!("invalid body: {e}")))?;

        if let Some(dir) = &self.raw_dir {
            match self.archive_raw(dir, start, end, &body) {
                Ok(path) => info!("saved raw response to {}", path.display()),
                Err(e) => warn!("could not save raw response for {start} -> {end}: {e}"),
            }
        }

        parse_values(&body)
    }
}
