use crate::checkpoint::{bundle_cell_path, bundle_script, BUNDLE_SCRIPT};
use crate::error::{OracleError, Result};
use crate::report::{self, RouteStatusResult};
use contest_common::util::config::OracleConfig;
use reqwest::StatusCode;
use reqwest::blocking::{Body, Client};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Route status service reached over HTTP. A plain checkpoint is sent as
/// the request body; designs with encrypted cells are sent as an
/// uncompressed tar bundle to `<url><bundle suffix>`.
pub struct RemoteOracle {
    url: String,
    bundle_suffix: String,
    user: String,
    password: String,
    client: Client,
}

impl RemoteOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| OracleError::Unavailable("no endpoint URL configured".to_string()))?;
        let auth = config
            .auth
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| OracleError::Auth("no credential configured".to_string()))?;
        let (user, password) = auth
            .split_once(':')
            .ok_or_else(|| OracleError::Auth("credential must be 'user:password'".to_string()))?;

        // The service answers once the tool is done; no client-side timeout.
        let client = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            url,
            bundle_suffix: config.bundle_suffix.clone(),
            user: user.to_string(),
            password: password.to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn check(&self, checkpoint: &Path, encrypted_cells: &[PathBuf]) -> Result<RouteStatusResult> {
        let (url, body, producer) = if encrypted_cells.is_empty() {
            (self.url.clone(), Body::from(File::open(checkpoint)?), None)
        } else {
            let (body, producer) = bundle_body(checkpoint, encrypted_cells)?;
            (
                format!("{}{}", self.url, self.bundle_suffix),
                body,
                Some(producer),
            )
        };
        log::info!("Uploading {:?} to {}", checkpoint, url);

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.user, Some(&self.password))
            .body(body)
            .send()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if let Some(producer) = producer {
            producer
                .join()
                .map_err(|_| OracleError::Io(io::Error::other("bundle writer panicked")))??;
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(OracleError::Auth(format!("{} rejected the credential ({})", url, status)));
        }
        if !status.is_success() {
            return Err(OracleError::HttpStatus(status.as_u16()));
        }
        let text = response
            .text()
            .map_err(|e| OracleError::Network(e.to_string()))?;
        report::parse(&text)
    }
}

/// Streams the bundle into the request body from a writer thread, so the
/// archive is never held in memory.
fn bundle_body(
    checkpoint: &Path,
    encrypted_cells: &[PathBuf],
) -> Result<(Body, JoinHandle<io::Result<()>>)> {
    let (reader, writer) = io::pipe()?;
    let checkpoint = checkpoint.to_path_buf();
    let cells = encrypted_cells.to_vec();
    let producer = thread::spawn(move || write_bundle(writer, &checkpoint, &cells));
    Ok((Body::new(reader), producer))
}

/// Writes `<checkpoint>`, the load script and `edn/<cell>` entries as an
/// uncompressed tar stream.
pub fn write_bundle<W: Write>(out: W, checkpoint: &Path, encrypted_cells: &[PathBuf]) -> io::Result<()> {
    let name = checkpoint
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::other(format!("bad checkpoint path {:?}", checkpoint)))?;
    let script = bundle_script(&name, encrypted_cells);

    let mut builder = tar::Builder::new(out);
    builder.append_path_with_name(checkpoint, &name)?;

    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, BUNDLE_SCRIPT, script.as_bytes())?;

    for cell in encrypted_cells {
        builder.append_path_with_name(cell, bundle_cell_path(cell))?;
    }
    builder.into_inner()?.flush()
}
