//! Status page handler.
//!
//! This module provides the `/` endpoint handler that renders the local
//! hostname and the current time.

use axum::{
    extract::State,
    response::Html,
};
use chrono::Local;
use std::io;
use tracing::{debug, instrument};

use crate::error::HandlerError;
use crate::state::SharedState;

/// Timestamp format shown on the status page.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Hostname of the local machine.
pub fn system_hostname() -> io::Result<String> {
    nix::unistd::gethostname()
        .map_err(io::Error::from)?
        .into_string()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hostname is not valid UTF-8"))
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> Result<Html<String>, HandlerError> {
    debug!("Processing / request");

    let hostname = (state.hostname)()?;
    let current_time = Local::now().format(TIME_FORMAT).to_string();

    Ok(Html(render_status_page(&hostname, &current_time)))
}

fn render_status_page(hostname: &str, current_time: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Status</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 700px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
        }}
        a {{ color: #007bff; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Server Status</h1>
        <div class="info">
            <p><strong>Hostname:</strong> <span id="hostname">{hostname}</span></p>
            <p><strong>Current time:</strong> <span id="current-time">{current_time}</span></p>
        </div>
        <p><a href="/health">/health</a> &middot; <a href="/metrics">/metrics</a></p>
    </div>
</body>
</html>
"#,
        hostname = escape_html(hostname),
        current_time = current_time,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
