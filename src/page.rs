use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// html served for every non-data request
///
/// opaque to the request loop: it only writes the bytes out in chunks.
#[derive(Clone, Debug)]
pub struct StaticPage {
    body: Arc<str>,
}

impl StaticPage {
    pub fn builtin() -> Self {
        Self {
            body: Arc::from(DASHBOARD_HTML),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let body = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read page {}", path.as_ref().display()))?;
        Ok(Self { body: Arc::from(body) })
    }

    /// configured file if given and readable, built-in page otherwise
    pub fn from_config(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("{:#} - serving built-in page", e);
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }
}

// polls /data once a second; green status while motion is detected
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Motion Detector</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        h1 { font-size: 2em; font-weight: bold; text-align: center; }
        h2 { text-align: center; }
        #motion_status { color: red; }
    </style>
    <script>
        async function updateData() {
            try {
                const response = await fetch('/data');
                const data = await response.json();
                const status = document.getElementById('motion_status');
                status.innerText = data.motion_status;
                status.style.color = (data.motion_status === "MOTION DETECTED!!") ? "green" : "red";
                document.getElementById('distance').innerText = data.distance + " meters";
            } catch (error) {
                console.error('Error fetching motion data:', error);
            }
        }
        setInterval(updateData, 1000);
    </script>
</head>
<body>
    <h1>MOTION DETECTOR</h1>
    <h2 id="motion_status">Initializing...</h2>
    <h2>Distance: <span id="distance">Unknown meters</span></h2>
</body>
</html>"#;
