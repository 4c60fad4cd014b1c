//! HTTP control client for Yamaha AV receivers.
//!
//! The receiver speaks a small XML dialect posted to a single control
//! endpoint. Responses are shallow, so values are pulled out by tag name
//! instead of building a document tree.

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use crate::error::DeviceError;

const CONTROL_PATH: &str = "/YamahaRemoteControl/ctrl";

const GET_SYSTEM_CONFIG: &str =
    r#"<YAMAHA_AV cmd="GET"><System><Config>GetParam</Config></System></YAMAHA_AV>"#;
const GET_BASIC_STATUS: &str =
    r#"<YAMAHA_AV cmd="GET"><Main_Zone><Basic_Status>GetParam</Basic_Status></Main_Zone></YAMAHA_AV>"#;
const AIRPLAY_PLAY: &str = r#"<YAMAHA_AV cmd="PUT"><AirPlay><Play_Control><Playback>Play</Playback></Play_Control></AirPlay></YAMAHA_AV>"#;

/// Identification returned by `System/Config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    pub model_name: String,
    pub system_id: String,
}

/// Subset of `Main_Zone/Basic_Status` the proxy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicStatus {
    pub power_on: bool,
    /// Volume in tenths of a dB, as reported by the receiver.
    pub volume_tenths: i32,
}

impl BasicStatus {
    pub fn volume_db(&self) -> f64 {
        f64::from(self.volume_tenths) / 10.0
    }
}

/// Receiver control client.
#[derive(Debug, Clone)]
pub struct YamahaClient {
    http: reqwest::Client,
    base_url: String,
}

impl YamahaClient {
    /// Client for the receiver at `host` (port 80).
    pub fn new(http: reqwest::Client, host: &str) -> Self {
        Self {
            http,
            base_url: format!("http://{host}"),
        }
    }

    /// Overrides the base URL (tests and non-standard ports).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Posts a control document and returns the response body.
    pub async fn send_xml(&self, body: &str) -> Result<String, DeviceError> {
        let url = format!("{}{CONTROL_PATH}", self.base_url);
        trace!(%url, body, "receiver request");
        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body.to_string())
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeviceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        match response_code(&text) {
            Some(rc) if rc != "0" => Err(DeviceError::Rejected(rc.to_string())),
            _ => Ok(text),
        }
    }

    pub async fn system_config(&self) -> Result<SystemConfig, DeviceError> {
        let body = self.send_xml(GET_SYSTEM_CONFIG).await?;
        let config = element(&body, &["Config"]).unwrap_or(&body);
        Ok(SystemConfig {
            model_name: required(config, &["Model_Name"], "Model_Name")?.to_string(),
            system_id: required(config, &["System_ID"], "System_ID")?.to_string(),
        })
    }

    pub async fn basic_status(&self) -> Result<BasicStatus, DeviceError> {
        let body = self.send_xml(GET_BASIC_STATUS).await?;
        parse_basic_status(&body)
    }

    pub async fn is_on(&self) -> Result<bool, DeviceError> {
        Ok(self.basic_status().await?.power_on)
    }

    pub async fn power_on(&self) -> Result<(), DeviceError> {
        debug!(receiver = %self.base_url, "power on");
        self.send_xml(&main_zone_put("<Power_Control><Power>On</Power></Power_Control>"))
            .await
            .map(drop)
    }

    pub async fn power_off(&self) -> Result<(), DeviceError> {
        debug!(receiver = %self.base_url, "power off");
        self.send_xml(&main_zone_put(
            "<Power_Control><Power>Standby</Power></Power_Control>",
        ))
        .await
        .map(drop)
    }

    /// Sets the main zone volume, in tenths of a dB.
    pub async fn set_volume_to(&self, tenths: i32) -> Result<(), DeviceError> {
        debug!(receiver = %self.base_url, tenths, "set volume");
        self.send_xml(&main_zone_put(&format!(
            "<Volume><Lvl><Val>{tenths}</Val><Exp>1</Exp><Unit>dB</Unit></Lvl></Volume>"
        )))
        .await
        .map(drop)
    }

    pub async fn set_main_input_to(&self, input: &str) -> Result<(), DeviceError> {
        debug!(receiver = %self.base_url, input, "select input");
        self.send_xml(&main_zone_put(&format!(
            "<Input><Input_Sel>{}</Input_Sel></Input>",
            escape_text(input)
        )))
        .await
        .map(drop)
    }

    pub async fn airplay_play(&self) -> Result<(), DeviceError> {
        self.send_xml(AIRPLAY_PLAY).await.map(drop)
    }
}

fn main_zone_put(inner: &str) -> String {
    format!(r#"<YAMAHA_AV cmd="PUT"><Main_Zone>{inner}</Main_Zone></YAMAHA_AV>"#)
}

pub(crate) fn parse_basic_status(body: &str) -> Result<BasicStatus, DeviceError> {
    let power = required(body, &["Power_Control", "Power"], "Power")?;
    let val = required(body, &["Volume", "Lvl", "Val"], "Val")?;
    let volume_tenths = val.parse().map_err(|_| DeviceError::InvalidValue {
        element: "Val",
        value: val.to_string(),
    })?;
    Ok(BasicStatus {
        power_on: power == "On",
        volume_tenths,
    })
}

fn required<'a>(
    doc: &'a str,
    path: &[&str],
    name: &'static str,
) -> Result<&'a str, DeviceError> {
    element(doc, path).ok_or(DeviceError::MissingElement(name))
}

/// Text content of the element reached by following `path` tag by tag.
pub(crate) fn element<'a>(doc: &'a str, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(doc, |scope, tag| inner_text(scope, tag))
        .map(str::trim)
}

fn inner_text<'a>(doc: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut from = 0;
    loop {
        let start = from + doc[from..].find(&open)?;
        let after_name = start + open.len();
        // Reject prefixes such as <Power_Control> when looking for <Power>.
        match doc[after_name..].chars().next() {
            Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r') => {}
            _ => {
                from = after_name;
                continue;
            }
        }
        let body_start = after_name + doc[after_name..].find('>')? + 1;
        let body_end = body_start + doc[body_start..].find(&close)?;
        return Some(&doc[body_start..body_end]);
    }
}

/// Value of the `RC` attribute on the root element, if present.
fn response_code(doc: &str) -> Option<&str> {
    let root_end = doc.find("<YAMAHA_AV").and_then(|i| doc[i..].find('>').map(|j| i + j))?;
    let root = &doc[..root_end];
    let rc = root.find("RC=\"")? + 4;
    let len = root[rc..].find('"')?;
    Some(&root[rc..rc + len])
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
