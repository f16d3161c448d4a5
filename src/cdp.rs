/// Chrome DevTools Protocol page probe.
///
/// Attaches to a running Chromium (started with
/// `--remote-debugging-port`), selects the target page by URL fragment,
/// and implements the observe/click/reload capabilities by evaluating
/// small scripts in the page.
use crate::indicators::{self, NEXT_CYCLE_LABEL, SOLVING_LABEL, START_LABEL, STOP_LABEL};
use crate::observe::{Observation, PageProbe, ProbeError};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Raw page state gathered by the scraping script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapedState {
    stop_control: bool,
    next_cycle_text: Option<String>,
    solving_rows: Vec<String>,
}

pub struct CdpProbe {
    page: Page,
    // Dropping the Browser tears down the CDP connection, so the probe
    // keeps it alive alongside the spawned event loop.
    _browser: Browser,
    _handler: JoinHandle<()>,
}

impl CdpProbe {
    /// Connect to the browser and attach to the page whose URL contains
    /// `url_fragment` (any page when the fragment is empty).
    pub async fn connect(cdp_url: &str, url_fragment: &str) -> Result<Self, ProbeError> {
        let (browser, mut handler) =
            Browser::connect(cdp_url)
                .await
                .map_err(|e| ProbeError::Connect {
                    url: cdp_url.to_string(),
                    source: e,
                })?;

        // The handler task drives the websocket for the life of the probe.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let pages = browser.pages().await.map_err(|e| ProbeError::Connect {
            url: cdp_url.to_string(),
            source: e,
        })?;

        let mut selected = None;
        for page in pages {
            let url = page
                .url()
                .await
                .map_err(|e| ProbeError::Eval { source: e })?
                .unwrap_or_default();
            if url_fragment.is_empty() || url.contains(url_fragment) {
                selected = Some((page, url));
                break;
            }
        }
        let (page, url) = selected.ok_or_else(|| ProbeError::NoMatchingPage {
            fragment: url_fragment.to_string(),
        })?;

        info!(%url, "attached to page");
        Ok(Self {
            page,
            _browser: browser,
            _handler: handler_task,
        })
    }
}

/// Script returning the visible state the watchdog cares about:
/// stop-control presence, the next-cycle indicator text, and the texts
/// of rows matching the solving pattern.
fn observe_script() -> String {
    format!(
        r#"(() => {{
            const visible = (el) => el.getClientRects().length > 0;
            const label = (el) => ((el.innerText || el.value || '') + '').trim();
            const controls = Array.from(
                document.querySelectorAll('button, input[type="button"], input[type="submit"]'));
            const stopControl = controls.some(
                (el) => visible(el) && label(el).includes({stop:?}));
            const candidates = Array.from(document.querySelectorAll('div, span, p, td'))
                .filter((el) => visible(el) && el.innerText && el.innerText.includes({next:?}));
            candidates.sort((a, b) => a.innerText.length - b.innerText.length);
            const nextCycleText = candidates.length ? candidates[0].innerText : null;
            const solvingRows = Array.from(document.querySelectorAll('tr'))
                .filter((el) => visible(el) && el.innerText.includes({solving:?}))
                .map((el) => el.innerText);
            return {{ stopControl, nextCycleText, solvingRows }};
        }})()"#,
        stop = STOP_LABEL,
        next = NEXT_CYCLE_LABEL,
        solving = SOLVING_LABEL,
    )
}

/// Script clicking the first visible button whose label contains the
/// start text. Returns whether such a button was found.
fn press_start_script() -> String {
    format!(
        r#"(() => {{
            const visible = (el) => el.getClientRects().length > 0;
            const label = (el) => ((el.innerText || el.value || '') + '').trim();
            const button = Array.from(
                document.querySelectorAll('button, input[type="button"], input[type="submit"]'))
                .find((el) => visible(el) && label(el).includes({start:?}));
            if (button) {{
                button.click();
                return true;
            }}
            return false;
        }})()"#,
        start = START_LABEL,
    )
}

#[async_trait]
impl PageProbe for CdpProbe {
    async fn observe(&self) -> Result<Observation, ProbeError> {
        let result = self
            .page
            .evaluate(observe_script())
            .await
            .map_err(|e| ProbeError::Eval { source: e })?;
        let value = result.value().ok_or_else(|| ProbeError::Payload {
            message: "evaluation returned no value".to_string(),
        })?;
        let scraped: ScrapedState =
            serde_json::from_value(value.clone()).map_err(|e| ProbeError::Payload {
                message: e.to_string(),
            })?;

        debug!(
            stop_control = scraped.stop_control,
            solving_rows = scraped.solving_rows.len(),
            "page observed"
        );
        Ok(Observation {
            stop_control: scraped.stop_control,
            next_cycle: scraped
                .next_cycle_text
                .as_deref()
                .and_then(indicators::parse_countdown),
            solving: indicators::solving_indicator(&scraped.solving_rows),
        })
    }

    async fn press_start(&self) -> Result<bool, ProbeError> {
        let result = self
            .page
            .evaluate(press_start_script())
            .await
            .map_err(|e| ProbeError::Eval { source: e })?;
        let clicked = result
            .value()
            .and_then(|v| v.as_bool())
            .ok_or_else(|| ProbeError::Payload {
                message: "expected a boolean from the click script".to_string(),
            })?;

        if clicked {
            info!("clicked start control");
        } else {
            debug!("no start control visible");
        }
        Ok(clicked)
    }

    async fn reload(&self) -> Result<(), ProbeError> {
        info!("reloading page");
        self.page
            .reload()
            .await
            .map_err(|e| ProbeError::Reload { source: e })?;
        Ok(())
    }
}
