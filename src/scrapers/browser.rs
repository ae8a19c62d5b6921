use crate::config::{BrowserConfig, SearchConfig};
use crate::extract::{CapturedResponse, NetworkCollector};
use crate::scrapers::traits::{LivePage, PageSource};
use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const CAPTURE_HANDLER: &str = "listing-capture";

/// Page source backed by one headless Chrome instance for the whole run
pub struct ChromePageSource {
    browser: Browser,
    config: BrowserConfig,
}

impl ChromePageSource {
    /// Launch the browser
    pub fn new(config: BrowserConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, config })
    }

    fn dismiss_consent(&self, tab: &Tab) {
        if self.config.consent_button_text.is_empty() {
            return;
        }
        if tab
            .wait_for_element_with_custom_timeout("button", self.config.consent_timeout())
            .is_err()
        {
            debug!("No buttons rendered, skipping cookie banner");
            return;
        }

        let label = match serde_json::to_string(&self.config.consent_button_text) {
            Ok(label) => label,
            Err(_) => return,
        };
        let script = format!(
            r#"
            (() => {{
                const button = [...document.querySelectorAll('button')]
                    .find(b => b.textContent.includes({label}));
                if (button) {{ button.click(); return true; }}
                return false;
            }})()
            "#
        );

        match tab.evaluate(&script, false) {
            Ok(result) if result.value.as_ref().and_then(|v| v.as_bool()) == Some(true) => {
                info!("Cookie banner accepted");
                thread::sleep(Duration::from_secs(1));
            }
            Ok(_) => debug!("Cookie banner not found or already accepted"),
            Err(e) => debug!("Cookie banner check failed: {}", e),
        }
    }
}

impl PageSource for ChromePageSource {
    type Page = ChromePage;

    fn acquire(&self, search: &SearchConfig) -> Result<ChromePage> {
        info!("Opening search page {}", search.url);
        let tab = self.browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(self.config.content_timeout());

        // Registered before navigation so the initial payloads are seen
        let collector = NetworkCollector::new(self.config.min_json_body_bytes);
        let hook = collector.clone();
        tab.register_response_handling(
            CAPTURE_HANDLER,
            Box::new(
                move |params: ResponseReceivedEventParams,
                      fetch_body: &dyn Fn() -> Result<GetResponseBodyReturnObject>| {
                    let content_type = params.response.mime_type.clone();
                    if !hook.wants(&content_type) {
                        return;
                    }
                    match fetch_body() {
                        Ok(body) if !body.base_64_encoded => hook.record(CapturedResponse {
                            url: params.response.url.clone(),
                            content_type,
                            body: body.body,
                        }),
                        Ok(_) => debug!("Skipping base64 body from {}", params.response.url),
                        Err(e) => debug!("No body for {}: {}", params.response.url, e),
                    }
                },
            ),
        )
        .context("Failed to register response capture")?;

        tab.navigate_to(&search.url)
            .with_context(|| format!("Failed to navigate to {}", search.url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not finish", search.url))?;

        self.dismiss_consent(&tab);

        match tab.wait_for_element_with_custom_timeout(
            &self.config.content_selector,
            self.config.content_timeout(),
        ) {
            Ok(_) => info!("Listing cards rendered"),
            Err(e) => warn!(
                "Listing cards did not appear within {}s, continuing with what rendered: {}",
                self.config.content_timeout_secs, e
            ),
        }

        Ok(ChromePage {
            tab,
            collector,
            scroll_step_px: self.config.scroll_step_px,
            scroll_pause: self.config.scroll_pause(),
        })
    }

    fn source_name(&self) -> &'static str {
        "headless Chrome"
    }
}

/// One loaded search page. The tab is closed on drop.
pub struct ChromePage {
    tab: Arc<Tab>,
    collector: NetworkCollector,
    scroll_step_px: u32,
    scroll_pause: Duration,
}

impl LivePage for ChromePage {
    fn content(&self) -> Result<String> {
        let html_result = self
            .tab
            .evaluate("document.documentElement.outerHTML", false)
            .context("Failed to read page HTML")?;
        let html = html_result
            .value
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        debug!("Captured {} bytes of HTML", html.len());
        Ok(html)
    }

    fn scroll(&self) -> Result<()> {
        self.tab
            .evaluate(&format!("window.scrollBy(0, {});", self.scroll_step_px), false)
            .context("Failed to scroll page")?;
        thread::sleep(self.scroll_pause);
        Ok(())
    }

    fn captured_responses(&self) -> Vec<CapturedResponse> {
        self.collector.drain()
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        let _ = self.tab.deregister_response_handling(CAPTURE_HANDLER);
        if let Err(e) = self.tab.close(true) {
            debug!("Failed to close tab: {}", e);
        }
    }
}
