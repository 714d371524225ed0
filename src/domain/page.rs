use parking_lot::RwLock;

/// Host-supplied context stamped onto every event.
///
/// `url` can change over the session (client-side navigation); the rest is
/// fixed at bootstrap.
#[derive(Debug)]
pub struct PageContext {
    url: RwLock<String>,
    referrer: String,
    user_agent: String,
    title: Option<String>,
    viewport: Option<(u32, u32)>,
}

impl PageContext {
    pub fn new(
        url: impl Into<String>,
        referrer: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            url: RwLock::new(url.into()),
            referrer: referrer.into(),
            user_agent: user_agent.into(),
            title: None,
            viewport: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some((width, height));
        self
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Viewport formatted as `WxH`.
    pub fn viewport(&self) -> Option<String> {
        self.viewport.map(|(w, h)| format!("{w}x{h}"))
    }
}
