//! Evasion payload installed on every new document before page scripts run.

pub(crate) const STEALTH_PAYLOAD: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });

    window.chrome = window.chrome || { runtime: {}, loadTimes() {}, csi() {}, app: {} };

    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });

    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
        ],
        configurable: true,
    });

    const query = window.navigator.permissions && window.navigator.permissions.query;
    if (query) {
        window.navigator.permissions.query = (params) =>
            params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query.call(window.navigator.permissions, params);
    }

    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function (parameter) {
        if (parameter === 37445) return 'Intel Inc.';
        if (parameter === 37446) return 'Intel Iris OpenGL Engine';
        return getParameter.call(this, parameter);
    };
})();
"#;

/// Chrome flags that hide the automation banner and blink automation flag.
pub(crate) const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--metrics-recording-only",
    "--no-sandbox",
    "--disable-gpu",
    "--window-size=1280,900",
];
