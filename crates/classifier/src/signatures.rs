use malblock_common::ScannerConfig;

/// Header names whose presence signals an authentication attempt.
pub const AUTH_HEADERS: &[&str] = &[
    "Authorization",
    "Token",
    "Authenticate",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "Login",
    "Set-Login",
    "WWW-Authenticate",
];

/// Query parameter names whose presence signals an authentication attempt.
pub const AUTH_QUERY_PARAMS: &[&str] = &[
    "login",
    "token",
    "auth",
    "authorization",
    "authentication",
    "password",
];

/// Crawler and automation User-Agent substrings, matched case-insensitively.
pub const CRAWLER_SIGNATURES: &[&str] = &[
    // Search engines
    "googlebot",
    "google-inspectiontool",
    "storebot-google",
    "adsbot-google",
    "mediapartners-google",
    "bingbot",
    "bingpreview",
    "msnbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "yandex.com/bots",
    "sogou",
    "exabot",
    "seznambot",
    "mojeekbot",
    "qwantify",
    "petalbot",
    "applebot",
    // Social previews
    "facebookexternalhit",
    "facebot",
    "twitterbot",
    "linkedinbot",
    "slackbot",
    "discordbot",
    "telegrambot",
    "whatsapp",
    // SEO and archiving
    "ahrefsbot",
    "semrushbot",
    "mj12bot",
    "dotbot",
    "blexbot",
    "dataforseobot",
    "ia_archiver",
    "archive.org_bot",
    // AI crawlers
    "gptbot",
    "chatgpt-user",
    "ccbot",
    "claudebot",
    "anthropic-ai",
    "bytespider",
    "amazonbot",
    "perplexitybot",
    // Libraries and tools
    "curl/",
    "wget/",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "go-http-client",
    "okhttp",
    "java/",
    "apache-httpclient",
    "libwww-perl",
    "node-fetch",
    "axios/",
    "scrapy",
    "headlesschrome",
    "phantomjs",
    // Scanners and monitors
    "zgrab",
    "masscan",
    "nmap",
    "nikto",
    "sqlmap",
    "uptimerobot",
    "pingdom",
    // Generic markers
    "crawler",
    "spider",
    "scraper",
    "feedfetcher",
];

/// Lexical tables consulted by the classifier.
///
/// Built from the defaults above unless the configuration replaces a table.
#[derive(Debug, Clone)]
pub struct SignatureTables {
    pub auth_headers: Vec<String>,
    pub auth_query_params: Vec<String>,
    /// Stored lowercased.
    crawler_signatures: Vec<String>,
}

impl SignatureTables {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config
                .auth_headers
                .clone()
                .unwrap_or_else(|| to_owned(AUTH_HEADERS)),
            config
                .auth_query_params
                .clone()
                .unwrap_or_else(|| to_owned(AUTH_QUERY_PARAMS)),
            config
                .crawler_signatures
                .clone()
                .unwrap_or_else(|| to_owned(CRAWLER_SIGNATURES)),
        )
    }

    pub fn new(
        auth_headers: Vec<String>,
        auth_query_params: Vec<String>,
        crawler_signatures: Vec<String>,
    ) -> Self {
        Self {
            auth_headers,
            auth_query_params,
            crawler_signatures: crawler_signatures
                .into_iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Returns `true` if the User-Agent contains any crawler signature.
    pub fn is_crawler(&self, user_agent: &str) -> bool {
        if user_agent.is_empty() {
            return false;
        }

        let ua_lower = user_agent.to_lowercase();
        self.crawler_signatures
            .iter()
            .any(|signature| ua_lower.contains(signature.as_str()))
    }

    pub fn crawler_signature_count(&self) -> usize {
        self.crawler_signatures.len()
    }
}

impl Default for SignatureTables {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

fn to_owned(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}
