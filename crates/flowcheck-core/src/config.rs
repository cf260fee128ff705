//! Configuration management for flowcheck
//!
//! A suite file (`flowcheck.toml` by default) carries browser settings,
//! diagnostics, per-step time budgets, the session policy, and one `[[flows]]`
//! table per flow to run. Every selector list has a production-tested default,
//! so a minimal login flow only needs `name`, `url`, `kind` and `identity`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::selector::{ScanSpec, SelectorCandidates};
use crate::types::FlowKind;
use crate::{FlowError, Result};

/// Suite-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowcheckConfig {
    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub flows: Vec<FlowSpec>,
}

/// Browser launch parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default)]
    pub user_agent: Option<String>,

    /// Idle timeout for the DevTools connection
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
}

/// Where and whether diagnostic screenshots are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_screenshot_dir")]
    pub directory: PathBuf,

    #[serde(default)]
    pub full_page: bool,
}

/// Per-step time budgets, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    /// Network-idle wait after navigation
    pub load_primary_ms: u64,
    /// DOM-content-loaded wait when the primary wait expires
    pub load_fallback_ms: u64,
    /// Fixed pause after the load wait
    pub stabilize_pause_ms: u64,
    pub consent_pause_ms: u64,
    /// Visibility wait for each credential field
    pub field_ms: u64,
    /// Wait for the identifier field after activating a sign-in control
    pub sign_in_reveal_ms: u64,
    pub popup_settle_ms: u64,
    pub submit_settle_ms: u64,
    pub login_processing_ms: u64,
    /// Success-indicator wait after submission
    pub outcome_ms: u64,
    pub menu_pause_ms: u64,
    pub results_settle_ms: u64,
}

/// How multiple flows share the browser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One session handed from run to run
    #[default]
    Shared,
    /// A fresh session per flow
    PerFlow,
}

/// Suite execution policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub session_mode: SessionMode,

    #[serde(default = "default_pause_between_runs_ms")]
    pub pause_between_runs_ms: u64,
}

/// One flow to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub params: FlowParams,
}

/// Per-kind flow parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowParams {
    Login(LoginParams),
    Navigation(NavigationParams),
    Search(SearchParams),
}

/// Cookie/consent banner handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_consent_controls")]
    pub controls: SelectorCandidates,

    /// Scan of all buttons when no declared control matches
    #[serde(default = "default_consent_scan")]
    pub scan: Option<ScanSpec>,
}

/// A credential secret; never printed
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Login flow parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginParams {
    /// Value typed into the identifier field
    pub identity: String,

    /// Environment variable holding the secret
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    /// Resolved by the caller before the run
    #[serde(skip)]
    pub secret: Secret,

    #[serde(default)]
    pub consent: ConsentSettings,

    #[serde(default = "default_identifier_field")]
    pub identifier_field: SelectorCandidates,

    #[serde(default = "default_secret_field")]
    pub secret_field: SelectorCandidates,

    /// Controls that reveal the credential surface (OAuth buttons excluded)
    #[serde(default = "default_sign_in_controls")]
    pub sign_in_controls: SelectorCandidates,

    #[serde(default = "default_login_form")]
    pub login_form: SelectorCandidates,

    #[serde(default = "default_fallback_form")]
    pub fallback_form: SelectorCandidates,

    /// URL fragments that mean "authenticated"
    #[serde(default = "default_success_url_markers")]
    pub success_url_markers: Vec<String>,

    /// DOM markers of the authenticated area
    ///
    /// These are checked before error indicators, so a landmark that login
    /// pages also carry (`div[role='main']`) only belongs in a flow whose
    /// site shows it after sign-in alone, such as a webmail inbox.
    #[serde(default = "default_success_markers")]
    pub success_markers: SelectorCandidates,

    #[serde(default = "default_error_indicators")]
    pub error_indicators: SelectorCandidates,

    /// URL fragments of the pre-authentication page
    #[serde(default = "default_login_url_markers")]
    pub login_url_markers: Vec<String>,
}

/// Menu-navigation flow parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationParams {
    #[serde(default)]
    pub consent: ConsentSettings,

    /// One candidate list per menu level; all but the last are hovered, the last is clicked
    pub menu_path: Vec<SelectorCandidates>,

    /// Page URL or content must mention one of these
    pub expected_keywords: Vec<String>,
}

/// Site-search flow parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,

    #[serde(default)]
    pub consent: ConsentSettings,

    #[serde(default = "default_search_input")]
    pub search_input: SelectorCandidates,

    /// Controls that open a collapsed search box
    #[serde(default = "default_search_openers")]
    pub search_openers: SelectorCandidates,

    #[serde(default = "default_input_scan")]
    pub input_scan: ScanSpec,

    #[serde(default = "default_result_markers")]
    pub result_markers: SelectorCandidates,

    #[serde(default = "default_result_scan")]
    pub result_scan: ScanSpec,

    /// URL fragments that show results were reached; the query itself is always added
    #[serde(default = "default_result_url_keywords")]
    pub result_url_keywords: Vec<String>,
}

// Default value providers
fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_launch_timeout_secs() -> u64 {
    30
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_pause_between_runs_ms() -> u64 {
    3000
}

fn default_secret_env() -> String {
    "FLOWCHECK_SECRET".to_string()
}

fn default_consent_controls() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "button:has-text('Accept All')",
        "button:has-text('Accept Cookies')",
        "button:has-text('I Accept')",
        "button:has-text('Accept')",
        "button:has-text('Got It')",
        "button:has-text('OK')",
        "[data-testid='accept-cookies']",
        "button[data-testid='accept-all']",
        "[aria-label*='Accept']",
        ".cookie-accept",
        "#cookie-accept",
        ".cookie-banner button",
    ])
}

fn default_consent_scan() -> Option<ScanSpec> {
    Some(ScanSpec {
        tag: "button".to_string(),
        attributes: vec!["text".to_string(), "aria-label".to_string()],
        keywords: vec!["accept".to_string(), "agree".to_string()],
        limit: 50,
    })
}

fn default_identifier_field() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "#login-email",
        "input[type='email']",
        "input[name='email']",
        "input[autocomplete='username']",
    ])
}

fn default_secret_field() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "#login-password",
        "input[type='password']:not([aria-hidden='true'])",
        "input[type='password']",
    ])
}

fn default_sign_in_controls() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "button:has-text('Sign In'):not(:has-text('Facebook'))",
        "a:has-text('Sign In'):not(:has-text('Facebook'))",
        "button:has-text('Log In'):not(:has-text('Facebook'))",
    ])
}

fn default_login_form() -> SelectorCandidates {
    SelectorCandidates::builtin(&["form[name='login']", "form[id*='login']"])
}

fn default_fallback_form() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "form:has(input[name='email'])",
        "form:has(input[name='password'])",
        "form:has(input[type='password'])",
    ])
}

fn default_success_url_markers() -> Vec<String> {
    vec!["dashboard".to_string(), "profile".to_string()]
}

fn default_success_markers() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "[data-testid='account-dashboard']",
        "div[class*='dashboard']",
        "div[class*='profile']",
    ])
}

fn default_error_indicators() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "div[role='alert']",
        "[data-testid='error-message']",
        "div[class*='error']",
        "span[class*='error']",
        "p[class*='error']",
        "div[class*='alert']",
        ".error-message",
        ".alert-error",
        ".form-error",
        "div[data-error]",
        "span[data-error]",
    ])
}

fn default_login_url_markers() -> Vec<String> {
    vec![
        "login".to_string(),
        "signin".to_string(),
        "sign-in".to_string(),
    ]
}

fn default_search_input() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "input[placeholder*='Where to?']",
        "input[placeholder*='Search']",
        "input[name='q']",
        "input[type='search']",
        "[data-testid='search-input']",
        "[data-testid='searchbox']",
        ".search-input input",
        "#searchbox input",
        ".search-box input",
    ])
}

fn default_search_openers() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "button:has-text('Search')",
        "[aria-label*='Search']",
        ".search-button",
        "[data-testid*='search']",
    ])
}

fn default_input_scan() -> ScanSpec {
    ScanSpec {
        tag: "input".to_string(),
        attributes: vec![
            "placeholder".to_string(),
            "name".to_string(),
            "type".to_string(),
            "aria-label".to_string(),
        ],
        keywords: vec!["search".to_string(), "where".to_string(), "query".to_string()],
        limit: 50,
    }
}

fn default_result_markers() -> SelectorCandidates {
    SelectorCandidates::builtin(&[
        "[data-testid*='result']",
        ".search-result",
        ".result",
        ".listing",
        ".property-card",
        "article",
    ])
}

fn default_result_scan() -> ScanSpec {
    ScanSpec {
        tag: "div".to_string(),
        attributes: vec!["class".to_string(), "id".to_string()],
        keywords: vec!["result".to_string()],
        limit: 50,
    }
}

fn default_result_url_keywords() -> Vec<String> {
    vec!["search".to_string()]
}

impl FlowcheckConfig {
    /// Load configuration from `path`, or defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FlowError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write the example suite to `path`
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(&Self::example())
            .map_err(|e| FlowError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults plus one flow of each kind
    pub fn example() -> Self {
        Self {
            flows: vec![
                FlowSpec {
                    name: "account-login".to_string(),
                    url: "https://www.example.com/myaccount".to_string(),
                    params: FlowParams::Login(LoginParams::new("user@example.com")),
                },
                FlowSpec {
                    name: "furniture-sofas".to_string(),
                    url: "https://www.example.com/".to_string(),
                    params: FlowParams::Navigation(NavigationParams {
                        consent: ConsentSettings::default(),
                        menu_path: vec![
                            SelectorCandidates::builtin(&[
                                "a:has-text('Furniture')",
                                "[data-testid*='furniture']",
                            ]),
                            SelectorCandidates::builtin(&[
                                "a:has-text('Sofas and Couches')",
                                "a:has-text('Sofas & Couches')",
                                "[data-testid*='sofas']",
                            ]),
                        ],
                        expected_keywords: vec!["sofa".to_string(), "couch".to_string()],
                    }),
                },
                FlowSpec {
                    name: "destination-search".to_string(),
                    url: "https://www.example.com/travel".to_string(),
                    params: FlowParams::Search(SearchParams::new("Poole")),
                },
            ],
            ..Self::default()
        }
    }

    pub fn flow(&self, name: &str) -> Option<&FlowSpec> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// Flows named in `names`, in suite order; all flows when `names` is empty
    pub fn select(&self, names: &[String]) -> Result<Vec<FlowSpec>> {
        if names.is_empty() {
            return Ok(self.flows.clone());
        }
        for name in names {
            if self.flow(name).is_none() {
                return Err(FlowError::Config(format!("Unknown flow: {}", name)));
            }
        }
        Ok(self
            .flows
            .iter()
            .filter(|f| names.contains(&f.name))
            .cloned()
            .collect())
    }

    /// Every configuration problem, empty when the suite is runnable
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            errors.push("Viewport dimensions must be positive".to_string());
        }
        errors.extend(self.timeouts.validate());

        for flow in &self.flows {
            if flow.name.trim().is_empty() {
                errors.push("Flow name is required".to_string());
            }
            if flow.url.trim().is_empty() {
                errors.push(format!("{}: url is required", flow.name));
            }
            match &flow.params {
                FlowParams::Login(p) => {
                    if p.identity.trim().is_empty() {
                        errors.push(format!("{}: identity is required", flow.name));
                    }
                    if p.secret.is_empty() {
                        errors.push(format!(
                            "{}: secret is required (set {})",
                            flow.name, p.secret_env
                        ));
                    }
                }
                FlowParams::Navigation(p) => {
                    if p.menu_path.is_empty() {
                        errors.push(format!("{}: menu_path must name at least one level", flow.name));
                    }
                    if p.expected_keywords.is_empty() {
                        errors.push(format!("{}: expected_keywords must not be empty", flow.name));
                    }
                }
                FlowParams::Search(p) => {
                    if p.query.trim().is_empty() {
                        errors.push(format!("{}: query is required", flow.name));
                    }
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for flow in &self.flows {
            if !seen.insert(flow.name.as_str()) {
                errors.push(format!("Duplicate flow name: {}", flow.name));
            }
        }

        errors
    }
}

impl Timeouts {
    fn validate(&self) -> Vec<String> {
        let required = [
            ("navigation_ms", self.navigation_ms),
            ("load_primary_ms", self.load_primary_ms),
            ("load_fallback_ms", self.load_fallback_ms),
            ("field_ms", self.field_ms),
            ("sign_in_reveal_ms", self.sign_in_reveal_ms),
            ("submit_settle_ms", self.submit_settle_ms),
            ("outcome_ms", self.outcome_ms),
        ];
        required
            .iter()
            .filter(|(_, v)| *v == 0)
            .map(|(name, _)| format!("timeouts.{} must be positive", name))
            .collect()
    }
}

impl FlowSpec {
    pub fn kind(&self) -> FlowKind {
        match self.params {
            FlowParams::Login(_) => FlowKind::Login,
            FlowParams::Navigation(_) => FlowKind::Navigation,
            FlowParams::Search(_) => FlowKind::Search,
        }
    }
}

impl LoginParams {
    /// Defaults for everything except the identity
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret_env: default_secret_env(),
            secret: Secret::default(),
            consent: ConsentSettings::default(),
            identifier_field: default_identifier_field(),
            secret_field: default_secret_field(),
            sign_in_controls: default_sign_in_controls(),
            login_form: default_login_form(),
            fallback_form: default_fallback_form(),
            success_url_markers: default_success_url_markers(),
            success_markers: default_success_markers(),
            error_indicators: default_error_indicators(),
            login_url_markers: default_login_url_markers(),
        }
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = secret;
        self
    }
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            consent: ConsentSettings::default(),
            search_input: default_search_input(),
            search_openers: default_search_openers(),
            input_scan: default_input_scan(),
            result_markers: default_result_markers(),
            result_scan: default_result_scan(),
            result_url_keywords: default_result_url_keywords(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
            launch_timeout_secs: default_launch_timeout_secs(),
        }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_screenshot_dir(),
            full_page: false,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            load_primary_ms: 15_000,
            load_fallback_ms: 10_000,
            stabilize_pause_ms: 2_000,
            consent_pause_ms: 1_000,
            field_ms: 30_000,
            sign_in_reveal_ms: 15_000,
            popup_settle_ms: 3_000,
            submit_settle_ms: 15_000,
            login_processing_ms: 2_000,
            outcome_ms: 30_000,
            menu_pause_ms: 1_000,
            results_settle_ms: 2_000,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::default(),
            pause_between_runs_ms: default_pause_between_runs_ms(),
        }
    }
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            controls: default_consent_controls(),
            scan: default_consent_scan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let t = Timeouts::default();
        assert_eq!(t.load_primary_ms, 15_000);
        assert_eq!(t.load_fallback_ms, 10_000);
        assert_eq!(t.field_ms, 30_000);
        assert!(t.validate().is_empty());
    }

    #[test]
    fn test_minimal_login_flow_parses_with_defaults() {
        let toml = r#"
            [run]
            session_mode = "per_flow"

            [[flows]]
            name = "login"
            url = "https://shop.example/myaccount"
            kind = "login"
            identity = "someone@example.com"
        "#;
        let config = FlowcheckConfig::from_toml(toml).unwrap();
        assert_eq!(config.run.session_mode, SessionMode::PerFlow);
        assert_eq!(config.flows.len(), 1);

        let flow = &config.flows[0];
        assert_eq!(flow.kind(), FlowKind::Login);
        let FlowParams::Login(p) = &flow.params else {
            panic!("expected login params");
        };
        assert_eq!(p.secret_env, "FLOWCHECK_SECRET");
        assert_eq!(p.identifier_field.get(0).unwrap().to_string(), "#login-email");
        assert!(p.consent.enabled);
        assert!(p.secret.is_empty());
    }

    #[test]
    fn test_custom_selectors_override_defaults() {
        let toml = r##"
            [[flows]]
            name = "custom"
            url = "https://example.test"
            kind = "login"
            identity = "a@b.c"
            identifier_field = ["#user", "input[name='user']"]
        "##;
        let config = FlowcheckConfig::from_toml(toml).unwrap();
        let FlowParams::Login(p) = &config.flows[0].params else {
            panic!("expected login params");
        };
        assert_eq!(p.identifier_field.len(), 2);
    }

    #[test]
    fn test_main_landmark_is_opt_in_per_flow() {
        let toml = r#"
            [[flows]]
            name = "shop"
            url = "https://shop.example/myaccount"
            kind = "login"
            identity = "a@b.c"

            [[flows]]
            name = "mailbox"
            url = "https://mail.example/"
            kind = "login"
            identity = "a@b.c"
            success_markers = ["div[role='main']"]
        "#;
        let config = FlowcheckConfig::from_toml(toml).unwrap();
        let markers = |name: &str| match &config.flow(name).unwrap().params {
            FlowParams::Login(p) => p.success_markers.iter().map(|q| q.to_string()).collect::<Vec<_>>(),
            _ => panic!("expected login params"),
        };

        assert!(!markers("shop").iter().any(|m| m.contains("main")));
        assert_eq!(markers("mailbox").len(), 1);
    }

    #[test]
    fn test_empty_selector_list_rejected() {
        let toml = r#"
            [[flows]]
            name = "broken"
            url = "https://example.test"
            kind = "login"
            identity = "a@b.c"
            identifier_field = []
        "#;
        assert!(FlowcheckConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = FlowcheckConfig::example();
        config.timeouts.outcome_ms = 0;
        config.browser.window_width = 0;

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("Viewport")));
        assert!(errors.iter().any(|e| e.contains("outcome_ms")));
        // example login flow has no secret yet
        assert!(errors.iter().any(|e| e.contains("FLOWCHECK_SECRET")));
    }

    #[test]
    fn test_select_unknown_flow() {
        let config = FlowcheckConfig::example();
        assert_eq!(config.select(&[]).unwrap().len(), 3);
        assert_eq!(
            config.select(&["destination-search".to_string()]).unwrap()[0].kind(),
            FlowKind::Search
        );
        assert!(config.select(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let p = LoginParams::new("me@example.com").with_secret(Secret::new("hunter2"));
        let debug = format!("{:?}", p);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("Secret(***)"));
    }

    #[test]
    fn test_write_default_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowcheck.toml");
        FlowcheckConfig::write_default(&path).unwrap();

        let loaded = FlowcheckConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.flows.len(), 3);
        assert_eq!(loaded.flow("furniture-sofas").unwrap().kind(), FlowKind::Navigation);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = FlowcheckConfig::load_or_default(Path::new("/nonexistent/flowcheck.toml")).unwrap();
        assert!(config.flows.is_empty());
        assert!(config.browser.headless);
    }
}
