use crate::util::generator::GeneratorParams;
use serde::Deserialize;

pub const ENV_ROUTE_STATUS_URL: &str = "ROUTE_STATUS_URL";
pub const ENV_ROUTE_STATUS_AUTH: &str = "ROUTE_STATUS_AUTH";
pub const ENV_FORCE_LUT_PINSWAPPING: &str = "RWROUTE_FORCE_LUT_PINSWAPPING";
pub const ENV_FORCE_LUT_ROUTETHRU: &str = "RWROUTE_FORCE_LUT_ROUTETHRU";
pub const ENV_DIFF_MOCK_RESULT: &str = "DIFF_MOCK_RESULT";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub generator: GeneratorParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            router: RouterConfig::default(),
            oracle: OracleConfig::default(),
            verify: VerifyConfig::default(),
            generator: GeneratorParams::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Applies the process environment on top of the file configuration.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_ROUTE_STATUS_URL).filter(|s| !s.is_empty()) {
            self.oracle.url = Some(url);
        }
        if let Some(auth) = lookup(ENV_ROUTE_STATUS_AUTH).filter(|s| !s.is_empty()) {
            self.oracle.auth = Some(auth);
        }
        // Only the exact string "true" enables a forced option.
        if lookup(ENV_FORCE_LUT_PINSWAPPING).as_deref() == Some("true") {
            self.router.lut_pin_swapping = true;
        }
        if lookup(ENV_FORCE_LUT_ROUTETHRU).as_deref() == Some("true") {
            self.router.lut_routethru = true;
        }
        if let Some(mock) = lookup(ENV_DIFF_MOCK_RESULT) {
            match mock.trim().parse::<usize>() {
                Ok(n) => self.verify.diff_mock_result = Some(n),
                Err(_) => log::warn!(
                    "Ignoring {}='{}': not a diff count",
                    ENV_DIFF_MOCK_RESULT,
                    mock
                ),
            }
        }
    }
}

/// Consistency checks applied while merging the two netlists. The contest
/// tools run with every check relaxed.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct LoaderConfig {
    /// Static nets must carry the canonical `GND`/`VCC` names.
    #[serde(default)]
    pub check_static_net_naming: bool,
    /// Create placed cells missing from the logical netlist instead of
    /// failing with a missing reference.
    #[serde(default)]
    pub create_missing_cells: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// External router executable and leading arguments.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_wirelength_weight")]
    pub wirelength_weight: f64,
    #[serde(default = "default_initial_present_congestion_factor")]
    pub initial_present_congestion_factor: f64,
    #[serde(default = "default_present_congestion_multiplier")]
    pub present_congestion_multiplier: f64,
    #[serde(default = "default_historical_congestion_factor")]
    pub historical_congestion_factor: f64,
    #[serde(default = "default_router_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub lut_pin_swapping: bool,
    #[serde(default)]
    pub lut_routethru: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            wirelength_weight: default_wirelength_weight(),
            initial_present_congestion_factor: default_initial_present_congestion_factor(),
            present_congestion_multiplier: default_present_congestion_multiplier(),
            historical_congestion_factor: default_historical_congestion_factor(),
            max_iterations: default_router_max_iterations(),
            lut_pin_swapping: false,
            lut_routethru: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_tool")]
    pub tool: String,
    /// Remote route-status endpoint. Selects the remote oracle when set.
    #[serde(default)]
    pub url: Option<String>,
    /// Basic-Auth credential, `user:password`.
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default = "default_bundle_suffix")]
    pub bundle_suffix: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            tool: default_oracle_tool(),
            url: None,
            auth: None,
            bundle_suffix: default_bundle_suffix(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerifyConfig {
    /// Test-only: skip diffing and report this many differences instead.
    #[serde(default)]
    pub diff_mock_result: Option<usize>,
    #[serde(default = "default_write_check_file")]
    pub write_check_file: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            diff_mock_result: None,
            write_check_file: default_write_check_file(),
        }
    }
}

fn default_wirelength_weight() -> f64 {
    0.8
}

fn default_initial_present_congestion_factor() -> f64 {
    0.5
}

fn default_present_congestion_multiplier() -> f64 {
    2.0
}

fn default_historical_congestion_factor() -> f64 {
    1.0
}

// Raised from the router's own default of 100.
fn default_router_max_iterations() -> usize {
    150
}

fn default_oracle_tool() -> String {
    "vivado".to_string()
}

fn default_bundle_suffix() -> String {
    "/tar".to_string()
}

fn default_write_check_file() -> bool {
    true
}
