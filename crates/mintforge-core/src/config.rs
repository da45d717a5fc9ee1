//! Run configuration and its validator

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Gas premium used when the caller leaves it blank (1.1x)
pub const DEFAULT_GAS_PREMIUM: u32 = 110;
/// Smallest accepted gas premium (1.0x)
pub const MIN_GAS_PREMIUM: u32 = 100;

const PRODUCTION_RPC: &str = "https://ethereum-rpc.publicnode.com";
const TEST_RPC: &str = "https://ethereum-sepolia-rpc.publicnode.com";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No private key")]
    MissingPrivateKey,
    #[error("Private key must be 64 hex characters, optionally prefixed with 0x")]
    InvalidPrivateKey,
    #[error("No tick")]
    MissingTick,
    #[error("No amount")]
    MissingAmount,
    #[error("Invalid amount '{0}' (must be a number greater than zero)")]
    InvalidAmount(String),
    #[error("No difficulty")]
    MissingDifficulty,
    #[error("Invalid gas premium '{0}' (must be an integer of at least 100)")]
    InvalidGasPremium(String),
    #[error("Unknown environment '{0}' (expected production or test)")]
    InvalidEnvironment(String),
}

impl ConfigError {
    /// Name of the input field that was rejected
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::MissingPrivateKey | ConfigError::InvalidPrivateKey => "privateKey",
            ConfigError::MissingTick => "tick",
            ConfigError::MissingAmount | ConfigError::InvalidAmount(_) => "amount",
            ConfigError::MissingDifficulty => "difficulty",
            ConfigError::InvalidGasPremium(_) => "gasPremium",
            ConfigError::InvalidEnvironment(_) => "environment",
        }
    }
}

/// Target network for the worker's downstream submission logic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    /// Chain id of the target network
    pub fn chain_id(&self) -> u64 {
        match self {
            Environment::Production => 1,
            Environment::Test => 11_155_111,
        }
    }

    /// Built-in public RPC endpoint
    pub fn default_rpc(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_RPC,
            Environment::Test => TEST_RPC,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Unvalidated caller input, as typed into flags or a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRunInput {
    pub private_key: Option<String>,
    pub rpc: Option<String>,
    pub tick: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub amount: Option<String>,
    pub difficulty: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub gas_premium: Option<String>,
    pub environment: Option<String>,
}

impl RawRunInput {
    /// Fill every field that is unset here from `other`
    pub fn or(self, other: RawRunInput) -> RawRunInput {
        RawRunInput {
            private_key: self.private_key.or(other.private_key),
            rpc: self.rpc.or(other.rpc),
            tick: self.tick.or(other.tick),
            amount: self.amount.or(other.amount),
            difficulty: self.difficulty.or(other.difficulty),
            gas_premium: self.gas_premium.or(other.gas_premium),
            environment: self.environment.or(other.environment),
        }
    }
}

// Config files may carry numbers either quoted or bare
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|value| match value {
        Loose::Text(s) => s,
        Loose::Integer(n) => n.to_string(),
        Loose::Float(n) => n.to_string(),
    }))
}

/// A validated, immutable run configuration
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfiguration {
    #[serde(skip_serializing)]
    private_key: String,
    rpc: Option<String>,
    tick: String,
    amount: f64,
    difficulty: String,
    gas_premium: u32,
    environment: Environment,
}

impl RunConfiguration {
    /// Canonical `0x`-prefixed lowercase private key
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Caller-supplied RPC endpoint, if any
    pub fn rpc(&self) -> Option<&str> {
        self.rpc.as_deref()
    }

    /// RPC endpoint, falling back to the environment's public endpoint
    pub fn rpc_or_default(&self) -> &str {
        self.rpc().unwrap_or_else(|| self.environment.default_rpc())
    }

    pub fn tick(&self) -> &str {
        &self.tick
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    pub fn gas_premium(&self) -> u32 {
        self.gas_premium
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}

impl fmt::Debug for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfiguration")
            .field("private_key", &"<redacted>")
            .field("rpc", &self.rpc)
            .field("tick", &self.tick)
            .field("amount", &self.amount)
            .field("difficulty", &self.difficulty)
            .field("gas_premium", &self.gas_premium)
            .field("environment", &self.environment)
            .finish()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_private_key(key: &str) -> Result<String, ConfigError> {
    let digits = key.strip_prefix("0x").unwrap_or(key);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidPrivateKey);
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

fn parse_amount(text: &str) -> Result<f64, ConfigError> {
    let amount: f64 = text
        .parse()
        .map_err(|_| ConfigError::InvalidAmount(text.to_string()))?;
    if amount.is_nan() || !amount.is_finite() || amount <= 0.0 {
        return Err(ConfigError::InvalidAmount(text.to_string()));
    }
    Ok(amount)
}

fn parse_gas_premium(text: Option<&str>) -> Result<u32, ConfigError> {
    let Some(text) = text else {
        return Ok(DEFAULT_GAS_PREMIUM);
    };
    match text.parse::<u32>() {
        Ok(premium) if premium >= MIN_GAS_PREMIUM => Ok(premium),
        _ => Err(ConfigError::InvalidGasPremium(text.to_string())),
    }
}

/// Turn raw input into a run configuration.
///
/// Checks run in a fixed order and stop at the first failure: private key,
/// tick, amount, difficulty, gas premium, environment. The difficulty is only
/// required to be non-blank here; its format is the worker's concern.
pub fn validate(raw: &RawRunInput) -> Result<RunConfiguration, ConfigError> {
    let private_key = non_blank(&raw.private_key).ok_or(ConfigError::MissingPrivateKey)?;
    let private_key = normalize_private_key(private_key)?;

    let tick = non_blank(&raw.tick).ok_or(ConfigError::MissingTick)?;

    let amount = non_blank(&raw.amount).ok_or(ConfigError::MissingAmount)?;
    let amount = parse_amount(amount)?;

    let difficulty = non_blank(&raw.difficulty).ok_or(ConfigError::MissingDifficulty)?;

    let gas_premium = parse_gas_premium(non_blank(&raw.gas_premium))?;

    let environment = match non_blank(&raw.environment) {
        Some(env) => env.parse()?,
        None => Environment::default(),
    };

    Ok(RunConfiguration {
        private_key,
        rpc: non_blank(&raw.rpc).map(str::to_string),
        tick: tick.to_string(),
        amount,
        difficulty: difficulty.to_string(),
        gas_premium,
        environment,
    })
}

#[cfg(test)]
pub(crate) fn sample_input() -> RawRunInput {
    RawRunInput {
        private_key: Some("ab".repeat(32)),
        tick: Some("ierc-m5".to_string()),
        amount: Some("1000".to_string()),
        difficulty: Some("0x0000".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> RunConfiguration {
    validate(&sample_input()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_with_defaults() {
        let config = sample_config();
        assert_eq!(config.private_key(), format!("0x{}", "ab".repeat(32)));
        assert_eq!(config.tick(), "ierc-m5");
        assert_eq!(config.amount(), 1000.0);
        assert_eq!(config.difficulty(), "0x0000");
        assert_eq!(config.gas_premium(), DEFAULT_GAS_PREMIUM);
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.rpc(), None);
        assert_eq!(config.rpc_or_default(), PRODUCTION_RPC);
    }

    #[test]
    fn test_private_key_prefix_normalizes_identically() {
        let digits = "0123456789abcdefABCDEF0123456789abcdefABCDEF0123456789abcdef0123";
        assert_eq!(digits.len(), 64);

        let bare = validate(&RawRunInput {
            private_key: Some(digits.to_string()),
            ..sample_input()
        })
        .unwrap();
        let prefixed = validate(&RawRunInput {
            private_key: Some(format!("0x{digits}")),
            ..sample_input()
        })
        .unwrap();

        assert_eq!(bare.private_key(), prefixed.private_key());
        assert_eq!(bare.private_key(), format!("0x{}", digits.to_lowercase()));
    }

    #[test]
    fn test_private_key_rejections() {
        let cases = [
            "ab".repeat(31),
            "ab".repeat(33),
            format!("0x{}", "ab".repeat(31)),
            format!("0x{}", "ab".repeat(33)),
            format!("{}zz", "ab".repeat(31)),
            format!("0x{}g0", "ab".repeat(31)),
        ];
        for key in cases {
            let result = validate(&RawRunInput {
                private_key: Some(key.clone()),
                ..sample_input()
            });
            assert_eq!(result, Err(ConfigError::InvalidPrivateKey), "key {key}");
        }

        let missing = validate(&RawRunInput {
            private_key: None,
            ..sample_input()
        });
        assert_eq!(missing, Err(ConfigError::MissingPrivateKey));
    }

    #[test]
    fn test_private_key_is_trimmed() {
        let config = validate(&RawRunInput {
            private_key: Some(format!("  {}\n", "CD".repeat(32))),
            ..sample_input()
        })
        .unwrap();
        assert_eq!(config.private_key(), format!("0x{}", "cd".repeat(32)));
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        // Everything is wrong, only the first check is reported
        let err = validate(&RawRunInput::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingPrivateKey);
        assert_eq!(err.field(), "privateKey");

        let err = validate(&RawRunInput {
            tick: Some("   ".to_string()),
            amount: Some("abc".to_string()),
            ..sample_input()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingTick);
    }

    #[test]
    fn test_amount_rules() {
        for bad in ["0", "-5", "NaN", "inf", "ten"] {
            let err = validate(&RawRunInput {
                amount: Some(bad.to_string()),
                ..sample_input()
            })
            .unwrap_err();
            assert_eq!(err.field(), "amount", "amount {bad}");
        }

        let config = validate(&RawRunInput {
            amount: Some("0.5".to_string()),
            ..sample_input()
        })
        .unwrap();
        assert_eq!(config.amount(), 0.5);
    }

    #[test]
    fn test_difficulty_only_needs_content() {
        let err = validate(&RawRunInput {
            difficulty: Some("  ".to_string()),
            ..sample_input()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingDifficulty);

        // Format is left to the worker
        let config = validate(&RawRunInput {
            difficulty: Some(" not-hex ".to_string()),
            ..sample_input()
        })
        .unwrap();
        assert_eq!(config.difficulty(), "not-hex");
    }

    #[test]
    fn test_gas_premium_rules() {
        let config = validate(&RawRunInput {
            gas_premium: Some("150".to_string()),
            ..sample_input()
        })
        .unwrap();
        assert_eq!(config.gas_premium(), 150);

        for bad in ["99", "abc", "120.5"] {
            let err = validate(&RawRunInput {
                gas_premium: Some(bad.to_string()),
                ..sample_input()
            })
            .unwrap_err();
            assert_eq!(err, ConfigError::InvalidGasPremium(bad.to_string()));
        }
    }

    #[test]
    fn test_environment_and_rpc() {
        let config = validate(&RawRunInput {
            environment: Some("test".to_string()),
            rpc: Some(" http://localhost:8545 ".to_string()),
            ..sample_input()
        })
        .unwrap();
        assert_eq!(config.environment(), Environment::Test);
        assert_eq!(config.rpc_or_default(), "http://localhost:8545");

        let err = validate(&RawRunInput {
            environment: Some("staging".to_string()),
            ..sample_input()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidEnvironment("staging".to_string()));
    }

    #[test]
    fn test_raw_input_from_json() {
        let raw: RawRunInput = serde_json::from_str(
            r#"{"privateKey":"0x01","tick":"ierc-m5","amount":10000,"gasPremium":"120"}"#,
        )
        .unwrap();
        assert_eq!(raw.amount.as_deref(), Some("10000"));
        assert_eq!(raw.gas_premium.as_deref(), Some("120"));
        assert_eq!(raw.difficulty, None);
    }

    #[test]
    fn test_raw_input_override() {
        let flags = RawRunInput {
            tick: Some("from-flag".to_string()),
            ..Default::default()
        };
        let merged = flags.or(sample_input());
        assert_eq!(merged.tick.as_deref(), Some("from-flag"));
        assert_eq!(merged.amount.as_deref(), Some("1000"));
    }
}
