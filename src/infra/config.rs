use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::scoring::ScoreFormula;

/// File names probed in the working directory, first match wins
pub const CONFIG_FILES: [&str; 3] = ["shelfrank.toml", ".shelfrank.toml", "shelfrank.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Whose rankings commands act on
    pub user: String,

    /// Location of the rankings document (`~` and `$VAR` are expanded)
    pub store_path: String,

    /// Score spreading within tier bands
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaKind
{
    Linear,
    Spread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig
{
    pub formula: FormulaKind,
    /// Only read when `formula = "spread"`
    pub spread_factor: f64,
}

impl Default for ScoringConfig
{
    fn default() -> Self
    {
        Self { formula: FormulaKind::Linear, spread_factor: 0.9 }
    }
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            user: std::env::var("USER").unwrap_or_else(|_| "reader".to_string()),
            store_path: "~/.local/share/shelfrank/rankings.json".to_string(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config
{
    /// Validated score formula
    pub fn formula(&self) -> Result<ScoreFormula>
    {
        let formula = match self
            .scoring
            .formula
        {
            FormulaKind::Linear => ScoreFormula::Linear,
            FormulaKind::Spread => ScoreFormula::Spread {
                factor: self
                    .scoring
                    .spread_factor,
            },
        };
        Ok(formula.validate()?)
    }

    /// Store path with `~` and environment variables expanded
    pub fn resolved_store_path(&self) -> Result<PathBuf>
    {
        let expanded = shellexpand::full(&self.store_path)
            .with_context(|| format!("Failed to expand store path '{}'", self.store_path))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Layer defaults, the first config file found in `dir`, then `SHELFRANK_*`
/// environment variables (`SHELFRANK_SCORING__FORMULA=spread`).
pub fn load_config(dir: &Path) -> Result<Config>
{
    let defaults = Config::default();
    let mut builder = config::Config::builder()
        .set_default("user", defaults.user)?
        .set_default("store_path", defaults.store_path)?;

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SHELFRANK")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
