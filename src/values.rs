//! Helm values rendering
//!
//! Values are serialized to YAML and, when templating is enabled, the YAML
//! text is treated as a MiniJinja template resolved against a variable
//! mapping. Undefined variables are errors, never empty strings.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

const TEMPLATE_NAME: &str = "values";

/// How a DeployChart's values become the file handed to Helm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ValuesMode {
    /// Write the values exactly as declared
    #[default]
    Verbatim,
    /// Substitute `{{ release.* }}` and `{{ chart.* }}` placeholders first
    Template,
}

/// Serialize values to YAML
pub fn to_yaml(values: &Map<String, Value>) -> Result<String> {
    Ok(serde_yaml::to_string(values)?)
}

/// Serialize values to YAML and substitute placeholders from `variables`
pub fn render<V: Serialize>(values: &Map<String, Value>, variables: &V) -> Result<Vec<u8>> {
    let yaml = to_yaml(values)?;

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template(TEMPLATE_NAME, &yaml)?;

    let rendered = env.get_template(TEMPLATE_NAME)?.render(variables)?;
    Ok(rendered.into_bytes())
}
