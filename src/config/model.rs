// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Template arguments. Values are arbitrary YAML scalars/collections that get
/// fed into the command template.
pub type Args = BTreeMap<String, serde_yaml::Value>;

/// Environment variables applied to child processes.
pub type Envs = BTreeMap<String, String>;

/// Top-level configuration as read from a YAML file.
///
/// ```yaml
/// targets:
///   build:
///     commands: cargo build
/// triggers:
///   code:
///     watch: ["src/"]
/// flows:
///   default:
///     nodes:
///       build:
///         target: build
///         triggers: [code]
/// ```
///
/// All sections are optional and default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Named flows from `flows.<id>`.
    #[serde(default)]
    pub flows: IndexMap<String, Flow>,

    /// Pre-defined targets, referenceable from nodes by id.
    #[serde(default)]
    pub targets: IndexMap<String, Target>,

    /// Pre-defined triggers, referenceable from nodes by id.
    #[serde(default)]
    pub triggers: IndexMap<String, Trigger>,
}

/// A named collection of nodes plus flow-level args/envs that are merged
/// beneath node-level values when rendering scripts and building child
/// environments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Flow {
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,

    #[serde(default)]
    pub args: Args,

    #[serde(default)]
    pub envs: Envs,
}

/// One node of a flow: which target to run, with what args/envs, and when.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    /// Either the id of a pre-defined target or an inline target definition.
    pub target: TargetRef,

    #[serde(default)]
    pub args: Args,

    #[serde(default)]
    pub envs: Envs,

    /// Each entry is either the id of a pre-defined trigger or an inline
    /// trigger definition. Defaults to a single `once` trigger.
    #[serde(default = "default_triggers")]
    pub triggers: Vec<TriggerRef>,

    /// Display color hint (hex, e.g. `"#80c47e"`). A random color is assigned
    /// during resolution when absent.
    #[serde(default)]
    pub color: Option<String>,
}

fn default_triggers() -> Vec<TriggerRef> {
    vec![TriggerRef::Inline(Trigger::Once(Once {}))]
}

/// Inline target or reference to a pre-defined one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetRef {
    Id(String),
    Inline(Target),
}

/// Inline trigger or reference to a pre-defined one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TriggerRef {
    Id(String),
    Inline(Trigger),
}

/// The commands to run and how to run them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Shell script body. Dedented and trimmed during resolution.
    #[serde(default)]
    pub commands: String,

    /// Template arguments applied to this target by default.
    #[serde(default)]
    pub args: Args,

    /// Environment variables applied to this target by default.
    #[serde(default)]
    pub envs: Envs,

    /// Interpreter invocation used to build the script's shebang line.
    #[serde(default = "default_executable")]
    pub executable: String,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            commands: String::new(),
            args: Args::new(),
            envs: Envs::new(),
            executable: default_executable(),
        }
    }
}

fn default_executable() -> String {
    "sh -eu".to_string()
}

/// When a node should (re-)run. Discriminated by shape:
///
/// - `{}` -> run once when ready
/// - `{after: [a, b]}` -> run after all of `a`, `b` succeed
/// - `{delay: 1.5}` -> re-run `delay` seconds after each exit
/// - `{watch: ["src/"]}` -> re-run when any path changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    Once(Once),
    After(After),
    Restart(Restart),
    Watch(Watch),
}

impl Trigger {
    /// Restart and Watch triggers can fire any number of times.
    pub fn is_repeating(&self) -> bool {
        matches!(self, Trigger::Restart(_) | Trigger::Watch(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Once {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct After {
    /// Ids of the nodes to wait for.
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Restart {
    /// Seconds to wait before re-running the node after it exits.
    #[serde(default = "default_delay")]
    pub delay: f64,
}

fn default_delay() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Watch {
    /// Paths to watch. Files are watched directly, directories recursively.
    pub watch: Vec<PathBuf>,
}

/// Strip the common leading whitespace from every non-blank line, then trim.
///
/// YAML block scalars usually arrive already dedented, but inline strings and
/// generated configs may not.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let dedented: Vec<&str> = text
        .lines()
        .map(|line| if line.len() >= margin { &line[margin..] } else { line.trim_start() })
        .collect();

    dedented.join("\n").trim().to_string()
}

/// Random display color: full-saturation HSV at v = 0.7, rendered as hex.
pub fn random_color() -> String {
    let hue: f64 = rand::random::<f64>() * 6.0;
    let value = 0.7;

    let c = value;
    let x = value * (1.0 - (hue % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}
