// tests/config_model.rs

use std::error::Error;

use synthesize::config::{dedent, Config, Trigger};
use synthesize::config::validate::validate_config;
use synthesize::errors::SynthError;

type TestResult = Result<(), Box<dyn Error>>;

const CHAIN_YAML: &str = "\
targets:
  greet:
    commands: echo hello
triggers:
  quick:
    delay: 0.5
flows:
  default:
    nodes:
      a:
        target: greet
      b:
        target:
          commands: echo B
        triggers:
          - after: [a]
      r:
        target: greet
        triggers: [quick]
";

#[test]
fn parses_targets_triggers_and_flows() -> TestResult {
    let config: Config = serde_yaml::from_str(CHAIN_YAML)?;

    assert_eq!(config.targets.len(), 1);
    assert_eq!(config.triggers.len(), 1);

    let flow = &config.flows["default"];
    assert_eq!(flow.nodes.len(), 3);

    validate_config(&config)?;

    let resolved = config.resolve()?;
    let resolved = &resolved["default"];

    let a = &resolved.nodes["a"];
    assert_eq!(a.target.commands, "echo hello");
    assert_eq!(a.target.executable, "sh -eu");
    assert!(matches!(a.triggers.as_slice(), [Trigger::Once(_)]));

    let b = &resolved.nodes["b"];
    assert_eq!(b.target.commands, "echo B");
    assert_eq!(b.predecessors().collect::<Vec<_>>(), vec!["a"]);

    let r = &resolved.nodes["r"];
    assert_eq!(r.restart_delay(), Some(0.5));
    assert!(r.has_repeating_trigger());

    Ok(())
}

#[test]
fn trigger_shapes_deserialize_by_field() -> TestResult {
    let once: Trigger = serde_yaml::from_str("{}")?;
    assert!(matches!(once, Trigger::Once(_)));

    let after: Trigger = serde_yaml::from_str("after: [a, b]")?;
    match &after {
        Trigger::After(t) => assert_eq!(t.after, vec!["a", "b"]),
        other => panic!("expected After, got {other:?}"),
    }

    let restart: Trigger = serde_yaml::from_str("delay: 2.5")?;
    match &restart {
        Trigger::Restart(t) => assert_eq!(t.delay, 2.5),
        other => panic!("expected Restart, got {other:?}"),
    }

    let watch: Trigger = serde_yaml::from_str("watch: [src/]")?;
    assert!(matches!(watch, Trigger::Watch(_)));

    Ok(())
}

#[test]
fn unknown_target_reference_fails_validation() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    nodes:
      a:
        target: missing
",
    )?;

    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, SynthError::Config(_)));
    assert!(err.to_string().contains("missing"));

    Ok(())
}

#[test]
fn unknown_after_node_fails_validation() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    nodes:
      a:
        target:
          commands: echo A
        triggers:
          - after: [ghost]
",
    )?;

    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("ghost"));

    Ok(())
}

#[test]
fn invalid_arg_key_fails_validation() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    args:
      bad_key1: 1
    nodes:
      a:
        target:
          commands: echo A
",
    )?;

    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("bad_key1"));

    Ok(())
}

#[test]
fn negative_restart_delay_fails_validation() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    nodes:
      a:
        target:
          commands: echo A
        triggers:
          - delay: -1
",
    )?;

    assert!(validate_config(&config).is_err());

    Ok(())
}

#[test]
fn commands_are_dedented_on_resolution() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    nodes:
      a:
        target:
          commands: \"\\n    echo one\\n    echo two\\n\"
",
    )?;

    let resolved = config.resolve()?;
    let a = &resolved["default"].nodes["a"];

    assert_eq!(a.target.commands, "echo one\necho two");

    Ok(())
}

#[test]
fn dedent_strips_common_margin() {
    assert_eq!(dedent("  a\n    b\n  c"), "a\n  b\nc");
    assert_eq!(dedent("\n\n  x\n"), "x");
    assert_eq!(dedent(""), "");
}

#[test]
fn uid_ignores_color_but_tracks_commands() -> TestResult {
    let config: Config = serde_yaml::from_str(CHAIN_YAML)?;
    let resolved = config.resolve()?;
    let flow = &resolved["default"];

    let mut repainted = flow.nodes["a"].clone();
    repainted.color = "#000000".to_string();
    assert_eq!(flow.nodes["a"].uid(), repainted.uid());

    let mut edited = flow.nodes["a"].clone();
    edited.target.commands = "echo goodbye".to_string();
    assert_ne!(flow.nodes["a"].uid(), edited.uid());

    Ok(())
}

#[test]
fn once_coercion_is_idempotent() -> TestResult {
    let config: Config = serde_yaml::from_str(CHAIN_YAML)?;
    let resolved = config.resolve()?;
    let flow = &resolved["default"];

    let coerced = flow.once();

    // Restart-only node collapses to a single once trigger...
    assert!(matches!(
        coerced.nodes["r"].triggers.as_slice(),
        [Trigger::Once(_)]
    ));
    // ...and After triggers survive.
    assert!(matches!(
        coerced.nodes["b"].triggers.as_slice(),
        [Trigger::After(_)]
    ));

    let twice = coerced.once();
    for (id, node) in coerced.nodes.iter() {
        assert_eq!(node.triggers, twice.nodes[id].triggers);
    }

    Ok(())
}

#[test]
fn mermaid_describes_edges_and_loops() -> TestResult {
    let config: Config = serde_yaml::from_str(
        "\
flows:
  default:
    nodes:
      a:
        target:
          commands: echo A
      b:
        target:
          commands: echo B
        triggers:
          - after: [a]
      r:
        target:
          commands: echo tick
        triggers:
          - delay: 3
      w:
        target:
          commands: echo watched
        triggers:
          - watch: [src/]
",
    )?;

    let resolved = config.resolve()?;
    let mermaid = resolved["default"].mermaid();

    assert!(mermaid.starts_with("flowchart TD"));
    assert!(mermaid.contains("a --> b"));
    assert!(mermaid.contains("r -->|\u{221e} 3s| r"));
    assert!(mermaid.contains("src/"));

    Ok(())
}
