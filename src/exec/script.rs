// src/exec/script.rs

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tera::Tera;
use tracing::debug;

use crate::config::{Args, ResolvedNode};
use crate::errors::{Result, SynthError};

/// Materialize the script for a node at `<tmp_dir>/<id>-<uid>` with the
/// executable bit set, overwriting any previous version.
///
/// The file name is a pure function of the node's behavior-bearing content,
/// so re-runs of an unchanged node land on the same path.
pub fn materialize(node: &ResolvedNode, flow_args: &Args, tmp_dir: &Path) -> Result<PathBuf> {
    let path = tmp_dir.join(format!("{}-{}", node.id, node.uid()));
    let script = render_script(node, flow_args)?;

    fs::write(&path, script)?;

    let mut permissions = fs::metadata(&path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(&path, permissions)?;

    debug!(node = %node.id, path = %path.display(), "materialized script");

    Ok(path)
}

/// Render the full script text: a shebang derived from the node's executable,
/// a blank line, then the commands templated with the merged args
/// (flow, then target, then node; later overrides earlier).
pub fn render_script(node: &ResolvedNode, flow_args: &Args) -> Result<String> {
    let shebang = shebang_line(&node.target.executable)?;

    let mut context = tera::Context::new();
    for (key, value) in flow_args
        .iter()
        .chain(node.target.args.iter())
        .chain(node.args.iter())
    {
        context.insert(key, value);
    }

    let commands = Tera::one_off(&node.target.commands, &context, false)?;

    Ok(format!("{shebang}\n\n{commands}\n"))
}

/// Build `#!<absolute-exe> <args>` from an interpreter invocation like
/// `sh -eu`, resolving the executable on PATH.
fn shebang_line(executable: &str) -> Result<String> {
    let words = shlex::split(executable)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| {
            SynthError::Config(format!("unparsable executable: '{executable}'"))
        })?;

    let exe = which::which(&words[0])
        .map_err(|_| SynthError::ExecutableNotFound(words[0].clone()))?;

    let mut parts = vec![exe.display().to_string()];
    parts.extend(words.into_iter().skip(1));

    let joined = shlex::try_join(parts.iter().map(String::as_str))
        .map_err(|err| SynthError::Config(format!("unquotable executable path: {err}")))?;

    Ok(format!("#!{joined}"))
}
