use regex::Regex;

use crate::errors::{HostError, Result};
use crate::host::Host;
use crate::utils::paths;

/// Expand a slash-separated glob pattern against a host's filesystem. One
/// engine serves both variants: components are matched level by level using
/// `read_dir`/`lstat` from the capability interface, so local and remote
/// globbing behave identically.
pub fn expand(host: &dyn Host, pattern: &str) -> Result<Vec<String>> {
    if pattern.is_empty() {
        return Err(HostError::invalid_args("empty glob pattern"));
    }

    let (mut current, rest): (Vec<String>, &str) = if let Some(stripped) = pattern.strip_prefix('/')
    {
        (vec!["/".to_string()], stripped)
    } else {
        (vec![String::new()], pattern)
    };

    for comp in rest.split('/').filter(|c| !c.is_empty()) {
        let mut next = Vec::new();
        if !has_meta(comp) {
            for dir in &current {
                let candidate = paths::join(dir, comp);
                if host.lstat(&candidate).is_ok() {
                    next.push(candidate);
                }
            }
        } else {
            let re = compile_component(comp)?;
            for dir in &current {
                let list_dir = if dir.is_empty() { "." } else { dir.as_str() };
                let entries = match host.read_dir(list_dir) {
                    Ok(entries) => entries,
                    Err(_) => continue,
                };
                for entry in entries {
                    if re.is_match(&entry.name) {
                        next.push(paths::join(dir, &entry.name));
                    }
                }
            }
        }
        if next.is_empty() {
            return Ok(Vec::new());
        }
        current = next;
    }

    current.sort();
    Ok(current)
}

fn has_meta(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// Translate one glob component (no slashes) into an anchored regex.
/// `*` matches any run of characters, `?` exactly one, `[...]`/`[!...]`
/// character classes pass through.
fn compile_component(component: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = component.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                re.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    re.push('^');
                } else if chars.peek() == Some(&'^') {
                    chars.next();
                    re.push_str("\\^");
                }
                let mut closed = false;
                for cc in chars.by_ref() {
                    match cc {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => re.push_str("\\\\"),
                        '[' => re.push_str("\\["),
                        other => re.push(other),
                    }
                }
                if !closed {
                    return Err(HostError::invalid_args(format!(
                        "unterminated character class in pattern component {component:?}"
                    )));
                }
                re.push(']');
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|err| HostError::invalid_args(format!("bad glob component {component:?}: {err}")))
}
