//! Command Builder: turns a validated tool request into an argument vector.
//!
//! The builder is pure. It never touches the filesystem, never spawns
//! anything, and never produces a string destined for a shell interpreter;
//! every argument is a discrete token handed to the binary directly. Any
//! input that fails a rule is rejected outright, never sanitized in place.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::time::Duration;

use crate::error::ValidationError;
use crate::registry::{ArgRender, Assemble, ParamKind, ParamSpec, ToolSpec};

/// Fragments forbidden inside free-text tokens. A request containing any of
/// these fails closed with a validation error.
pub const DENYLIST: &[&str] = &[";", "&", "|", "`", "$(", ">", "<", "\n"];

/// Characters never allowed in a path parameter.
const PATH_META: &str = ";&|<>`$(){}[]*?!'\"\\";

const REDACTED: &str = "***";

/// Caller-supplied tool invocation, one per call.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool: String,
    pub params: HashMap<String, String>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }
}

/// Validated, fully resolved invocation. `display` mirrors `args` with
/// sensitive values redacted and is the only form that may be logged.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    pub program: String,
    pub args: Vec<String>,
    pub display: Vec<String>,
    pub timeout: Duration,
}

/// Build a `CommandPlan` for `spec` from `request`.
///
/// `path_root`, when set, confines every path parameter to that directory.
pub fn build(
    spec: &ToolSpec,
    request: &ToolRequest,
    path_root: Option<&Path>,
) -> Result<CommandPlan, ValidationError> {
    for key in request.params.keys() {
        if !spec.params.iter().any(|p| p.name == key) {
            return Err(ValidationError::UnknownParameter(key.clone()));
        }
    }

    // Resolve values in template order; empty strings count as absent.
    let mut resolved: Vec<(&ParamSpec, &str)> = Vec::new();
    for param in spec.params {
        let value = request
            .params
            .get(param.name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .or(param.default);
        match value {
            Some(v) => resolved.push((param, v)),
            None if param.required => {
                return Err(ValidationError::MissingParameter(param.name.to_string()))
            }
            None => {}
        }
    }

    for group in spec.requires_one_of {
        let satisfied = group
            .iter()
            .any(|name| resolved.iter().any(|(p, _)| p.name == *name));
        if !satisfied {
            return Err(ValidationError::MissingParameter(group.join(" or ")));
        }
    }

    let mut args: Vec<String> = spec.base_args.iter().map(|s| s.to_string()).collect();
    let mut display = args.clone();

    match spec.assemble {
        Assemble::Argv => {
            for (param, value) in &resolved {
                let tokens = validate(param, value, path_root)?;
                render(&mut args, &mut display, param, &tokens);
            }
        }
        Assemble::MsfScript => {
            let script = assemble_msf_script(&resolved, path_root)?;
            for token in ["-q".to_string(), "-x".to_string(), script] {
                args.push(token.clone());
                display.push(token);
            }
        }
    }

    Ok(CommandPlan {
        program: spec.binary.to_string(),
        args,
        display,
        timeout: Duration::from_secs(spec.timeout_secs),
    })
}

/// Validate one parameter value, producing its argv value tokens.
fn validate(
    param: &ParamSpec,
    value: &str,
    path_root: Option<&Path>,
) -> Result<Vec<String>, ValidationError> {
    match param.kind {
        ParamKind::Str { extra } => {
            let ok = value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || extra.contains(c));
            if !ok {
                return Err(ValidationError::InvalidCharacters {
                    param: param.name.to_string(),
                    value: value.to_string(),
                });
            }
            Ok(vec![value.to_string()])
        }
        ParamKind::Enum { allowed } => {
            if !allowed.contains(&value) {
                return Err(ValidationError::InvalidEnum {
                    param: param.name.to_string(),
                    value: value.to_string(),
                    allowed: allowed.join(", "),
                });
            }
            Ok(vec![value.to_string()])
        }
        ParamKind::Path => Ok(vec![validate_path(param.name, value, path_root)?]),
        ParamKind::FreeText => {
            let tokens = shlex::split(value).ok_or_else(|| ValidationError::Unparseable {
                param: param.name.to_string(),
            })?;
            for token in &tokens {
                if let Some(hit) = DENYLIST.iter().find(|frag| token.contains(*frag)) {
                    return Err(ValidationError::DeniedToken {
                        param: param.name.to_string(),
                        token: (*hit).to_string(),
                    });
                }
            }
            Ok(tokens)
        }
    }
}

fn validate_path(
    param: &str,
    value: &str,
    path_root: Option<&Path>,
) -> Result<String, ValidationError> {
    if value
        .chars()
        .any(|c| c.is_whitespace() || PATH_META.contains(c))
    {
        return Err(ValidationError::InvalidPath {
            param: param.to_string(),
            reason: "contains shell metacharacters".to_string(),
        });
    }

    let path = Path::new(value);
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ValidationError::InvalidPath {
            param: param.to_string(),
            reason: "path traversal".to_string(),
        });
    }

    match path_root {
        Some(root) => {
            let abs = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            if !abs.starts_with(root) {
                return Err(ValidationError::InvalidPath {
                    param: param.to_string(),
                    reason: "outside allowed root".to_string(),
                });
            }
            Ok(abs.to_string_lossy().into_owned())
        }
        None => Ok(value.to_string()),
    }
}

fn render(args: &mut Vec<String>, display: &mut Vec<String>, param: &ParamSpec, tokens: &[String]) {
    match param.render {
        ArgRender::Positional => {
            for token in tokens {
                args.push(token.clone());
                display.push(redact(param, token));
            }
        }
        ArgRender::Flag(flag) => {
            for token in tokens {
                args.push(flag.to_string());
                args.push(token.clone());
                display.push(flag.to_string());
                display.push(redact(param, token));
            }
        }
        ArgRender::Joined(prefix) => {
            for token in tokens {
                args.push(format!("{prefix}{token}"));
                display.push(format!("{prefix}{}", redact(param, token)));
            }
        }
        ArgRender::Splat => {
            for token in tokens {
                args.push(token.clone());
                display.push(redact(param, token));
            }
        }
    }
}

fn redact(param: &ParamSpec, token: &str) -> String {
    if param.sensitive {
        REDACTED.to_string()
    } else {
        token.to_string()
    }
}

/// Fold the validated module and options into one msfconsole command string.
/// The string is a single argv token interpreted by msfconsole itself; no
/// shell is involved.
fn assemble_msf_script(
    resolved: &[(&ParamSpec, &str)],
    path_root: Option<&Path>,
) -> Result<String, ValidationError> {
    let mut module = String::new();
    let mut options: Vec<String> = Vec::new();

    for (param, value) in resolved {
        let tokens = validate(param, value, path_root)?;
        match param.name {
            "module" => module = tokens.into_iter().next().unwrap_or_default(),
            "options" => options = tokens,
            _ => {}
        }
    }

    let mut script = format!("use {module}");
    for opt in &options {
        let invalid = || ValidationError::InvalidCharacters {
            param: "options".to_string(),
            value: opt.clone(),
        };
        let (key, val) = opt.split_once('=').ok_or_else(invalid)?;
        let key_ok = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !key_ok || val.is_empty() {
            return Err(invalid());
        }
        script.push_str(&format!("; set {key} {val}"));
    }
    script.push_str("; exploit");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn request(tool: &str, pairs: &[(&str, &str)]) -> ToolRequest {
        let params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ToolRequest::new(tool, params)
    }

    fn build_for(tool: &str, pairs: &[(&str, &str)]) -> Result<CommandPlan, ValidationError> {
        let reg = Registry::builtin();
        let spec = reg.lookup(tool).unwrap();
        build(spec, &request(tool, pairs), None)
    }

    #[test]
    fn test_nmap_argv_ordering() {
        let plan = build_for(
            "network_scan",
            &[
                ("target", "10.10.10.10"),
                ("scan_type", "-sV"),
                ("ports", "80,443"),
            ],
        )
        .unwrap();
        assert_eq!(plan.program, "nmap");
        assert_eq!(plan.args, vec!["-sV", "-p", "80,443", "10.10.10.10"]);
        assert_eq!(plan.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_nmap_scan_type_default() {
        let plan = build_for("network_scan", &[("target", "scanme.example.org")]).unwrap();
        assert_eq!(plan.args, vec!["-sV", "scanme.example.org"]);
    }

    #[test]
    fn test_missing_required_parameter_names_field() {
        let err = build_for("network_scan", &[("ports", "80")]).unwrap_err();
        assert_eq!(err, ValidationError::MissingParameter("target".into()));
    }

    #[test]
    fn test_empty_value_counts_as_absent() {
        let err = build_for("network_scan", &[("target", "")]).unwrap_err();
        assert_eq!(err, ValidationError::MissingParameter("target".into()));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("verbosity", "high")],
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::UnknownParameter("verbosity".into()));
    }

    #[test]
    fn test_target_charset_rejects_injection() {
        let err = build_for("network_scan", &[("target", "10.0.0.1; rm -rf /")]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCharacters { .. }));
    }

    #[test]
    fn test_ports_charset() {
        assert!(build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("ports", "1-1024,8080")]
        )
        .is_ok());
        let err = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("ports", "80;id")],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCharacters { .. }));
    }

    #[test]
    fn test_denylisted_token_in_free_text() {
        let err = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("additional_args", "-T4; rm -rf /")],
        )
        .unwrap_err();
        match err {
            ValidationError::DeniedToken { param, token } => {
                assert_eq!(param, "additional_args");
                assert_eq!(token, ";");
            }
            other => panic!("expected DeniedToken, got {other:?}"),
        }
    }

    #[test]
    fn test_free_text_tokenized_into_discrete_args() {
        let plan = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("additional_args", "-T4 --open")],
        )
        .unwrap();
        assert_eq!(plan.args, vec!["-sV", "-T4", "--open", "10.0.0.1"]);
    }

    #[test]
    fn test_free_text_unbalanced_quote() {
        let err = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("additional_args", "--script \"http")],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Unparseable { .. }));
    }

    #[test]
    fn test_gobuster_defaults_and_shape() {
        let plan = build_for("directory_bruteforce", &[("url", "http://10.0.0.1")]).unwrap();
        assert_eq!(
            plan.args,
            vec![
                "dir",
                "-u",
                "http://10.0.0.1",
                "-w",
                "/usr/share/wordlists/dirb/common.txt"
            ]
        );
    }

    #[test]
    fn test_gobuster_invalid_mode() {
        let err = build_for(
            "directory_bruteforce",
            &[("url", "http://10.0.0.1"), ("mode", "smash")],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEnum { .. }));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let err = build_for(
            "directory_bruteforce",
            &[
                ("url", "http://10.0.0.1"),
                ("wordlist", "/usr/share/../../etc/shadow"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));
    }

    #[test]
    fn test_path_metacharacters_rejected() {
        let err = build_for(
            "hash_crack",
            &[("hash_file", "/tmp/h;id")],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));
    }

    #[test]
    fn test_path_existence_not_required() {
        // A hash file that another tool has not produced yet still validates.
        let plan = build_for("hash_crack", &[("hash_file", "/tmp/not-yet-created.txt")]).unwrap();
        assert_eq!(plan.args, vec!["/tmp/not-yet-created.txt"]);
    }

    #[test]
    fn test_path_root_confinement() {
        let reg = Registry::builtin();
        let spec = reg.lookup("hash_crack").unwrap();
        let root = Path::new("/usr/share/wordlists");

        let req = request("hash_crack", &[("hash_file", "rockyou.txt")]);
        let plan = build(spec, &req, Some(root)).unwrap();
        assert_eq!(plan.args, vec!["/usr/share/wordlists/rockyou.txt"]);

        let req = request("hash_crack", &[("hash_file", "/etc/shadow")]);
        let err = build(spec, &req, Some(root)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));
    }

    #[test]
    fn test_john_joined_rendering() {
        let plan = build_for(
            "hash_crack",
            &[
                ("hash_file", "/tmp/hashes.txt"),
                ("format", "raw-md5"),
                ("wordlist", "/usr/share/wordlists/rockyou.txt"),
            ],
        )
        .unwrap();
        assert_eq!(
            plan.args,
            vec![
                "--format=raw-md5",
                "--wordlist=/usr/share/wordlists/rockyou.txt",
                "/tmp/hashes.txt"
            ]
        );
    }

    #[test]
    fn test_hydra_one_of_groups() {
        let err = build_for(
            "password_bruteforce",
            &[("target", "10.0.0.1"), ("service", "ssh")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter("username or username_file".into())
        );

        let err = build_for(
            "password_bruteforce",
            &[
                ("target", "10.0.0.1"),
                ("service", "ssh"),
                ("username", "root"),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter("password or password_file".into())
        );
    }

    #[test]
    fn test_hydra_argv_and_redaction() {
        let plan = build_for(
            "password_bruteforce",
            &[
                ("target", "10.0.0.1"),
                ("service", "ssh"),
                ("username", "root"),
                ("password", "hunter2"),
            ],
        )
        .unwrap();
        assert_eq!(
            plan.args,
            vec!["-t", "4", "-l", "root", "-p", "hunter2", "10.0.0.1", "ssh"]
        );
        assert_eq!(
            plan.display,
            vec!["-t", "4", "-l", "root", "-p", "***", "10.0.0.1", "ssh"]
        );
        assert!(!plan.display.contains(&"hunter2".to_string()));
    }

    #[test]
    fn test_sqlmap_data_joined() {
        let plan = build_for(
            "sqli_test",
            &[
                ("url", "http://10.0.0.1/item?id=1"),
                ("data", "id=1&cat=2"),
            ],
        )
        .unwrap();
        assert_eq!(
            plan.args,
            vec!["-u", "http://10.0.0.1/item?id=1", "--data=id=1&cat=2"]
        );
    }

    #[test]
    fn test_msf_script_assembly() {
        let plan = build_for(
            "exploit_dispatch",
            &[
                ("module", "exploit/unix/ftp/vsftpd_234_backdoor"),
                ("options", "RHOSTS=10.0.0.5 RPORT=21"),
            ],
        )
        .unwrap();
        assert_eq!(plan.program, "msfconsole");
        assert_eq!(plan.args[0], "-q");
        assert_eq!(plan.args[1], "-x");
        assert_eq!(
            plan.args[2],
            "use exploit/unix/ftp/vsftpd_234_backdoor; set RHOSTS 10.0.0.5; set RPORT 21; exploit"
        );
    }

    #[test]
    fn test_msf_module_charset() {
        let err = build_for("exploit_dispatch", &[("module", "exploit; id")]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCharacters { .. }));
    }

    #[test]
    fn test_msf_malformed_option() {
        let err = build_for(
            "exploit_dispatch",
            &[
                ("module", "exploit/multi/handler"),
                ("options", "RHOSTS10.0.0.5"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCharacters { .. }));
    }

    #[test]
    fn test_enum4linux_default_args() {
        let plan = build_for("domain_enum", &[("target", "10.0.0.9")]).unwrap();
        assert_eq!(plan.args, vec!["-a", "10.0.0.9"]);
    }

    #[test]
    fn test_builder_is_deterministic() {
        let a = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("ports", "22,80")],
        )
        .unwrap();
        let b = build_for(
            "network_scan",
            &[("target", "10.0.0.1"), ("ports", "22,80")],
        )
        .unwrap();
        assert_eq!(a.args, b.args);
        assert_eq!(a.display, b.display);
    }
}
