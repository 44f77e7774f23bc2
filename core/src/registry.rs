//! Tool Registry: the fixed table of wrappable security tools.
//!
//! Each entry describes one external binary, the parameters it accepts, how
//! each parameter is validated, and how the final argument vector is laid
//! out. The table is built once at startup and never mutated, so concurrent
//! reads need no synchronization.

use std::collections::HashMap;
use tracing::info;

/// How a parameter value is validated.
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    /// ASCII alphanumerics plus the listed extra characters.
    Str { extra: &'static str },
    /// Must match one of a fixed allowed set.
    Enum { allowed: &'static [&'static str] },
    /// A filesystem path. Checked for metacharacters and traversal, not
    /// existence; a missing file surfaces later as a launch/runtime failure.
    Path,
    /// Whitespace-tokenized extra flags, screened against the denylist.
    FreeText,
}

/// How a validated value lands in the argument vector.
#[derive(Debug, Clone, Copy)]
pub enum ArgRender {
    /// The value itself, in template order.
    Positional,
    /// Flag token followed by the value token, e.g. `-p 80,443`.
    Flag(&'static str),
    /// Single joined token, e.g. `--format=raw-md5`.
    Joined(&'static str),
    /// Each free-text token becomes its own argv entry.
    Splat,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: ParamKind,
    pub render: ArgRender,
    pub default: Option<&'static str>,
    /// Redacted in logs and in the execution history.
    pub sensitive: bool,
}

/// Final argv assembly strategy.
#[derive(Debug, Clone, Copy)]
pub enum Assemble {
    /// Ordered rendering of the parameter list after any base args.
    Argv,
    /// msfconsole takes a command script, not flat arguments: the module and
    /// options are folded into a single `-q -x "use ...; set K V; exploit"`.
    MsfScript,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub binary: &'static str,
    pub description: &'static str,
    /// Fixed arguments emitted before any parameter.
    pub base_args: &'static [&'static str],
    /// Template order is argv order.
    pub params: &'static [ParamSpec],
    /// Groups where at least one member must be supplied.
    pub requires_one_of: &'static [&'static [&'static str]],
    pub assemble: Assemble,
    pub timeout_secs: u64,
}

// Charsets mirror the per-tool input validation of the deployed tool set.
pub const HOST_EXTRA: &str = ".-_:";
pub const TARGET_EXTRA: &str = ".-_";
pub const PORTS_EXTRA: &str = ",-";
pub const URL_EXTRA: &str = ":/.-_~?&=%+#";
pub const DATA_EXTRA: &str = ":/.-_~?&=%+#";
pub const MODULE_EXTRA: &str = "/._-";
pub const FORMAT_EXTRA: &str = "-_";
pub const SERVICE_EXTRA: &str = "._-";

const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";

const fn required(name: &'static str, kind: ParamKind, render: ArgRender) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        kind,
        render,
        default: None,
        sensitive: false,
    }
}

const fn optional(name: &'static str, kind: ParamKind, render: ArgRender) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        kind,
        render,
        default: None,
        sensitive: false,
    }
}

const fn with_default(mut p: ParamSpec, value: &'static str) -> ParamSpec {
    p.default = Some(value);
    p
}

const fn sensitive(mut p: ParamSpec) -> ParamSpec {
    p.sensitive = true;
    p
}

const fn extra_args() -> ParamSpec {
    optional("additional_args", ParamKind::FreeText, ArgRender::Splat)
}

/// The full fixed tool table.
static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "network_scan",
        binary: "nmap",
        description: "Network port and service scan",
        base_args: &[],
        params: &[
            with_default(
                optional(
                    "scan_type",
                    ParamKind::Enum {
                        allowed: &["-sS", "-sT", "-sU", "-sV", "-sC", "-sn", "-A", "-O"],
                    },
                    ArgRender::Positional,
                ),
                "-sV",
            ),
            optional(
                "ports",
                ParamKind::Str { extra: PORTS_EXTRA },
                ArgRender::Flag("-p"),
            ),
            extra_args(),
            required(
                "target",
                ParamKind::Str { extra: TARGET_EXTRA },
                ArgRender::Positional,
            ),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 300,
    },
    ToolSpec {
        name: "directory_bruteforce",
        binary: "gobuster",
        description: "Directory, DNS and vhost brute forcing",
        base_args: &[],
        params: &[
            with_default(
                optional(
                    "mode",
                    ParamKind::Enum {
                        allowed: &["dir", "dns", "fuzz", "vhost"],
                    },
                    ArgRender::Positional,
                ),
                "dir",
            ),
            required(
                "url",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Flag("-u"),
            ),
            with_default(
                optional("wordlist", ParamKind::Path, ArgRender::Flag("-w")),
                DEFAULT_WORDLIST,
            ),
            extra_args(),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 300,
    },
    ToolSpec {
        name: "web_content_scan",
        binary: "dirb",
        description: "Web content scanner",
        base_args: &[],
        params: &[
            required(
                "url",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Positional,
            ),
            with_default(
                optional("wordlist", ParamKind::Path, ArgRender::Positional),
                DEFAULT_WORDLIST,
            ),
            extra_args(),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 300,
    },
    ToolSpec {
        name: "web_vuln_scan",
        binary: "nikto",
        description: "Web server vulnerability scan",
        base_args: &[],
        params: &[
            required(
                "target",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Flag("-h"),
            ),
            extra_args(),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 600,
    },
    ToolSpec {
        name: "sqli_test",
        binary: "sqlmap",
        description: "SQL injection testing",
        base_args: &[],
        params: &[
            required(
                "url",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Flag("-u"),
            ),
            optional(
                "data",
                ParamKind::Str { extra: DATA_EXTRA },
                ArgRender::Joined("--data="),
            ),
            extra_args(),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 600,
    },
    ToolSpec {
        name: "exploit_dispatch",
        binary: "msfconsole",
        description: "Metasploit framework module dispatch",
        base_args: &[],
        params: &[
            required(
                "module",
                ParamKind::Str {
                    extra: MODULE_EXTRA,
                },
                ArgRender::Positional,
            ),
            optional("options", ParamKind::FreeText, ArgRender::Splat),
        ],
        requires_one_of: &[],
        assemble: Assemble::MsfScript,
        timeout_secs: 600,
    },
    ToolSpec {
        name: "password_bruteforce",
        binary: "hydra",
        description: "Online password brute forcing",
        base_args: &["-t", "4"],
        params: &[
            optional(
                "username",
                ParamKind::Str { extra: TARGET_EXTRA },
                ArgRender::Flag("-l"),
            ),
            optional("username_file", ParamKind::Path, ArgRender::Flag("-L")),
            sensitive(optional(
                "password",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Flag("-p"),
            )),
            optional("password_file", ParamKind::Path, ArgRender::Flag("-P")),
            extra_args(),
            required(
                "target",
                ParamKind::Str { extra: HOST_EXTRA },
                ArgRender::Positional,
            ),
            required(
                "service",
                ParamKind::Str {
                    extra: SERVICE_EXTRA,
                },
                ArgRender::Positional,
            ),
        ],
        requires_one_of: &[
            &["username", "username_file"],
            &["password", "password_file"],
        ],
        assemble: Assemble::Argv,
        timeout_secs: 600,
    },
    ToolSpec {
        name: "hash_crack",
        binary: "john",
        description: "Offline hash cracking",
        base_args: &[],
        params: &[
            optional(
                "format",
                ParamKind::Str {
                    extra: FORMAT_EXTRA,
                },
                ArgRender::Joined("--format="),
            ),
            optional("wordlist", ParamKind::Path, ArgRender::Joined("--wordlist=")),
            extra_args(),
            required("hash_file", ParamKind::Path, ArgRender::Positional),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 600,
    },
    ToolSpec {
        name: "cms_scan",
        binary: "wpscan",
        description: "WordPress security scan",
        base_args: &[],
        params: &[
            required(
                "url",
                ParamKind::Str { extra: URL_EXTRA },
                ArgRender::Flag("--url"),
            ),
            extra_args(),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 300,
    },
    ToolSpec {
        name: "domain_enum",
        binary: "enum4linux",
        description: "SMB and domain enumeration",
        base_args: &[],
        params: &[
            with_default(extra_args(), "-a"),
            required(
                "target",
                ParamKind::Str { extra: HOST_EXTRA },
                ArgRender::Positional,
            ),
        ],
        requires_one_of: &[],
        assemble: Assemble::Argv,
        timeout_secs: 300,
    },
];

/// In-memory tool registry. Immutable after construction.
pub struct Registry {
    tools: HashMap<&'static str, &'static ToolSpec>,
}

impl Registry {
    /// Build the registry from the built-in tool table.
    pub fn builtin() -> Self {
        let reg = Self::from_specs(TOOLS);
        info!("Registered {} tools", reg.tool_count());
        reg
    }

    /// Build a registry from an explicit spec table.
    pub fn from_specs(specs: &'static [ToolSpec]) -> Self {
        let tools = specs.iter().map(|spec| (spec.name, spec)).collect();
        Self { tools }
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&'static ToolSpec> {
        self.tools.get(name).copied()
    }

    /// List all tools, sorted by name for stable output.
    pub fn list(&self) -> Vec<&'static ToolSpec> {
        let mut specs: Vec<_> = self.tools.values().copied().collect();
        specs.sort_by_key(|s| s.name);
        specs
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_size() {
        let reg = Registry::builtin();
        assert_eq!(reg.tool_count(), 10);
    }

    #[test]
    fn test_lookup_known_tools() {
        let reg = Registry::builtin();
        for name in [
            "network_scan",
            "directory_bruteforce",
            "web_content_scan",
            "web_vuln_scan",
            "sqli_test",
            "exploit_dispatch",
            "password_bruteforce",
            "hash_crack",
            "cms_scan",
            "domain_enum",
        ] {
            let spec = reg.lookup(name);
            assert!(spec.is_some(), "missing tool {name}");
            assert!(!spec.unwrap().binary.is_empty());
        }
    }

    #[test]
    fn test_lookup_unknown_tool() {
        let reg = Registry::builtin();
        assert!(reg.lookup("reverse_shell").is_none());
        assert!(reg.lookup("").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let reg = Registry::builtin();
        let names: Vec<_> = reg.list().iter().map(|s| s.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_every_tool_has_positive_timeout() {
        for spec in Registry::builtin().list() {
            assert!(spec.timeout_secs > 0, "{} has no timeout", spec.name);
        }
    }

    #[test]
    fn test_one_of_groups_reference_real_params() {
        for spec in Registry::builtin().list() {
            for group in spec.requires_one_of {
                for member in *group {
                    assert!(
                        spec.params.iter().any(|p| p.name == *member),
                        "{}: one-of member {member} not in param list",
                        spec.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_defaults_only_on_optional_params() {
        for spec in Registry::builtin().list() {
            for param in spec.params {
                if param.required {
                    assert!(
                        param.default.is_none(),
                        "{}.{} is required but has a default",
                        spec.name,
                        param.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_password_is_sensitive() {
        let reg = Registry::builtin();
        let hydra = reg.lookup("password_bruteforce").unwrap();
        let password = hydra.params.iter().find(|p| p.name == "password").unwrap();
        assert!(password.sensitive);
    }
}
