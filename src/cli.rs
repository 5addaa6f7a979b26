use anyhow::Result;
use std::collections::HashMap;

use crate::models::SubnetFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Plan {
        site_id: i64,
        base_cidr: String,
        expectations: HashMap<i64, u64>,
        apply: bool,
    },
    Subnets {
        filter: SubnetFilter,
    },
    Usage {
        company_id: i64,
        site_id: Option<i64>,
    },
    Addresses {
        subnet_id: i64,
    },
    Reconcile {
        company_id: i64,
        source: String,
        group: Option<String>,
    },
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("ipam-core {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
IPv4 address management: subnets, addresses, VLAN allocation planning

Usage:
  ipam-core plan --site <ID> --base <CIDR> [--expect <VLAN_ID>=<HOSTS>]... [--apply]
  ipam-core subnets --company <ID> [--site <ID>] [--vlan <ID>] [--vrf <ID>]
  ipam-core usage --company <ID> [--site <ID>]
  ipam-core addresses --subnet <ID>
  ipam-core reconcile --company <ID> --source <URL|FILE> [--group <NAME>]
  ipam-core --help
  ipam-core --version

Options:
      --site <ID>             Site id
      --base <CIDR>           Plan: base block to pack VLAN subnets into
      --expect <ID>=<HOSTS>   Plan: expected hosts for a VLAN (repeatable)
      --apply                 Plan: create the non-conflicting suggestions
      --company <ID>          Company id
      --vlan <ID>             Filter subnets by VLAN id
      --vrf <ID>              Filter subnets by VRF id
      --subnet <ID>           Subnet id
      --source <URL|FILE>     Reconcile: inventory endpoint or JSON host file
      --group <NAME>          Reconcile: only hosts in this group
  -h, --help                  Show this help text
  -V, --version               Show version

Environment:
  IPAM_DB_PATH, IPAM_HEADROOM_PCT, IPAM_DEFAULT_EXPECTED_HOSTS, IPAM_DNS_WORKERS,
  IPAM_DNS_TIMEOUT_MS, IPAM_INVENTORY_TIMEOUT_MS, IPAM_RECONCILE_TIMEOUT_MS,
  IPAM_ENFORCE_ADDRESS_CONTAINMENT, IPAM_REJECT_OVERLAPPING_SUBNETS, RUST_LOG",
        version = version_text()
    )
}

fn parse_id_arg(flag: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for {}: '{}'. Expected a positive integer.\n\n{}",
            flag,
            raw,
            usage_text()
        )
    })
}

fn parse_expectation(raw: &str) -> Result<(i64, u64)> {
    let parsed = raw.split_once('=').and_then(|(vlan, hosts)| {
        let vlan = vlan.trim().parse::<i64>().ok().filter(|v| *v > 0)?;
        let hosts = hosts.trim().parse::<u64>().ok()?;
        Some((vlan, hosts))
    });
    parsed.ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for --expect: '{}'. Expected <VLAN_ID>=<HOSTS>.\n\n{}",
            raw,
            usage_text()
        )
    })
}

fn required<T>(value: Option<T>, flag: &str, command: &str) -> Result<T> {
    value.ok_or_else(|| anyhow::anyhow!("{} requires {}.\n\n{}", command, flag, usage_text()))
}

/// Raw flag values collected before the command decides which are allowed
#[derive(Default)]
struct Flags {
    site: Option<i64>,
    base: Option<String>,
    expectations: HashMap<i64, u64>,
    apply: bool,
    company: Option<i64>,
    vlan: Option<i64>,
    vrf: Option<i64>,
    subnet: Option<i64>,
    source: Option<String>,
    group: Option<String>,
}

impl Flags {
    fn set(&mut self, flag: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(anyhow::anyhow!("Missing value for {}.\n\n{}", flag, usage_text()));
        }
        match flag {
            "--site" => self.site = Some(parse_id_arg(flag, value)?),
            "--base" => self.base = Some(value.to_string()),
            "--expect" => {
                let (vlan, hosts) = parse_expectation(value)?;
                self.expectations.insert(vlan, hosts);
            }
            "--company" => self.company = Some(parse_id_arg(flag, value)?),
            "--vlan" => self.vlan = Some(parse_id_arg(flag, value)?),
            "--vrf" => self.vrf = Some(parse_id_arg(flag, value)?),
            "--subnet" => self.subnet = Some(parse_id_arg(flag, value)?),
            "--source" => self.source = Some(value.to_string()),
            "--group" => self.group = Some(value.to_string()),
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {flag}\n\n{}", usage_text()));
            }
        }
        Ok(())
    }

    /// Flags that were given but are not in `allowed`
    fn unexpected(&self, allowed: &[&str]) -> Vec<&'static str> {
        let present = [
            ("--site", self.site.is_some()),
            ("--base", self.base.is_some()),
            ("--expect", !self.expectations.is_empty()),
            ("--apply", self.apply),
            ("--company", self.company.is_some()),
            ("--vlan", self.vlan.is_some()),
            ("--vrf", self.vrf.is_some()),
            ("--subnet", self.subnet.is_some()),
            ("--source", self.source.is_some()),
            ("--group", self.group.is_some()),
        ];
        present
            .into_iter()
            .filter(|(flag, set)| *set && !allowed.contains(flag))
            .map(|(flag, _)| flag)
            .collect()
    }
}

const VALUE_FLAGS: &[&str] = &[
    "--site", "--base", "--expect", "--company", "--vlan", "--vrf", "--subnet", "--source",
    "--group",
];

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut flags = Flags::default();

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "plan" | "subnets" | "usage" | "addresses" | "reconcile" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "--apply" => flags.apply = true,
            _ if VALUE_FLAGS.contains(&arg) => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for {}.\n\n{}", arg, usage_text())
                })?;
                flags.set(arg, value.as_ref())?;
            }
            _ if arg.starts_with("--") && arg.contains('=') => {
                let (flag, value) = arg.split_once('=').unwrap_or((arg, ""));
                if !VALUE_FLAGS.contains(&flag) {
                    return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
                }
                flags.set(flag, value)?;
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
            }
        }
    }

    let Some(command) = command else {
        return Ok(CliCommand::Help);
    };

    let allowed: &[&str] = match command.as_str() {
        "plan" => &["--site", "--base", "--expect", "--apply"],
        "subnets" => &["--company", "--site", "--vlan", "--vrf"],
        "usage" => &["--company", "--site"],
        "addresses" => &["--subnet"],
        _ => &["--company", "--source", "--group"],
    };
    let unexpected = flags.unexpected(allowed);
    if !unexpected.is_empty() {
        return Err(anyhow::anyhow!(
            "{} not valid with {}.\n\n{}",
            unexpected.join("/"),
            command,
            usage_text()
        ));
    }

    match command.as_str() {
        "plan" => Ok(CliCommand::Plan {
            site_id: required(flags.site, "--site", "plan")?,
            base_cidr: required(flags.base, "--base", "plan")?,
            expectations: flags.expectations,
            apply: flags.apply,
        }),
        "subnets" => Ok(CliCommand::Subnets {
            filter: SubnetFilter {
                company_id: required(flags.company, "--company", "subnets")?,
                site_id: flags.site,
                vlan_id: flags.vlan,
                vrf_id: flags.vrf,
            },
        }),
        "usage" => Ok(CliCommand::Usage {
            company_id: required(flags.company, "--company", "usage")?,
            site_id: flags.site,
        }),
        "addresses" => Ok(CliCommand::Addresses {
            subnet_id: required(flags.subnet, "--subnet", "addresses")?,
        }),
        _ => Ok(CliCommand::Reconcile {
            company_id: required(flags.company, "--company", "reconcile")?,
            source: required(flags.source, "--source", "reconcile")?,
            group: flags.group,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_help_flag() {
        let parsed = parse_cli_args(["ipam-core", "--help"]).expect("help args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let parsed = parse_cli_args(["ipam-core", "-V"]).expect("version args should parse");
        assert_eq!(parsed, CliCommand::Version);
    }

    #[test]
    fn no_command_shows_help() {
        let parsed = parse_cli_args(["ipam-core"]).expect("empty args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_plan_with_expectations() {
        let args = [
            "ipam-core",
            "plan",
            "--site",
            "3",
            "--base",
            "10.0.0.0/16",
            "--expect",
            "1=100",
            "--expect=2=10",
            "--apply",
        ];
        let parsed = parse_cli_args(args).expect("plan should parse");
        assert_eq!(
            parsed,
            CliCommand::Plan {
                site_id: 3,
                base_cidr: "10.0.0.0/16".to_string(),
                expectations: HashMap::from([(1, 100), (2, 10)]),
                apply: true,
            }
        );
    }

    #[test]
    fn parse_plan_requires_base() {
        let err = parse_cli_args(["ipam-core", "plan", "--site", "3"])
            .expect_err("plan without --base should fail");
        assert!(err.to_string().contains("plan requires --base"));
    }

    #[test]
    fn parse_subnets_with_filters() {
        let args = ["ipam-core", "subnets", "--company=7", "--site", "2", "--vrf", "4"];
        let parsed = parse_cli_args(args).expect("subnets should parse");
        assert_eq!(
            parsed,
            CliCommand::Subnets {
                filter: SubnetFilter {
                    company_id: 7,
                    site_id: Some(2),
                    vlan_id: None,
                    vrf_id: Some(4),
                }
            }
        );
    }

    #[test]
    fn parse_reconcile_command() {
        let args = [
            "ipam-core",
            "reconcile",
            "--company",
            "1",
            "--source",
            "https://inventory.local/api/hosts",
            "--group",
            "Linux servers",
        ];
        let parsed = parse_cli_args(args).expect("reconcile should parse");
        assert_eq!(
            parsed,
            CliCommand::Reconcile {
                company_id: 1,
                source: "https://inventory.local/api/hosts".to_string(),
                group: Some("Linux servers".to_string()),
            }
        );
    }

    #[test]
    fn parse_rejects_flags_for_other_commands() {
        let err = parse_cli_args(["ipam-core", "addresses", "--subnet", "1", "--apply"])
            .expect_err("addresses should reject --apply");
        assert!(err.to_string().contains("--apply not valid with addresses"));
    }

    #[test]
    fn parse_rejects_bad_expectation() {
        let err = parse_cli_args(["ipam-core", "plan", "--expect", "ten"])
            .expect_err("malformed --expect should fail");
        assert!(err.to_string().contains("Expected <VLAN_ID>=<HOSTS>"));
    }

    #[test]
    fn parse_rejects_non_positive_ids() {
        let err = parse_cli_args(["ipam-core", "usage", "--company", "0"])
            .expect_err("zero id should fail");
        assert!(err.to_string().contains("Expected a positive integer"));
    }

    #[test]
    fn parse_multiple_commands_errors() {
        let err = parse_cli_args(["ipam-core", "plan", "usage"])
            .expect_err("two commands should fail");
        assert!(err.to_string().contains("Multiple commands"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["ipam-core", "--unknown"]).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
