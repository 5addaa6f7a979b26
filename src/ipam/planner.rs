//! VLAN block planner
//!
//! Sizes one block per VLAN from its expected host count, sorts the blocks
//! largest first and packs them into the base CIDR with a single forward
//! cursor. Candidates that overlap an existing subnet of the site are
//! flagged, not moved: the cursor advances past them either way, so
//! suggestions never overlap each other.

use std::collections::HashMap;

use crate::config::IpamSettings;
use crate::database::{Database, Subnet, Vlan, queries};
use crate::error::{IpamError, IpamResult};
use crate::models::{
    AllocationPlan, AllocationRequest, ApplyReport, NewSubnet, PlanRequest, PlanSuggestion,
    SkippedSuggestion, SuggestionReason,
};
use crate::network::cidr::{self, IpRange, ParsedCidr};

#[derive(Clone)]
pub struct AllocationPlanner {
    db: Database,
    settings: IpamSettings,
}

/// Prefix length for a VLAN expecting `expected` hosts.
///
/// `target = ceil(expected * (100 + headroom_pct) / 100) + 2`, rounded up to
/// the next power of two and clamped to a valid prefix.
pub fn prefix_for_hosts(expected: u64, headroom_pct: u64) -> u8 {
    let scaled = (u128::from(expected) * u128::from(100 + headroom_pct)).div_ceil(100);
    let target = (scaled + u128::from(crate::config::PLANNER_RESERVED_ADDRESSES)).max(2);
    let power = 128 - (target - 1).leading_zeros();
    (32 - power.min(32)) as u8
}

/// Builds sizing requests for `vlans` and sorts them largest block first.
/// The sort is stable, so equal sizes keep the VLAN order they came in.
pub fn build_requests(
    vlans: &[Vlan],
    expectations: &HashMap<i64, u64>,
    settings: &IpamSettings,
) -> Vec<AllocationRequest> {
    let mut requests: Vec<AllocationRequest> = vlans
        .iter()
        .map(|vlan| {
            let expected_hosts = expectations
                .get(&vlan.id)
                .copied()
                .unwrap_or(settings.default_expected_hosts);
            let mask = prefix_for_hosts(expected_hosts, settings.headroom_pct);
            AllocationRequest {
                vlan_id: vlan.id,
                vlan_number: vlan.number,
                vlan_name: vlan.name.clone(),
                expected_hosts,
                mask,
                capacity: cidr::capacity(mask),
            }
        })
        .collect();

    requests.sort_by_key(|r| r.mask);
    requests
}

/// Packs sorted requests into `base`, checking each candidate against `existing`.
pub fn pack(
    base: &ParsedCidr,
    requests: &[AllocationRequest],
    existing: &[Subnet],
) -> Vec<PlanSuggestion> {
    let existing_ranges = parsed_ranges(existing);
    let end = u64::from(base.network) + base.size;
    let mut cursor = u64::from(base.network);

    requests
        .iter()
        .map(|request| {
            if cursor >= end {
                return PlanSuggestion {
                    vlan_id: request.vlan_id,
                    vlan_number: request.vlan_number,
                    vlan_name: request.vlan_name.clone(),
                    suggested_cidr: None,
                    capacity: request.capacity,
                    conflict: false,
                    reason: SuggestionReason::NoSpace,
                };
            }

            let candidate = ParsedCidr {
                network: cursor as u32,
                mask: request.mask,
                size: cidr::block_size(request.mask),
            };
            let conflict = existing_ranges
                .iter()
                .any(|(_, range)| cidr::overlaps(candidate.range(), *range));
            cursor += candidate.size;

            PlanSuggestion {
                vlan_id: request.vlan_id,
                vlan_number: request.vlan_number,
                vlan_name: request.vlan_name.clone(),
                suggested_cidr: Some(candidate.to_string()),
                capacity: request.capacity,
                conflict,
                reason: if conflict {
                    SuggestionReason::ConflictWithExisting
                } else {
                    SuggestionReason::Ok
                },
            }
        })
        .collect()
}

/// Name given to subnets created from a suggestion.
pub fn suggested_subnet_name(vlan_number: u16, vlan_name: &str) -> String {
    format!("VLAN {} — {}", vlan_number, vlan_name)
}

impl AllocationPlanner {
    pub fn new(db: Database, settings: IpamSettings) -> Self {
        Self { db, settings }
    }

    /// Proposes one block per VLAN of the site. Read-only.
    pub fn plan(&self, request: &PlanRequest) -> IpamResult<AllocationPlan> {
        let (vlans, existing) = {
            let conn = self.db.lock()?;
            if queries::get_site(&conn, request.site_id)?.is_none() {
                return Err(IpamError::InvalidSite(request.site_id));
            }
            (
                queries::list_vlans_for_site(&conn, request.site_id)?,
                queries::list_subnets_for_site(&conn, request.site_id)?,
            )
        };

        let base = cidr::parse_cidr(&request.base_cidr)?.canonical();
        let requests = build_requests(&vlans, &request.expectations, &self.settings);
        let suggestions = pack(&base, &requests, &existing);

        crate::log_stderr!(
            "Planned {} VLAN blocks for site {} in {} ({} conflicting, {} without space)",
            suggestions.len(),
            request.site_id,
            base,
            suggestions.iter().filter(|s| s.conflict).count(),
            suggestions
                .iter()
                .filter(|s| s.reason == SuggestionReason::NoSpace)
                .count()
        );

        Ok(AllocationPlan {
            site_id: request.site_id,
            base: base.to_string(),
            suggestions,
        })
    }

    /// Creates subnets for every applicable suggestion in one transaction.
    ///
    /// Each suggestion is re-checked against the site's subnets as they are at
    /// apply time (and against blocks created earlier in the same call), so a
    /// stale plan cannot produce overlapping rows. Any failed insert rolls the
    /// whole apply back.
    pub fn apply(&self, plan: &AllocationPlan) -> IpamResult<ApplyReport> {
        let report = self.db.transaction("apply_plan", |conn| {
            let site = queries::get_site(conn, plan.site_id)?
                .ok_or(IpamError::InvalidSite(plan.site_id))?;
            let mut taken = parsed_ranges(&queries::list_subnets_for_site(conn, site.id)?);

            let mut report = ApplyReport {
                created: Vec::new(),
                skipped: Vec::new(),
            };

            for suggestion in &plan.suggestions {
                let Some(suggested) = suggestion.suggested_cidr.as_deref() else {
                    report.skipped.push(skip(suggestion, suggestion.reason.to_string()));
                    continue;
                };
                if suggestion.conflict {
                    report.skipped.push(skip(suggestion, suggestion.reason.to_string()));
                    continue;
                }

                let parsed = cidr::parse_cidr(suggested)?;
                if let Some((name, _)) = taken
                    .iter()
                    .find(|(_, range)| cidr::overlaps(parsed.range(), *range))
                {
                    crate::log_warn!(
                        "Skipping {} for VLAN {}: now overlaps '{}'",
                        suggested,
                        suggestion.vlan_number,
                        name
                    );
                    report.skipped.push(skip(
                        suggestion,
                        SuggestionReason::ConflictWithExisting.to_string(),
                    ));
                    continue;
                }

                let created = queries::insert_subnet(
                    conn,
                    &NewSubnet {
                        company_id: site.company_id,
                        site_id: Some(site.id),
                        vlan_id: Some(suggestion.vlan_id),
                        vrf_id: None,
                        name: suggested_subnet_name(suggestion.vlan_number, &suggestion.vlan_name),
                        cidr: parsed.canonical().to_string(),
                        description: None,
                    },
                )?;
                taken.push((created.name.clone(), parsed.range()));
                report.created.push(created);
            }

            Ok(report)
        })?;

        crate::log_stderr!(
            "Applied plan for site {}: {} created, {} skipped",
            plan.site_id,
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn skip(suggestion: &PlanSuggestion, reason: String) -> SkippedSuggestion {
    SkippedSuggestion {
        vlan_id: suggestion.vlan_id,
        suggested_cidr: suggestion.suggested_cidr.clone(),
        reason,
    }
}

fn parsed_ranges(subnets: &[Subnet]) -> Vec<(String, IpRange)> {
    subnets
        .iter()
        .filter_map(|s| match cidr::parse_cidr(&s.cidr) {
            Ok(parsed) => Some((s.name.clone(), parsed.range())),
            Err(e) => {
                crate::log_warn!("Ignoring subnet {} with unparsable CIDR: {}", s.id, e);
                None
            }
        })
        .collect()
}
