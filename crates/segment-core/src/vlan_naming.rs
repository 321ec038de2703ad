//! VLAN-group naming, grounded on `netbox_helpers.py::get_or_create_vlan_group`
//! and `_sanitize_slug`.

/// `"<vrf>-ClickCluster-<site>"`, the deterministic VLAN-group name for a
/// (vrf, site) pool.
pub fn vlan_group_name(vrf: &str, site: &str) -> String {
    format!("{vrf}-ClickCluster-{site}")
}

/// Lowercase, hyphenate, strip anything outside `[a-z0-9-]`, collapse runs
/// of hyphens, trim leading/trailing hyphens. Mirrors `_sanitize_slug`.
pub fn sanitize_slug(input: &str) -> String {
    let lowered = input.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_hyphen = false;
    for ch in lowered.chars() {
        let mapped = match ch {
            ' ' | '_' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' => c,
            _ => continue,
        };
        if mapped == '-' {
            if last_was_hyphen {
                continue;
            }
            last_was_hyphen = true;
        } else {
            last_was_hyphen = false;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_follows_wire_format() {
        assert_eq!(vlan_group_name("Network1", "Site1"), "Network1-ClickCluster-Site1");
    }

    #[test]
    fn slug_collapses_and_strips() {
        assert_eq!(sanitize_slug("Network1-ClickCluster-Site1"), "network1-clickcluster-site1");
        assert_eq!(sanitize_slug("A  B__C"), "a-b-c");
        assert_eq!(sanitize_slug("--weird!!name--"), "weird-name");
    }
}
