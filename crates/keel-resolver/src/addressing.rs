//! Instance addressing
//!
//! Every job in an instance group gets one [`JobInstance`] per replica and
//! availability zone. Replicas are the outer loop and AZs the inner one, so
//! ordinals run `0..N×M` and ordinal 0 is the bootstrap instance.
//!
//! Addresses and ids depend only on the deployment, namespace, group,
//! ordinal and job, so repeated runs reproduce them exactly.

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use keel_types::{InstanceGroup, JobInstance};
use std::collections::HashSet;
use uuid::Uuid;

/// Longest label allowed by RFC 1123
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Hex digits of the digest kept when a label is shortened
const LABEL_DIGEST_LEN: usize = 8;

/// Namespace for instance ids
const INSTANCE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b65_656c_2d69_6e73_7461_6e63_652d_6964);

/// Derives instance identities within one deployment
#[derive(Debug, Clone, Copy)]
pub struct InstanceAddresser<'a> {
    deployment: &'a str,
    config: &'a ResolverConfig,
}

impl<'a> InstanceAddresser<'a> {
    pub fn new(deployment: &'a str, config: &'a ResolverConfig) -> Self {
        Self { deployment, config }
    }

    /// One instance of `job` per replica × AZ of `group`
    pub fn job_instances(&self, group: &InstanceGroup, job: &str) -> Result<Vec<JobInstance>> {
        let invalid = |reason: String| ResolveError::Addressing {
            instance_group: group.name.clone(),
            job: job.to_owned(),
            reason,
        };

        let replicas = usize::try_from(group.instances)
            .map_err(|_| invalid(format!("invalid replica count {}", group.instances)))?;

        let mut seen = HashSet::new();
        for az in &group.azs {
            if az.is_empty() {
                return Err(invalid("empty availability zone name".into()));
            }
            if !seen.insert(az.as_str()) {
                return Err(invalid(format!("availability zone {az} listed more than once")));
            }
        }

        let default_azs = [String::new()];
        let azs: &[String] = if group.azs.is_empty() {
            &default_azs
        } else {
            &group.azs
        };

        let name = format!("{}-{}", group.name, job);
        let mut instances = Vec::with_capacity(replicas.saturating_mul(azs.len()));
        for replica in 0..replicas {
            for az in azs {
                let index = instances.len();
                instances.push(JobInstance {
                    index,
                    instance: replica,
                    az: az.clone(),
                    name: name.clone(),
                    id: self.instance_id(&group.name, index, job),
                    address: self.instance_address(&group.name, index),
                    bootstrap: index == 0,
                });
            }
        }
        Ok(instances)
    }

    /// DNS address of one ordinal of a group
    pub fn instance_address(&self, group: &str, index: usize) -> String {
        self.qualify(&dns_label(&format!("{}-{}-{}", self.deployment, group, index)))
    }

    /// DNS address of a group as a whole
    pub fn group_address(&self, group: &str) -> String {
        self.qualify(&dns_label(&format!("{}-{}", self.deployment, group)))
    }

    /// Stable id of one job instance
    pub fn instance_id(&self, group: &str, index: usize, job: &str) -> String {
        let name = format!(
            "{}/{}/{}/{}/{}",
            self.deployment, group, index, job, self.config.namespace
        );
        Uuid::new_v5(&INSTANCE_ID_NAMESPACE, name.as_bytes()).to_string()
    }

    fn qualify(&self, label: &str) -> String {
        format!(
            "{}.{}.svc.{}",
            label, self.config.namespace, self.config.cluster_domain
        )
    }
}

/// Normalize `raw` into an RFC 1123 label.
///
/// Labels that end up too long keep a prefix and gain a digest of the full
/// input, so distinct inputs stay distinct.
pub fn dns_label(raw: &str) -> String {
    let normalized: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let label = normalized.trim_matches('-');

    if label.len() <= MAX_DNS_LABEL_LEN {
        return label.to_owned();
    }

    let digest = blake3::hash(raw.as_bytes()).to_hex();
    let prefix = label[..MAX_DNS_LABEL_LEN - LABEL_DIGEST_LEN - 1].trim_end_matches('-');
    format!("{}-{}", prefix, &digest.as_str()[..LABEL_DIGEST_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn group(instances: i64, azs: &[&str]) -> InstanceGroup {
        InstanceGroup {
            name: "web".into(),
            instances,
            azs: azs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_replicas_outer_azs_inner() {
        let config = ResolverConfig::default();
        let addresser = InstanceAddresser::new("cf", &config);

        let instances = addresser.job_instances(&group(2, &["z1", "z2"]), "server").unwrap();
        let layout: Vec<_> = instances
            .iter()
            .map(|i| (i.index, i.instance, i.az.as_str()))
            .collect();
        assert_eq!(layout, vec![(0, 0, "z1"), (1, 0, "z2"), (2, 1, "z1"), (3, 1, "z2")]);
        assert_eq!(instances[0].name, "web-server");
        assert_eq!(instances[3].address, "cf-web-3.default.svc.cluster.local");
    }

    #[test]
    fn test_zero_replicas() {
        let config = ResolverConfig::default();
        let addresser = InstanceAddresser::new("cf", &config);
        assert!(addresser.job_instances(&group(0, &["z1"]), "server").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_groups() {
        let config = ResolverConfig::default();
        let addresser = InstanceAddresser::new("cf", &config);

        let err = addresser.job_instances(&group(-1, &[]), "server").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddressingFailure);

        let err = addresser.job_instances(&group(1, &["z1", "z1"]), "server").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddressingFailure);
    }

    #[test]
    fn test_ids_are_stable_and_scoped() {
        let config = ResolverConfig::default();
        let other = ResolverConfig::new("staging");
        let a = InstanceAddresser::new("cf", &config);
        let b = InstanceAddresser::new("cf", &other);

        assert_eq!(a.instance_id("web", 0, "server"), a.instance_id("web", 0, "server"));
        assert_ne!(a.instance_id("web", 0, "server"), a.instance_id("web", 1, "server"));
        assert_ne!(a.instance_id("web", 0, "server"), a.instance_id("web", 0, "worker"));
        assert_ne!(a.instance_id("web", 0, "server"), b.instance_id("web", 0, "server"));
        assert_eq!(
            b.group_address("web"),
            "cf-web.staging.svc.cluster.local"
        );
    }

    #[test]
    fn test_dns_label() {
        assert_eq!(dns_label("My_Deployment-web-0"), "my-deployment-web-0");
        assert_eq!(dns_label("--edge--"), "edge");

        let long = "a".repeat(100);
        let label = dns_label(&long);
        assert_eq!(label.len(), MAX_DNS_LABEL_LEN);
        assert_eq!(label, dns_label(&long));
        assert_ne!(label, dns_label(&"a".repeat(101)));
    }

    proptest! {
        #[test]
        fn prop_instance_layout(replicas in 0i64..8, zones in 0usize..4) {
            let config = ResolverConfig::default();
            let addresser = InstanceAddresser::new("dep", &config);
            let azs: Vec<String> = (0..zones).map(|z| format!("z{z}")).collect();
            let azs: Vec<&str> = azs.iter().map(String::as_str).collect();

            let instances = addresser.job_instances(&group(replicas, &azs), "job").unwrap();
            let expected = replicas as usize * zones.max(1);

            prop_assert_eq!(instances.len(), expected);
            for (position, instance) in instances.iter().enumerate() {
                prop_assert_eq!(instance.index, position);
                prop_assert_eq!(instance.bootstrap, position == 0);
            }
            let addresses: HashSet<_> = instances.iter().map(|i| i.address.as_str()).collect();
            prop_assert_eq!(addresses.len(), expected);
        }

        #[test]
        fn prop_dns_label_is_valid(raw in ".{0,120}") {
            let label = dns_label(&raw);
            prop_assert!(label.len() <= MAX_DNS_LABEL_LEN);
            prop_assert!(label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
