//! Built-in HIPAA rules evaluated against Cloud Asset data.
//!
//! Each rule returns sentences in the same style external policy engines
//! produce, so both paths share the classifier in [`crate::compliance`].

use serde_json::Value;

use super::policy::PolicyPack;
use crate::assets::Asset;

pub const BUCKET: &str = "storage.googleapis.com/Bucket";
pub const FIREWALL: &str = "compute.googleapis.com/Firewall";
pub const INSTANCE: &str = "compute.googleapis.com/Instance";
pub const SQL_INSTANCE: &str = "sqladmin.googleapis.com/Instance";
pub const GKE_CLUSTER: &str = "container.googleapis.com/Cluster";
pub const CLOUD_FUNCTION: &str = "cloudfunctions.googleapis.com/CloudFunction";
pub const LOG_SINK: &str = "logging.googleapis.com/LogSink";
pub const KMS_KEY: &str = "cloudkms.googleapis.com/CryptoKey";
pub const PROJECT: &str = "cloudresourcemanager.googleapis.com/Project";

/// Ports that must never be reachable from the internet.
pub const SENSITIVE_PORTS: &[(u16, &str)] = &[
    (22, "SSH"),
    (3389, "RDP"),
    (3306, "MySQL"),
    (5432, "PostgreSQL"),
    (1433, "SQL Server"),
    (27017, "MongoDB"),
];

const ANYWHERE: &str = "0.0.0.0/0";
const DEFAULT_COMPUTE_SA_SUFFIX: &str = "-compute@developer.gserviceaccount.com";
const PRIMITIVE_ROLES: &[&str] = &["roles/owner", "roles/editor"];
const ENVIRONMENT_LABELS: &[&str] = &["env", "environment"];
const SSL_ENFORCED_MODES: &[&str] = &["ENCRYPTED_ONLY", "TRUSTED_CLIENT_CERTIFICATE_REQUIRED"];

/// A single check over assets of one type.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub pack: PolicyPack,
    pub asset_type: &'static str,
    /// Resource kind as named by the classifier.
    pub resource_type: &'static str,
    /// Included in quick scans.
    pub quick: bool,
    check: fn(&Asset) -> Vec<String>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("pack", &self.pack)
            .field("asset_type", &self.asset_type)
            .field("quick", &self.quick)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Violation sentences for `asset`, empty when compliant or not applicable.
    #[must_use]
    pub fn check(&self, asset: &Asset) -> Vec<String> {
        if asset.asset_type != self.asset_type {
            return Vec::new();
        }
        (self.check)(asset)
    }
}

pub const RULES: &[Rule] = &[
    Rule {
        id: "bucket_public_access",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: BUCKET,
        resource_type: "storage.bucket",
        quick: true,
        check: bucket_public_access,
    },
    Rule {
        id: "bucket_uniform_access",
        pack: PolicyPack::HipaaCompliance,
        asset_type: BUCKET,
        resource_type: "storage.bucket",
        quick: false,
        check: bucket_uniform_access,
    },
    Rule {
        id: "bucket_versioning",
        pack: PolicyPack::EnvironmentSeparation,
        asset_type: BUCKET,
        resource_type: "storage.bucket",
        quick: false,
        check: bucket_versioning,
    },
    Rule {
        id: "firewall_open_sensitive_port",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: FIREWALL,
        resource_type: "compute.firewall",
        quick: true,
        check: firewall_open_sensitive_port,
    },
    Rule {
        id: "instance_default_service_account",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: INSTANCE,
        resource_type: "compute.instance",
        quick: true,
        check: instance_default_service_account,
    },
    Rule {
        id: "instance_external_ip",
        pack: PolicyPack::HipaaCompliance,
        asset_type: INSTANCE,
        resource_type: "compute.instance",
        quick: true,
        check: instance_external_ip,
    },
    Rule {
        id: "instance_environment_label",
        pack: PolicyPack::EnvironmentSeparation,
        asset_type: INSTANCE,
        resource_type: "compute.instance",
        quick: false,
        check: instance_environment_label,
    },
    Rule {
        id: "sql_open_authorized_network",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: SQL_INSTANCE,
        resource_type: "sql.instance",
        quick: true,
        check: sql_open_authorized_network,
    },
    Rule {
        id: "sql_require_ssl",
        pack: PolicyPack::HipaaCompliance,
        asset_type: SQL_INSTANCE,
        resource_type: "sql.instance",
        quick: false,
        check: sql_require_ssl,
    },
    Rule {
        id: "sql_backups",
        pack: PolicyPack::ThemisguardFramework,
        asset_type: SQL_INSTANCE,
        resource_type: "sql.instance",
        quick: false,
        check: sql_backups,
    },
    Rule {
        id: "gke_legacy_abac",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: GKE_CLUSTER,
        resource_type: "container.cluster",
        quick: true,
        check: gke_legacy_abac,
    },
    Rule {
        id: "gke_master_authorized_networks",
        pack: PolicyPack::HipaaCompliance,
        asset_type: GKE_CLUSTER,
        resource_type: "container.cluster",
        quick: false,
        check: gke_master_authorized_networks,
    },
    Rule {
        id: "function_public_invoker",
        pack: PolicyPack::GcpExpandedHipaa,
        asset_type: CLOUD_FUNCTION,
        resource_type: "cloudfunctions.function",
        quick: true,
        check: function_public_invoker,
    },
    Rule {
        id: "log_sink_retention",
        pack: PolicyPack::HipaaCompliance,
        asset_type: LOG_SINK,
        resource_type: "logging.sink",
        quick: false,
        check: log_sink_retention,
    },
    Rule {
        id: "primitive_role_service_account",
        pack: PolicyPack::ThemisguardFramework,
        asset_type: PROJECT,
        resource_type: "resourcemanager.project",
        quick: false,
        check: primitive_role_service_account,
    },
    Rule {
        id: "kms_key_rotation",
        pack: PolicyPack::HipaaCompliance,
        asset_type: KMS_KEY,
        resource_type: "kms.cryptokey",
        quick: false,
        check: kms_key_rotation,
    },
];

fn flag(data: &Value, pointer: &str) -> bool {
    data.pointer(pointer).and_then(Value::as_bool).unwrap_or(false)
}

fn array<'a>(data: &'a Value, pointer: &str) -> &'a [Value] {
    match data.pointer(pointer).and_then(Value::as_array) {
        Some(items) => items,
        None => &[],
    }
}

fn bucket_public_access(asset: &Asset) -> Vec<String> {
    if !asset.has_public_member() {
        return Vec::new();
    }
    vec![format!(
        "Storage bucket '{}' allows public access, violating access controls (Technical Safeguards)",
        asset.display_name()
    )]
}

fn bucket_uniform_access(asset: &Asset) -> Vec<String> {
    if flag(asset.data(), "/iamConfiguration/uniformBucketLevelAccess/enabled") {
        return Vec::new();
    }
    vec![format!(
        "Storage bucket '{}' does not enforce uniform bucket-level access - Violation (Medium) (Technical Safeguards)",
        asset.display_name()
    )]
}

fn bucket_versioning(asset: &Asset) -> Vec<String> {
    if flag(asset.data(), "/versioning/enabled") {
        return Vec::new();
    }
    vec![format!(
        "Storage bucket '{}' lacks versioning required for production-grade configuration - Environment Separation Violation (Low)",
        asset.display_name()
    )]
}

/// Whether a firewall port entry such as `22` or `20-30` covers `port`.
fn port_matches(entry: &str, port: u16) -> bool {
    match entry.split_once('-') {
        Some((low, high)) => match (low.trim().parse::<u16>(), high.trim().parse::<u16>()) {
            (Ok(low), Ok(high)) => (low..=high).contains(&port),
            _ => false,
        },
        None => entry.trim().parse::<u16>() == Ok(port),
    }
}

/// Whether one `allowed` entry of a firewall exposes a TCP port.
fn allows_port(allowed: &Value, port: u16) -> bool {
    match allowed.get("IPProtocol").and_then(Value::as_str) {
        Some("all") => true,
        Some("tcp" | "6") => {
            let ports = array(allowed, "/ports");
            ports.is_empty() || ports.iter().filter_map(Value::as_str).any(|entry| port_matches(entry, port))
        }
        _ => false,
    }
}

fn firewall_open_sensitive_port(asset: &Asset) -> Vec<String> {
    let data = asset.data();
    if flag(data, "/disabled") {
        return Vec::new();
    }
    let direction = data.get("direction").and_then(Value::as_str).unwrap_or("INGRESS");
    if direction != "INGRESS" {
        return Vec::new();
    }
    let open_to_world = array(data, "/sourceRanges")
        .iter()
        .any(|range| range.as_str() == Some(ANYWHERE));
    if !open_to_world {
        return Vec::new();
    }

    let allowed = array(data, "/allowed");
    SENSITIVE_PORTS
        .iter()
        .filter(|(port, _)| allowed.iter().any(|entry| allows_port(entry, *port)))
        .map(|(port, service)| {
            format!(
                "Firewall rule '{}' allows unrestricted access to sensitive port {port} ({service}) (Network Security)",
                asset.display_name()
            )
        })
        .collect()
}

fn instance_default_service_account(asset: &Asset) -> Vec<String> {
    let uses_default = array(asset.data(), "/serviceAccounts")
        .iter()
        .filter_map(|sa| sa.get("email").and_then(Value::as_str))
        .any(|email| email.ends_with(DEFAULT_COMPUTE_SA_SUFFIX));
    if !uses_default {
        return Vec::new();
    }
    vec![format!(
        "Compute instance '{}' uses the default service account for workload identity (Administrative Safeguards)",
        asset.display_name()
    )]
}

fn instance_external_ip(asset: &Asset) -> Vec<String> {
    let has_external_ip = array(asset.data(), "/networkInterfaces")
        .iter()
        .any(|nic| !array(nic, "/accessConfigs").is_empty());
    if !has_external_ip {
        return Vec::new();
    }
    vec![format!(
        "Compute instance '{}' has an external IP address - Violation (High) (Network Security)",
        asset.display_name()
    )]
}

fn instance_environment_label(asset: &Asset) -> Vec<String> {
    let labelled = asset
        .data()
        .get("labels")
        .and_then(Value::as_object)
        .is_some_and(|labels| ENVIRONMENT_LABELS.iter().any(|key| labels.contains_key(*key)));
    if labelled {
        return Vec::new();
    }
    vec![format!(
        "Compute instance '{}' is missing an environment label - Environment Separation Violation (Medium): resource tagging required",
        asset.display_name()
    )]
}

fn sql_open_authorized_network(asset: &Asset) -> Vec<String> {
    let open = array(asset.data(), "/settings/ipConfiguration/authorizedNetworks")
        .iter()
        .any(|network| network.get("value").and_then(Value::as_str) == Some(ANYWHERE));
    if !open {
        return Vec::new();
    }
    vec![format!(
        "Cloud SQL instance '{}' allows all internet connections through authorized network {ANYWHERE} (Network Security)",
        asset.display_name()
    )]
}

fn sql_require_ssl(asset: &Asset) -> Vec<String> {
    let data = asset.data();
    let ssl_mode = data
        .pointer("/settings/ipConfiguration/sslMode")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if flag(data, "/settings/ipConfiguration/requireSsl") || SSL_ENFORCED_MODES.contains(&ssl_mode) {
        return Vec::new();
    }
    vec![format!(
        "Cloud SQL instance '{}' does not require SSL - Violation (High) (Technical Safeguards)",
        asset.display_name()
    )]
}

fn sql_backups(asset: &Asset) -> Vec<String> {
    if flag(asset.data(), "/settings/backupConfiguration/enabled") {
        return Vec::new();
    }
    vec![format!(
        "Cloud SQL instance '{}' has automated backups disabled - Violation (High) (Administrative Safeguards)",
        asset.display_name()
    )]
}

fn gke_legacy_abac(asset: &Asset) -> Vec<String> {
    if !flag(asset.data(), "/legacyAbac/enabled") {
        return Vec::new();
    }
    vec![format!(
        "GKE cluster '{}' has legacy ABAC enabled, bypassing IAM access control (Administrative Safeguards)",
        asset.display_name()
    )]
}

fn gke_master_authorized_networks(asset: &Asset) -> Vec<String> {
    if flag(asset.data(), "/masterAuthorizedNetworksConfig/enabled") {
        return Vec::new();
    }
    vec![format!(
        "GKE cluster '{}' control plane has no master authorized networks - Violation (Medium) (Network Security)",
        asset.display_name()
    )]
}

fn function_public_invoker(asset: &Asset) -> Vec<String> {
    if !asset.has_public_member() {
        return Vec::new();
    }
    vec![format!(
        "Cloud Function '{}' allows public access to its invoker role (Technical Safeguards)",
        asset.display_name()
    )]
}

fn log_sink_retention(asset: &Asset) -> Vec<String> {
    let destination = asset
        .data()
        .get("destination")
        .and_then(Value::as_str)
        .unwrap_or_default();
    // Log buckets keep 30 days by default; storage and BigQuery sinks are long-term.
    if !destination.is_empty() && !destination.starts_with("logging.googleapis.com") {
        return Vec::new();
    }
    vec![format!(
        "Log sink '{}' not configured for long-term storage required for breach detection (Breach Notification)",
        asset.display_name()
    )]
}

fn primitive_role_service_account(asset: &Asset) -> Vec<String> {
    let project = asset.short_name();
    asset
        .bindings()
        .iter()
        .filter(|binding| PRIMITIVE_ROLES.contains(&binding.role.as_str()))
        .flat_map(|binding| {
            binding
                .members
                .iter()
                .filter_map(|member| member.strip_prefix("serviceAccount:"))
                .map(move |email| {
                    format!(
                        "Project IAM policy for '{project}' grants primitive role {} to service account {email}, exceeding minimum necessary access (Minimum Necessary)",
                        binding.role
                    )
                })
        })
        .collect()
}

fn kms_key_rotation(asset: &Asset) -> Vec<String> {
    let data = asset.data();
    let purpose = data
        .get("purpose")
        .and_then(Value::as_str)
        .unwrap_or("ENCRYPT_DECRYPT");
    if purpose != "ENCRYPT_DECRYPT" || data.get("rotationPeriod").is_some() {
        return Vec::new();
    }
    vec![format!(
        "Cloud KMS key '{}' has no rotation period configured - Violation (Medium) (Technical Safeguards)",
        asset.display_name()
    )]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::assets::{AssetResource, Binding, IamPolicy};
    use crate::compliance::{classify_severity, ViolationSeverity};

    fn asset(asset_type: &str, name: &str, data: Value) -> Asset {
        Asset {
            name: format!("//example.googleapis.com/{name}"),
            asset_type: asset_type.to_string(),
            resource: Some(AssetResource { data }),
            iam_policy: None,
        }
    }

    fn with_binding(mut asset: Asset, role: &str, member: &str) -> Asset {
        asset.iam_policy = Some(IamPolicy {
            bindings: vec![Binding {
                role: role.to_string(),
                members: vec![member.to_string()],
            }],
        });
        asset
    }

    fn rule(id: &str) -> &'static Rule {
        RULES.iter().find(|r| r.id == id).unwrap()
    }

    #[test]
    fn test_rule_ids_unique() {
        let mut ids: Vec<_> = RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
    }

    #[test]
    fn test_rule_ignores_other_asset_types() {
        let firewall = asset(FIREWALL, "fw", json!({"sourceRanges": [ANYWHERE]}));
        assert!(rule("bucket_uniform_access").check(&firewall).is_empty());
    }

    #[test]
    fn test_public_bucket() {
        let bucket = with_binding(
            asset(BUCKET, "phi-exports", json!({"name": "phi-exports"})),
            "roles/storage.objectViewer",
            "allUsers",
        );
        let texts = rule("bucket_public_access").check(&bucket);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Storage bucket 'phi-exports' allows public access"));
        assert_eq!(classify_severity(&texts[0]), ViolationSeverity::Critical);

        let private = with_binding(
            asset(BUCKET, "private", json!({})),
            "roles/storage.objectViewer",
            "group:eng@example.com",
        );
        assert!(rule("bucket_public_access").check(&private).is_empty());
    }

    #[test]
    fn test_bucket_hardening_rules() {
        let hardened = asset(
            BUCKET,
            "b",
            json!({
                "iamConfiguration": {"uniformBucketLevelAccess": {"enabled": true}},
                "versioning": {"enabled": true}
            }),
        );
        assert!(rule("bucket_uniform_access").check(&hardened).is_empty());
        assert!(rule("bucket_versioning").check(&hardened).is_empty());

        let bare = asset(BUCKET, "b", json!({}));
        let uniform = rule("bucket_uniform_access").check(&bare);
        assert_eq!(classify_severity(&uniform[0]), ViolationSeverity::Medium);
        let versioning = rule("bucket_versioning").check(&bare);
        assert_eq!(classify_severity(&versioning[0]), ViolationSeverity::Low);
    }

    #[test]
    fn test_port_matches() {
        assert!(port_matches("22", 22));
        assert!(port_matches("20-30", 22));
        assert!(!port_matches("80", 22));
        assert!(!port_matches("x-y", 22));
    }

    #[test]
    fn test_firewall_open_ports() {
        let fw = asset(
            FIREWALL,
            "default-allow-remote",
            json!({
                "name": "default-allow-remote",
                "direction": "INGRESS",
                "sourceRanges": ["0.0.0.0/0"],
                "allowed": [{"IPProtocol": "tcp", "ports": ["22", "3380-3400"]}]
            }),
        );
        let texts = rule("firewall_open_sensitive_port").check(&fw);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("sensitive port 22 (SSH)"));
        assert!(texts[1].contains("sensitive port 3389 (RDP)"));
        assert_eq!(classify_severity(&texts[0]), ViolationSeverity::Critical);
    }

    #[test]
    fn test_firewall_all_protocols() {
        let fw = asset(
            FIREWALL,
            "allow-all",
            json!({"sourceRanges": ["0.0.0.0/0"], "allowed": [{"IPProtocol": "all"}]}),
        );
        assert_eq!(
            rule("firewall_open_sensitive_port").check(&fw).len(),
            SENSITIVE_PORTS.len()
        );
    }

    #[test]
    fn test_firewall_restricted_or_disabled() {
        let internal = asset(
            FIREWALL,
            "internal",
            json!({"sourceRanges": ["10.0.0.0/8"], "allowed": [{"IPProtocol": "tcp"}]}),
        );
        assert!(rule("firewall_open_sensitive_port").check(&internal).is_empty());

        let disabled = asset(
            FIREWALL,
            "off",
            json!({"disabled": true, "sourceRanges": ["0.0.0.0/0"], "allowed": [{"IPProtocol": "all"}]}),
        );
        assert!(rule("firewall_open_sensitive_port").check(&disabled).is_empty());

        let egress = asset(
            FIREWALL,
            "egress",
            json!({"direction": "EGRESS", "sourceRanges": ["0.0.0.0/0"], "allowed": [{"IPProtocol": "all"}]}),
        );
        assert!(rule("firewall_open_sensitive_port").check(&egress).is_empty());
    }

    #[test]
    fn test_instance_rules() {
        let vm = asset(
            INSTANCE,
            "livekit-agent",
            json!({
                "name": "livekit-agent",
                "serviceAccounts": [{"email": "1234-compute@developer.gserviceaccount.com"}],
                "networkInterfaces": [{"accessConfigs": [{"natIP": "34.1.2.3"}]}]
            }),
        );
        let default_sa = rule("instance_default_service_account").check(&vm);
        assert_eq!(classify_severity(&default_sa[0]), ViolationSeverity::Critical);
        let external = rule("instance_external_ip").check(&vm);
        assert_eq!(classify_severity(&external[0]), ViolationSeverity::High);
        let label = rule("instance_environment_label").check(&vm);
        assert_eq!(classify_severity(&label[0]), ViolationSeverity::Medium);

        let clean = asset(
            INSTANCE,
            "worker",
            json!({
                "labels": {"env": "prod"},
                "serviceAccounts": [{"email": "worker@acme.iam.gserviceaccount.com"}],
                "networkInterfaces": [{"network": "default"}]
            }),
        );
        assert!(rule("instance_default_service_account").check(&clean).is_empty());
        assert!(rule("instance_external_ip").check(&clean).is_empty());
        assert!(rule("instance_environment_label").check(&clean).is_empty());
    }

    #[test]
    fn test_sql_rules() {
        let db = asset(
            SQL_INSTANCE,
            "patients-db",
            json!({
                "name": "patients-db",
                "settings": {
                    "ipConfiguration": {"authorizedNetworks": [{"value": "0.0.0.0/0"}]},
                    "backupConfiguration": {"enabled": false}
                }
            }),
        );
        let open = rule("sql_open_authorized_network").check(&db);
        assert_eq!(classify_severity(&open[0]), ViolationSeverity::Critical);
        assert_eq!(rule("sql_require_ssl").check(&db).len(), 1);
        assert_eq!(rule("sql_backups").check(&db).len(), 1);

        let hardened = asset(
            SQL_INSTANCE,
            "db",
            json!({
                "settings": {
                    "ipConfiguration": {"sslMode": "ENCRYPTED_ONLY"},
                    "backupConfiguration": {"enabled": true}
                }
            }),
        );
        assert!(rule("sql_open_authorized_network").check(&hardened).is_empty());
        assert!(rule("sql_require_ssl").check(&hardened).is_empty());
        assert!(rule("sql_backups").check(&hardened).is_empty());
    }

    #[test]
    fn test_gke_rules() {
        let cluster = asset(
            GKE_CLUSTER,
            "phi-cluster",
            json!({"name": "phi-cluster", "legacyAbac": {"enabled": true}}),
        );
        let abac = rule("gke_legacy_abac").check(&cluster);
        assert_eq!(classify_severity(&abac[0]), ViolationSeverity::High);
        assert_eq!(rule("gke_master_authorized_networks").check(&cluster).len(), 1);
    }

    #[test]
    fn test_log_sink_destinations() {
        let default_sink = asset(
            LOG_SINK,
            "_Default",
            json!({"name": "_Default", "destination": "logging.googleapis.com/projects/acme/locations/global/buckets/_Default"}),
        );
        let texts = rule("log_sink_retention").check(&default_sink);
        assert_eq!(classify_severity(&texts[0]), ViolationSeverity::High);

        let archive = asset(
            LOG_SINK,
            "archive",
            json!({"destination": "storage.googleapis.com/acme-audit-archive"}),
        );
        assert!(rule("log_sink_retention").check(&archive).is_empty());
    }

    #[test]
    fn test_primitive_roles() {
        let project = Asset {
            name: "//cloudresourcemanager.googleapis.com/projects/acme-health".to_string(),
            asset_type: PROJECT.to_string(),
            resource: None,
            iam_policy: Some(IamPolicy {
                bindings: vec![
                    Binding {
                        role: "roles/editor".to_string(),
                        members: vec![
                            "serviceAccount:ci@acme-health.iam.gserviceaccount.com".to_string(),
                            "user:alice@example.com".to_string(),
                        ],
                    },
                    Binding {
                        role: "roles/viewer".to_string(),
                        members: vec!["serviceAccount:ro@acme-health.iam.gserviceaccount.com".to_string()],
                    },
                ],
            }),
        };
        let texts = rule("primitive_role_service_account").check(&project);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("'acme-health'"));
        assert!(texts[0].contains("ci@acme-health.iam.gserviceaccount.com"));
        assert_eq!(classify_severity(&texts[0]), ViolationSeverity::Medium);
    }

    #[test]
    fn test_kms_rotation() {
        let key = asset(
            KMS_KEY,
            "phi-key",
            json!({"name": "projects/acme/locations/us/keyRings/r/cryptoKeys/phi-key", "purpose": "ENCRYPT_DECRYPT"}),
        );
        let texts = rule("kms_key_rotation").check(&key);
        assert!(texts[0].starts_with("Cloud KMS key 'phi-key'"));

        let rotated = asset(KMS_KEY, "k", json!({"rotationPeriod": "7776000s"}));
        assert!(rule("kms_key_rotation").check(&rotated).is_empty());

        let signing = asset(KMS_KEY, "s", json!({"purpose": "ASYMMETRIC_SIGN"}));
        assert!(rule("kms_key_rotation").check(&signing).is_empty());
    }

    #[test]
    fn test_public_function() {
        let function = with_binding(
            asset(CLOUD_FUNCTION, "ingest", json!({})),
            "roles/cloudfunctions.invoker",
            "allUsers",
        );
        let texts = rule("function_public_invoker").check(&function);
        assert_eq!(classify_severity(&texts[0]), ViolationSeverity::Critical);
    }
}
