//! Unit tests for the DeployChart and Repository resource types
//!
//! Covers manifest parsing, status serialization and the generated CRD
//! schemas.

#[cfg(test)]
mod deploy_chart_resource {
    use kube::CustomResourceExt;
    use serde_json::json;

    use crate::crd::{ChartRef, DeployChart, DeployChartStatus, DeployState};

    const MANIFEST: &str = r#"
apiVersion: helm.k8s.ir/v1alpha1
kind: DeployChart
metadata:
  name: app-a
  namespace: ns1
spec:
  chart:
    repo: stable
    chart: redis
    version: 1.0.0
  values:
    replicas: 1
    auth:
      enabled: false
"#;

    #[test]
    fn test_parse_manifest() {
        let chart: DeployChart = serde_yaml::from_str(MANIFEST).unwrap();

        assert_eq!(chart.metadata.name.as_deref(), Some("app-a"));
        assert_eq!(chart.metadata.namespace.as_deref(), Some("ns1"));
        assert_eq!(
            chart.spec.chart,
            ChartRef {
                repo: "stable".to_string(),
                chart: "redis".to_string(),
                version: "1.0.0".to_string(),
            }
        );
        assert_eq!(chart.spec.values["replicas"], json!(1));
        assert_eq!(chart.spec.values["auth"]["enabled"], json!(false));
        assert!(chart.status.is_none());
    }

    #[test]
    fn test_missing_values_defaults_to_empty() {
        let chart: DeployChart = serde_json::from_value(json!({
            "apiVersion": "helm.k8s.ir/v1alpha1",
            "kind": "DeployChart",
            "metadata": { "name": "bare", "namespace": "default" },
            "spec": { "chart": { "repo": "bitnami", "chart": "nginx", "version": "15.0.0" } }
        }))
        .unwrap();

        assert!(chart.spec.values.is_empty());
        let spec = serde_json::to_value(&chart.spec).unwrap();
        assert!(spec.get("values").is_none());
    }

    #[test]
    fn test_current_status_defaults_to_pending() {
        let chart: DeployChart = serde_yaml::from_str(MANIFEST).unwrap();
        let status = chart.current_status();

        assert!(!status.processed);
        assert_eq!(status.state, DeployState::Pending);
        assert!(status.last_applied_hash.is_empty());
    }

    #[test]
    fn test_status_uses_camel_case() {
        let status = DeployChartStatus {
            processed: true,
            state: DeployState::Succeeded,
            message: "deployed".to_string(),
            last_applied_hash: "abc".to_string(),
        };
        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(
            value,
            json!({
                "processed": true,
                "state": "Succeeded",
                "message": "deployed",
                "lastAppliedHash": "abc"
            })
        );
    }

    #[test]
    fn test_chart_reference() {
        let chart = ChartRef {
            repo: "stable".to_string(),
            chart: "redis".to_string(),
            version: "1.0.0".to_string(),
        };
        assert_eq!(chart.reference(), "stable/redis");
        assert_eq!(chart.to_string(), "stable/redis@1.0.0");
    }

    #[test]
    fn test_crd_is_namespaced_and_preserves_values() {
        let crd = DeployChart::crd();
        assert_eq!(crd.spec.group, "helm.k8s.ir");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "DeployChart");

        let crd_json = serde_json::to_value(&crd).unwrap();
        let values = &crd_json["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]
            ["spec"]["properties"]["values"];
        assert_eq!(values["x-kubernetes-preserve-unknown-fields"], json!(true));
        assert_eq!(values["type"], json!("object"));
    }
}

#[cfg(test)]
mod repository_resource {
    use kube::CustomResourceExt;
    use serde_json::json;

    use crate::crd::{Repository, RepositorySpec};

    #[test]
    fn test_parse_manifest_with_credentials() {
        let repo: Repository = serde_yaml::from_str(
            r#"
apiVersion: helm.k8s.ir/v1alpha1
kind: Repository
metadata:
  name: private
spec:
  url: https://charts.example.com
  hasCredentials: true
  username: deployer
  password: s3cret
"#,
        )
        .unwrap();

        let creds = repo.spec.credentials().unwrap();
        assert_eq!(creds.username, "deployer");
        assert_eq!(creds.password, "s3cret");
        assert!(!repo.is_processed());
    }

    #[test]
    fn test_credentials_ignored_without_flag() {
        let spec = RepositorySpec {
            url: "https://charts.example.com".to_string(),
            has_credentials: false,
            username: "deployer".to_string(),
            password: "s3cret".to_string(),
        };
        assert!(spec.credentials().is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let spec = RepositorySpec {
            url: "https://charts.example.com".to_string(),
            has_credentials: true,
            username: "deployer".to_string(),
            password: "s3cret".to_string(),
        };
        let debug = format!("{:?}", spec.credentials().unwrap());
        assert!(debug.contains("deployer"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_crd_is_cluster_scoped() {
        let crd = Repository::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.plural, "repositories");

        let crd_json = serde_json::to_value(&crd).unwrap();
        let url = &crd_json["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]
            ["spec"]["properties"]["url"];
        assert_eq!(url["type"], json!("string"));
    }

    #[test]
    fn test_all_crds_lists_both_kinds() {
        let kinds: Vec<String> = crate::crd::all_crds()
            .into_iter()
            .map(|crd| crd.spec.names.kind)
            .collect();
        assert_eq!(kinds, vec!["Repository", "DeployChart"]);
    }
}
