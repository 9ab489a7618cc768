use std::error::Error;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use happy_helm::crd::all_crds;

/// Returns true if the given binary is accessible in PATH.
fn tool_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

const TEST_NAMESPACE: &str = "happy-helm-e2e";
const REPOSITORY_NAME: &str = "podinfo";
const RELEASE_NAME: &str = "e2e-podinfo";

// ---------------------------------------------------------------------------
// DeployChart lifecycle on a real Kind cluster.
//
// The operator binary runs on the host against the cluster, driving the
// local `helm` install.
// Run with: cargo test --test e2e_kind -- --ignored
// ---------------------------------------------------------------------------

/// End-to-end test of the full release lifecycle:
///
/// 1. Start (or reuse) a Kind cluster and install both CRDs.
/// 2. Start the operator.
/// 3. Register a chart repository and wait for the latch.
/// 4. Apply a DeployChart and wait for `Succeeded`.
/// 5. Change a value and wait for a new `lastAppliedHash`.
/// 6. Delete the DeployChart and verify the release is uninstalled.
#[test]
#[ignore]
fn e2e_deploychart_lifecycle() -> Result<(), Box<dyn Error>> {
    for tool in &["kind", "kubectl", "helm"] {
        if !tool_available(tool) {
            eprintln!("Skipping e2e test: `{tool}` not found in PATH.");
            return Ok(());
        }
    }

    let cluster_name =
        std::env::var("KIND_CLUSTER_NAME").unwrap_or_else(|_| "happy-helm-e2e".into());
    ensure_kind_cluster(&cluster_name)?;

    let repo_url = std::env::var("E2E_CHART_REPO_URL")
        .unwrap_or_else(|_| "https://stefanprodan.github.io/podinfo".into());
    let chart_version = std::env::var("E2E_CHART_VERSION").unwrap_or_else(|_| "6.5.4".into());

    // ── Install the CRDs ─────────────────────────────────────────────────────
    let mut crds = String::new();
    for crd in all_crds() {
        crds.push_str("---\n");
        crds.push_str(&serde_yaml::to_string(&crd)?);
    }
    kubectl_apply(&crds)?;
    for crd in ["deploycharts.helm.k8s.ir", "repositories.helm.k8s.ir"] {
        run_cmd(
            "kubectl",
            &[
                "wait",
                "--for=condition=Established",
                &format!("crd/{}", crd),
                "--timeout=60s",
            ],
        )?;
    }

    // ── Start the operator ───────────────────────────────────────────────────
    let operator = Command::new(env!("CARGO_BIN_EXE_happy-helm"))
        .arg("run")
        .env("RUST_LOG", "happy_helm=debug")
        .spawn()?;
    let _cleanup = Cleanup::new(operator);

    // ── Register the repository ──────────────────────────────────────────────
    kubectl_apply(&repository_manifest(&repo_url))?;
    wait_for("Repository processed", Duration::from_secs(120), || {
        let processed = run_cmd(
            "kubectl",
            &[
                "get",
                "repository",
                REPOSITORY_NAME,
                "-o",
                "jsonpath={.status.processed}",
            ],
        )
        .unwrap_or_default();
        Ok(processed == "true")
    })?;

    // ── Deploy the chart ─────────────────────────────────────────────────────
    run_cmd(
        "kubectl",
        &[
            "create",
            "namespace",
            TEST_NAMESPACE,
            "--dry-run=client",
            "-o",
            "yaml",
        ],
    )
    .and_then(|output| kubectl_apply(&output))?;

    kubectl_apply(&deploy_chart_manifest(&chart_version, 1))?;
    wait_for("DeployChart Succeeded", Duration::from_secs(300), || {
        Ok(deploy_chart_field("{.status.state}") == "Succeeded")
    })?;
    let first_hash = deploy_chart_field("{.status.lastAppliedHash}");
    assert_eq!(first_hash.len(), 64);
    run_cmd("helm", &["status", RELEASE_NAME, "-n", TEST_NAMESPACE])?;

    // ── Upgrade on drift ─────────────────────────────────────────────────────
    kubectl_apply(&deploy_chart_manifest(&chart_version, 2))?;
    wait_for("DeployChart upgraded", Duration::from_secs(300), || {
        let hash = deploy_chart_field("{.status.lastAppliedHash}");
        Ok(!hash.is_empty() && hash != first_hash)
    })?;
    let values = run_cmd(
        "helm",
        &["get", "values", RELEASE_NAME, "-n", TEST_NAMESPACE, "-o", "json"],
    )?;
    let values: serde_json::Value = serde_json::from_str(&values)?;
    assert_eq!(values["replicaCount"], serde_json::json!(2));

    // ── Delete and verify uninstall ──────────────────────────────────────────
    run_cmd(
        "kubectl",
        &[
            "delete",
            "deploychart",
            RELEASE_NAME,
            "-n",
            TEST_NAMESPACE,
            "--timeout=180s",
            "--wait=true",
        ],
    )?;

    wait_for("Release uninstalled", Duration::from_secs(90), || {
        Ok(run_cmd("helm", &["status", RELEASE_NAME, "-n", TEST_NAMESPACE]).is_err())
    })?;

    Ok(())
}

fn deploy_chart_field(jsonpath: &str) -> String {
    run_cmd(
        "kubectl",
        &[
            "get",
            "deploychart",
            RELEASE_NAME,
            "-n",
            TEST_NAMESPACE,
            "-o",
            &format!("jsonpath={}", jsonpath),
        ],
    )
    .unwrap_or_default()
}

fn repository_manifest(url: &str) -> String {
    format!(
        r#"apiVersion: helm.k8s.ir/v1alpha1
kind: Repository
metadata:
  name: {name}
spec:
  url: "{url}"
"#,
        name = REPOSITORY_NAME,
        url = url,
    )
}

fn deploy_chart_manifest(version: &str, replicas: u32) -> String {
    format!(
        r#"apiVersion: helm.k8s.ir/v1alpha1
kind: DeployChart
metadata:
  name: {release}
  namespace: {namespace}
spec:
  chart:
    repo: {repo}
    chart: podinfo
    version: "{version}"
  values:
    replicaCount: {replicas}
    ui:
      message: "deployed by happy-helm"
"#,
        release = RELEASE_NAME,
        namespace = TEST_NAMESPACE,
        repo = REPOSITORY_NAME,
        version = version,
        replicas = replicas,
    )
}

/// RAII cleanup guard: removes test objects and stops the operator.
struct Cleanup {
    operator: Child,
}

impl Cleanup {
    fn new(operator: Child) -> Self {
        Self { operator }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        let _ = run_cmd_quiet(
            "kubectl",
            &[
                "delete",
                "deploychart",
                RELEASE_NAME,
                "-n",
                TEST_NAMESPACE,
                "--ignore-not-found=true",
                "--timeout=60s",
                "--wait=true",
            ],
        );
        let _ = run_cmd_quiet(
            "kubectl",
            &[
                "delete",
                "repository",
                REPOSITORY_NAME,
                "--ignore-not-found=true",
                "--timeout=60s",
                "--wait=true",
            ],
        );
        let _ = self.operator.kill();
        let _ = self.operator.wait();
        let _ = run_cmd_quiet(
            "kubectl",
            &[
                "delete",
                "namespace",
                TEST_NAMESPACE,
                "--ignore-not-found=true",
            ],
        );
    }
}

fn ensure_kind_cluster(name: &str) -> Result<(), Box<dyn Error>> {
    let clusters = run_cmd("kind", &["get", "clusters"])?;
    if clusters.lines().any(|line| line.trim() == name) {
        return Ok(());
    }
    run_cmd("kind", &["create", "cluster", "--name", name])?;
    Ok(())
}

fn kubectl_apply(manifest: &str) -> Result<(), Box<dyn Error>> {
    run_cmd_with_stdin("kubectl", &["apply", "-f", "-"], manifest)
}

fn run_cmd(program: &str, args: &[&str]) -> Result<String, Box<dyn Error>> {
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "command failed: {} {:?}\nstdout:\n{}\nstderr:\n{}",
            program, args, stdout, stderr
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn run_cmd_quiet(program: &str, args: &[&str]) -> Result<(), Box<dyn Error>> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(())
}

fn run_cmd_with_stdin(program: &str, args: &[&str], input: &str) -> Result<(), Box<dyn Error>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("command failed: {} {:?}\nstderr:\n{}", program, args, stderr).into());
    }
    Ok(())
}

fn wait_for<F>(label: &str, timeout: Duration, mut condition: F) -> Result<(), Box<dyn Error>>
where
    F: FnMut() -> Result<bool, Box<dyn Error>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        if condition()? {
            return Ok(());
        }
        attempts += 1;
        if start.elapsed() > timeout {
            return Err(format!(
                "timeout while waiting for {} after {:?} (attempts={})",
                label, timeout, attempts
            )
            .into());
        }
        sleep(Duration::from_secs(3));
    }
}
