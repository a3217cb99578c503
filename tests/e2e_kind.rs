use std::error::Error;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Returns true if the given binary is accessible in PATH.
fn tool_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

const OPERATOR_NAMESPACE: &str = "hostalias-system";
const TEST_NAMESPACE: &str = "hostalias-e2e";
const OPERATOR_NAME: &str = "hostalias-operator";
const WORKLOAD_NAME: &str = "e2e-web";
const PRESET_WORKLOAD_NAME: &str = "e2e-preset";

/// Host-alias injection against a real Kind cluster.
///
/// 1. Start (or reuse) a Kind cluster.
/// 2. Deploy the operator watching the test namespace with a short interval.
/// 3. Apply a Deployment without host aliases and wait for the default
///    `127.0.0.1 -> example.com, test.local` entry to appear.
/// 4. Apply a Deployment that already carries an unrelated alias and check
///    that both entries survive the merge.
///
/// Run with: cargo test --test e2e_kind -- --ignored
#[test]
#[ignore]
fn e2e_host_alias_injection() -> Result<(), Box<dyn Error>> {
    for tool in &["kind", "kubectl", "docker"] {
        if !tool_available(tool) {
            eprintln!("Skipping e2e test: `{tool}` not found in PATH.");
            return Ok(());
        }
    }

    let cluster_name =
        std::env::var("KIND_CLUSTER_NAME").unwrap_or_else(|_| "hostalias-e2e".into());
    ensure_kind_cluster(&cluster_name)?;

    // A prebuilt image skips the local docker build.
    let image = match std::env::var("E2E_OPERATOR_IMAGE") {
        Ok(image) => image,
        Err(_) => {
            run_cmd("docker", &["build", "-t", "hostalias-operator:e2e", "."])?;
            "hostalias-operator:e2e".to_string()
        }
    };
    run_cmd(
        "kind",
        &["load", "docker-image", &image, "--name", &cluster_name],
    )?;

    let operator_yaml = operator_manifest(&image);
    let _cleanup = Cleanup::new(operator_yaml.clone());

    for namespace in [OPERATOR_NAMESPACE, TEST_NAMESPACE] {
        run_cmd(
            "kubectl",
            &[
                "create",
                "namespace",
                namespace,
                "--dry-run=client",
                "-o",
                "yaml",
            ],
        )
        .and_then(|output| kubectl_apply(&output))?;
    }

    kubectl_apply(&operator_yaml)?;
    run_cmd(
        "kubectl",
        &[
            "rollout",
            "status",
            &format!("deployment/{}", OPERATOR_NAME),
            "-n",
            OPERATOR_NAMESPACE,
            "--timeout=180s",
        ],
    )?;

    kubectl_apply(&workload_manifest(WORKLOAD_NAME, ""))?;
    wait_for("Host aliases injected", Duration::from_secs(120), || {
        let aliases = host_aliases_of(WORKLOAD_NAME)?;
        Ok(aliases.contains("127.0.0.1")
            && aliases.contains("example.com")
            && aliases.contains("test.local"))
    })?;

    let preset = r#"
      hostAliases:
        - ip: "10.0.0.5"
          hostnames: ["db.internal"]"#;
    kubectl_apply(&workload_manifest(PRESET_WORKLOAD_NAME, preset))?;
    wait_for("Host aliases merged", Duration::from_secs(120), || {
        let aliases = host_aliases_of(PRESET_WORKLOAD_NAME)?;
        Ok(aliases.contains("127.0.0.1") && aliases.contains("db.internal"))
    })?;

    let injected = host_aliases_of(WORKLOAD_NAME)?;
    if injected.matches("127.0.0.1").count() != 1 {
        return Err(format!("duplicate host alias entries: {}", injected).into());
    }

    Ok(())
}

fn host_aliases_of(name: &str) -> Result<String, Box<dyn Error>> {
    run_cmd(
        "kubectl",
        &[
            "get",
            "deployment",
            name,
            "-n",
            TEST_NAMESPACE,
            "-o",
            "jsonpath={.spec.template.spec.hostAliases}",
        ],
    )
}

fn ensure_kind_cluster(name: &str) -> Result<(), Box<dyn Error>> {
    let clusters = run_cmd("kind", &["get", "clusters"])?;
    if !clusters.lines().any(|line| line.trim() == name) {
        run_cmd("kind", &["create", "cluster", "--name", name])?;
    }
    Ok(())
}

fn kubectl_apply(manifest: &str) -> Result<(), Box<dyn Error>> {
    run_with_input("kubectl", &["apply", "-f", "-"], Some(manifest)).map(|_| ())
}

fn run_cmd(program: &str, args: &[&str]) -> Result<String, Box<dyn Error>> {
    run_with_input(program, args, None)
}

/// Run `program`, optionally feeding `input` on stdin, and return trimmed stdout.
fn run_with_input(
    program: &str,
    args: &[&str],
    input: Option<&str>,
) -> Result<String, Box<dyn Error>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(format!(
            "{} {:?} failed: {}",
            program,
            args,
            String::from_utf8_lossy(&output.stderr).trim()
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn wait_for<F>(label: &str, timeout: Duration, mut condition: F) -> Result<(), Box<dyn Error>>
where
    F: FnMut() -> Result<bool, Box<dyn Error>>,
{
    let start = Instant::now();
    while !condition()? {
        if start.elapsed() > timeout {
            return Err(format!("timed out after {:?} waiting for {}", timeout, label).into());
        }
        sleep(Duration::from_secs(3));
    }
    Ok(())
}

fn operator_manifest(image: &str) -> String {
    format!(
        r#"---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: {operator_name}
  namespace: {operator_namespace}
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: {operator_name}
rules:
  - apiGroups: ["apps"]
    resources: ["deployments"]
    verbs: ["get", "list", "watch", "patch"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: {operator_name}
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: {operator_name}
subjects:
  - kind: ServiceAccount
    name: {operator_name}
    namespace: {operator_namespace}
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {operator_name}
  namespace: {operator_namespace}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {operator_name}
  template:
    metadata:
      labels:
        app: {operator_name}
    spec:
      serviceAccountName: {operator_name}
      containers:
        - name: operator
          image: {image}
          imagePullPolicy: IfNotPresent
          args: ["run"]
          env:
            - name: OPERATOR_NAMESPACE
              value: {test_namespace}
            - name: RECONCILE_INTERVAL_SECS
              value: "10"
            - name: WATCH_TIMEOUT_SECS
              value: "5"
          readinessProbe:
            httpGet:
              path: /health
              port: 8080
"#,
        operator_name = OPERATOR_NAME,
        operator_namespace = OPERATOR_NAMESPACE,
        test_namespace = TEST_NAMESPACE,
        image = image
    )
}

/// Plain nginx Deployment; `pod_spec_extra` is spliced into the pod spec.
fn workload_manifest(name: &str, pod_spec_extra: &str) -> String {
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  namespace: {namespace}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:{extra}
      containers:
        - name: web
          image: nginx:1.27-alpine
"#,
        name = name,
        namespace = TEST_NAMESPACE,
        extra = pod_spec_extra,
    )
}

/// Removes everything the test created, even when an assertion fails.
struct Cleanup {
    operator_manifest: String,
}

impl Cleanup {
    fn new(operator_manifest: String) -> Self {
        Self { operator_manifest }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        let _ = run_with_input(
            "kubectl",
            &["delete", "-f", "-", "--ignore-not-found=true"],
            Some(self.operator_manifest.as_str()),
        );
        for namespace in [TEST_NAMESPACE, OPERATOR_NAMESPACE] {
            let _ = run_cmd(
                "kubectl",
                &["delete", "namespace", namespace, "--ignore-not-found=true"],
            );
        }
    }
}
